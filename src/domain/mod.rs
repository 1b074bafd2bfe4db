//! Strongly-typed domain structures for file handling.
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Fully resolved, lexically normalized path that passed validation.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AbsolutePath(PathBuf);

impl AbsolutePath {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    pub fn is_dir(&self) -> bool {
        self.0.is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.0.is_file()
    }

    /// Final path segment, if the path has one.
    pub fn file_name(&self) -> Option<String> {
        self.0
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

/// Sanitized file name (single path component).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FileName(String);

impl FileName {
    pub fn try_new(value: String) -> Result<Self, TypeConstraintError> {
        if value.contains('\0') {
            return Err(TypeConstraintError::InvalidFileName);
        }
        let path = Path::new(&value);
        let mut components = path.components();
        match (components.next(), components.next()) {
            (Some(std::path::Component::Normal(component)), None) => {
                Ok(Self(component.to_string_lossy().to_string()))
            }
            _ => Err(TypeConstraintError::InvalidFileName),
        }
    }

    pub fn try_from_str(value: &str) -> Result<Self, TypeConstraintError> {
        Self::try_new(value.to_string())
    }

    /// Reduce a client-supplied name to its final segment.
    ///
    /// Both `/` and `\` count as separators regardless of the host platform, so
    /// `../../evil.txt` and `..\..\evil.txt` both become `evil.txt`.
    pub fn from_client_name(raw: &str) -> Result<Self, TypeConstraintError> {
        let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
        Self::try_from_str(last)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Directory entry surfaced by a listing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageEntry {
    name: FileName,
    kind: EntryKind,
}

impl StorageEntry {
    pub fn new(name: FileName, kind: EntryKind) -> Self {
        Self { name, kind }
    }

    pub fn name(&self) -> &FileName {
        &self.name
    }

    pub fn into_name(self) -> FileName {
        self.name
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    /// Size in bytes; directories report zero.
    pub fn size(&self) -> u64 {
        match self.kind {
            EntryKind::Directory => 0,
            EntryKind::File { size } => size,
        }
    }
}

/// Entry type stored on disk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EntryKind {
    Directory,
    File { size: u64 },
}

/// Everything needed to perform one upload write.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UploadIntent {
    /// File name as sent by the client, not yet sanitized.
    pub filename: String,
    pub data: Vec<u8>,
    /// Destination folder as sent by the client, not yet validated.
    pub folder: String,
}

#[derive(Debug, Error)]
pub enum TypeConstraintError {
    #[error("invalid path")]
    InvalidPath,
    #[error("invalid file name")]
    InvalidFileName,
}
