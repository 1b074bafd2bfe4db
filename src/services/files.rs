use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::{AbsolutePath, EntryKind, FileName, StorageEntry, UploadIntent};
use crate::dto::FileEntryDto;
use crate::platform::EntryAttributes;
use crate::services::validator::PathValidator;
use crate::services::{ServiceError, ServiceResult};

/// Service responsible for the filesystem side of every endpoint.
#[derive(Clone)]
pub struct FileService {
    validator: PathValidator,
    attributes: Arc<dyn EntryAttributes>,
}

impl FileService {
    pub fn new(validator: PathValidator, attributes: Arc<dyn EntryAttributes>) -> Self {
        Self { validator, attributes }
    }

    /// Current roots rendered for display.
    pub fn list_drives(&self) -> Vec<String> {
        self.validator
            .roots()
            .iter()
            .map(|root| root.to_string_lossy().into_owned())
            .collect()
    }

    /// List visible entries of `path`: directories first, then files, each
    /// group ordered case-insensitively.
    pub fn list_entries(&self, path: &str) -> ServiceResult<Vec<FileEntryDto>> {
        let target = self
            .validator
            .validated(path, true)
            .filter(AbsolutePath::is_dir)
            .ok_or(ServiceError::DirectoryNotFound)?;

        let mut entries: Vec<StorageEntry> = fs::read_dir(target.as_path())
            .map_err(ServiceError::ListEntries)?
            .filter_map(|e| e.ok())
            .filter_map(|entry| {
                let full_path = entry.path();
                if self.attributes.is_hidden_or_system(&full_path) {
                    return None;
                }

                let metadata = match fs::metadata(&full_path) {
                    Ok(metadata) => metadata,
                    Err(err) => {
                        log::warn!("Skipping {}: {err}", full_path.display());
                        return None;
                    }
                };
                let name = match FileName::try_from_str(&entry.file_name().to_string_lossy()) {
                    Ok(name) => name,
                    Err(_) => return None,
                };
                let kind = if metadata.is_dir() {
                    EntryKind::Directory
                } else {
                    EntryKind::File {
                        size: metadata.len(),
                    }
                };

                Some(StorageEntry::new(name, kind))
            })
            .collect();

        entries.sort_by(|a, b| match (a.is_directory(), b.is_directory()) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a
                .name()
                .as_str()
                .to_lowercase()
                .cmp(&b.name().as_str().to_lowercase()),
        });

        Ok(entries.into_iter().map(FileEntryDto::from).collect())
    }

    /// Resolve a downloadable file. Nothing is read here.
    pub fn download_target(&self, path: &str) -> ServiceResult<AbsolutePath> {
        self.validator
            .validated(path, true)
            .filter(AbsolutePath::is_file)
            .ok_or(ServiceError::FileNotFound)
    }

    /// Write the uploaded bytes after validating both the folder and the
    /// final target. Returns the path that was written.
    pub fn persist_upload(&self, intent: UploadIntent) -> ServiceResult<PathBuf> {
        let folder = self
            .validator
            .validated(&intent.folder, true)
            .filter(AbsolutePath::is_dir)
            .ok_or(ServiceError::InvalidUploadPath)?;

        let file_name = FileName::from_client_name(&intent.filename)
            .map_err(|_| ServiceError::InvalidFileName)?;

        let target = self
            .validator
            .validated(folder.as_path().join(file_name.as_str()), false)
            .ok_or(ServiceError::InvalidTargetPath)?;

        fs::write(target.as_path(), &intent.data).map_err(ServiceError::SaveFile)?;

        Ok(target.into_path_buf())
    }
}

impl std::fmt::Debug for FileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileService")
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}
