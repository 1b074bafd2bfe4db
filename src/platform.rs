//! Host capabilities: drive enumeration and file attribute inspection.
use std::path::{Path, PathBuf};

/// Source of the top-level roots that bound every filesystem access.
///
/// Implementations are queried on every validation, so removable media that
/// appear or disappear between requests are picked up without a restart.
pub trait DriveSource: Send + Sync {
    fn roots(&self) -> Vec<PathBuf>;
}

/// Roots reported by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemDrives;

impl DriveSource for SystemDrives {
    #[cfg(windows)]
    fn roots(&self) -> Vec<PathBuf> {
        ('A'..='Z')
            .map(|letter| PathBuf::from(format!("{letter}:\\")))
            .filter(|drive| drive.exists())
            .collect()
    }

    #[cfg(not(windows))]
    fn roots(&self) -> Vec<PathBuf> {
        vec![PathBuf::from("/")]
    }
}

/// Fixed allowlist of roots taken from configuration.
#[derive(Clone, Debug, Default)]
pub struct ConfiguredRoots(Vec<PathBuf>);

impl ConfiguredRoots {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self(roots.into_iter().map(Into::into).collect())
    }
}

impl DriveSource for ConfiguredRoots {
    fn roots(&self) -> Vec<PathBuf> {
        self.0.clone()
    }
}

/// Decides whether a directory entry should be hidden from listings.
///
/// This is a cosmetic filter only; it never takes part in access decisions.
pub trait EntryAttributes: Send + Sync {
    fn is_hidden_or_system(&self, path: &Path) -> bool;
}

/// Platform attribute check: hidden/system bits on Windows, dot-files elsewhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAttributes;

impl EntryAttributes for SystemAttributes {
    #[cfg(windows)]
    fn is_hidden_or_system(&self, path: &Path) -> bool {
        use std::os::windows::fs::MetadataExt;

        const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
        const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;

        match path.symlink_metadata() {
            Ok(metadata) => {
                metadata.file_attributes() & (FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM) != 0
            }
            Err(err) => {
                log::warn!("Cannot read attributes of {}: {err}", path.display());
                false
            }
        }
    }

    #[cfg(not(windows))]
    fn is_hidden_or_system(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| name.as_encoded_bytes().starts_with(b"."))
            .unwrap_or(false)
    }
}
