use serde::{Deserialize, Serialize};

/// Serializable directory entry returned by `/files`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntryDto {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

impl From<crate::domain::StorageEntry> for FileEntryDto {
    fn from(entry: crate::domain::StorageEntry) -> Self {
        let is_dir = entry.is_directory();
        let size = entry.size();
        let name = entry.into_name().into_string();

        Self { name, is_dir, size }
    }
}
