//! The seam between the core and wherever the dataset file lives.

use crate::error::DatasetError;
use crate::types::Row;
use std::sync::{Mutex, PoisonError};

/// A dataset file as uploaded or downloaded by an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl DatasetFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Lowercased extension of `file_name`, without the dot.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

/// Storage and decoding of the persisted dataset.
///
/// Implementations turn files into rows; they never validate the tree
/// shape, which is [`Tree::build`](crate::Tree::build)'s job.
pub trait Dataset: Send + Sync {
    /// Rows of the persisted dataset, or `None` if there is none yet.
    fn load(&self) -> Result<Option<Vec<Row>>, DatasetError>;

    /// Decode an uploaded file. Wrong shapes are [`DatasetError::Format`].
    fn decode(&self, file: &DatasetFile) -> Result<Vec<Row>, DatasetError>;

    /// Persist an accepted upload, replacing the previous dataset.
    fn store(&self, file: &DatasetFile) -> Result<(), DatasetError>;

    /// The persisted dataset file, for download.
    fn export(&self) -> Result<Option<DatasetFile>, DatasetError>;
}

/// Dataset kept in memory, encoded as a JSON array of rows.
///
/// Useful for embedding and tests; nothing touches the filesystem.
#[derive(Debug, Default)]
pub struct MemoryDataset {
    file: Mutex<Option<DatasetFile>>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: &[Row]) -> Result<Self, DatasetError> {
        let bytes = serde_json::to_vec(rows)
            .map_err(|e| DatasetError::Format(format!("cannot encode rows: {}", e)))?;
        Ok(Self {
            file: Mutex::new(Some(DatasetFile::new("data.json", bytes))),
        })
    }

    fn decode_json(file: &DatasetFile) -> Result<Vec<Row>, DatasetError> {
        if file.extension().as_deref() != Some("json") {
            return Err(DatasetError::Format(format!(
                "expected a .json file, got {:?}",
                file.file_name
            )));
        }
        serde_json::from_slice(&file.bytes).map_err(|e| DatasetError::Format(e.to_string()))
    }
}

impl Dataset for MemoryDataset {
    fn load(&self) -> Result<Option<Vec<Row>>, DatasetError> {
        let file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.as_ref().map(Self::decode_json).transpose()
    }

    fn decode(&self, file: &DatasetFile) -> Result<Vec<Row>, DatasetError> {
        Self::decode_json(file)
    }

    fn store(&self, file: &DatasetFile) -> Result<(), DatasetError> {
        *self.file.lock().unwrap_or_else(PoisonError::into_inner) = Some(file.clone());
        Ok(())
    }

    fn export(&self) -> Result<Option<DatasetFile>, DatasetError> {
        Ok(self
            .file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(
            DatasetFile::new("Data.CSV", "").extension().as_deref(),
            Some("csv")
        );
        assert_eq!(DatasetFile::new("README", "").extension(), None);
    }

    #[test]
    fn test_memory_dataset_empty() {
        let ds = MemoryDataset::new();
        assert!(ds.load().unwrap().is_none());
        assert!(ds.export().unwrap().is_none());
    }

    #[test]
    fn test_memory_dataset_round_trip() {
        let rows = vec![Row::new(1, "Root"), Row::new(2, "A").with_parent(1)];
        let ds = MemoryDataset::with_rows(&rows).unwrap();
        assert_eq!(ds.load().unwrap().unwrap(), rows);
    }

    #[test]
    fn test_memory_dataset_rejects_other_extensions() {
        let ds = MemoryDataset::new();
        let err = ds.decode(&DatasetFile::new("data.xlsx", "[]")).unwrap_err();
        assert!(matches!(err, DatasetError::Format(_)));
    }

    #[test]
    fn test_memory_dataset_rejects_bad_json() {
        let ds = MemoryDataset::new();
        let err = ds
            .decode(&DatasetFile::new("data.json", r#"{"id": 1}"#))
            .unwrap_err();
        assert!(matches!(err, DatasetError::Format(_)));
    }
}
