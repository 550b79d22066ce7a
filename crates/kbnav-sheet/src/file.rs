//! The dataset persisted as a single sheet file on disk.

use crate::error::{Result, SheetError};
use crate::reader::{SheetFormat, SheetReader};
use kbnav::{Dataset, DatasetError, DatasetFile, Row};
use std::io::Write;
use std::path::{Path, PathBuf};

/// File-backed [`Dataset`].
///
/// Uploads must use the same format as the file they replace: a `.xlsx`
/// dataset accepts `.xlsx` uploads only. Accepted uploads are written to a
/// temporary file next to the dataset and renamed over it, so a crash
/// mid-write never leaves a truncated dataset behind.
#[derive(Debug, Clone)]
pub struct SheetDataset {
    path: PathBuf,
    format: SheetFormat,
}

impl SheetDataset {
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let format = SheetFormat::from_file_name(&path.to_string_lossy())?;
        Ok(Self { path, format })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SheetFormat {
        self.format
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("data.{}", self.format.extension()))
    }

    fn write_atomic(&self, bytes: &[u8]) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl Dataset for SheetDataset {
    fn load(&self) -> std::result::Result<Option<Vec<Row>>, DatasetError> {
        if !self.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&self.path)?;
        let rows = SheetReader::read_bytes(self.format, &bytes)?;
        tracing::debug!(path = %self.path.display(), rows = rows.len(), "dataset read");
        Ok(Some(rows))
    }

    fn decode(&self, file: &DatasetFile) -> std::result::Result<Vec<Row>, DatasetError> {
        let format = SheetFormat::from_file_name(&file.file_name)?;
        if format != self.format {
            return Err(SheetError::FormatMismatch {
                file: file.file_name.clone(),
                expected: self.format.extension(),
            }
            .into());
        }
        Ok(SheetReader::read_bytes(format, &file.bytes)?)
    }

    fn store(&self, file: &DatasetFile) -> std::result::Result<(), DatasetError> {
        self.write_atomic(&file.bytes)?;
        tracing::info!(path = %self.path.display(), bytes = file.bytes.len(), "dataset file replaced");
        Ok(())
    }

    fn export(&self) -> std::result::Result<Option<DatasetFile>, DatasetError> {
        if !self.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&self.path)?;
        Ok(Some(DatasetFile::new(self.file_name(), bytes)))
    }
}
