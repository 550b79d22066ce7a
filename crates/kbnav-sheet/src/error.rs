use kbnav::DatasetError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SheetError>;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("workbook has no worksheet")]
    NoWorksheet,

    #[error("unsupported file type: {0:?} (expected .csv, .json or .xlsx)")]
    UnsupportedFormat(String),

    /// An upload whose format differs from the dataset file it would replace.
    #[error("expected a .{expected} file, got {file:?}")]
    FormatMismatch { file: String, expected: &'static str },

    #[error("missing required column {0:?}")]
    MissingColumn(&'static str),

    /// `line` is the 1-based line (CSV), sheet row (xlsx) or array
    /// position (JSON) of the offending record.
    #[error("line {line}: column {column:?} has invalid value {value:?}")]
    InvalidCell {
        line: usize,
        column: &'static str,
        value: String,
    },
}

impl From<SheetError> for DatasetError {
    fn from(e: SheetError) -> Self {
        match e {
            SheetError::Io(io) => DatasetError::Io(io),
            other => DatasetError::Format(other.to_string()),
        }
    }
}
