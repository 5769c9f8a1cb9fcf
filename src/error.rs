use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InvoiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet read error: {0}")]
    SpreadsheetRead(#[from] calamine::XlsxError),

    #[error("Spreadsheet write error: {0}")]
    SpreadsheetWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invoice log is malformed: {0}")]
    MalformedLog(String),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Invalid settings file {}: {source}", path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Date/time error: {0}")]
    Time(String),
}

impl From<time::error::Parse> for InvoiceError {
    fn from(err: time::error::Parse) -> Self {
        InvoiceError::Time(err.to_string())
    }
}

impl From<time::error::Format> for InvoiceError {
    fn from(err: time::error::Format) -> Self {
        InvoiceError::Time(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InvoiceError>;
