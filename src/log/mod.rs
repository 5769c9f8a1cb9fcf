pub mod sqlite;
pub mod xlsx;

use crate::config::{LogBackend, Settings};
use crate::error::Result;
use crate::model::InvoiceRecord;

pub use sqlite::SqliteInvoiceLog;
pub use xlsx::XlsxInvoiceLog;

/// Column headers of the log, in order. `Amount` holds the subtotal.
pub const COLUMNS: [&str; 13] = [
    "Timestamp",
    "Invoice Number",
    "Client",
    "Client Address",
    "Date",
    "Initials",
    "Quote Number",
    "Ship Via",
    "Type",
    "Amount",
    "PST",
    "GST",
    "Total",
];

pub const INVOICE_NUMBER_COLUMN: &str = "Invoice Number";

/// Append-only history of finalized invoices.
///
/// Implementations rewrite or insert without any cross-process locking; two finalizes racing
/// on the same backing file can lose an update or reuse a number.
pub trait InvoiceLog {
    /// Every logged invoice in insertion order. A log that does not exist yet is empty.
    fn load_all(&self) -> Result<Vec<InvoiceRecord>>;

    /// Adds `record` as the last entry.
    fn append_one(&self, record: &InvoiceRecord) -> Result<()>;

    /// Non-empty invoice numbers in insertion order. Backends override this to avoid parsing
    /// whole rows when only the numbers are needed.
    fn invoice_numbers(&self) -> Result<Vec<String>> {
        Ok(self
            .load_all()?
            .into_iter()
            .map(|r| r.invoice_number)
            .filter(|n| !n.trim().is_empty())
            .collect())
    }
}

pub fn open_log(settings: &Settings) -> Result<Box<dyn InvoiceLog>> {
    match settings.log_backend {
        LogBackend::Xlsx => Ok(Box::new(XlsxInvoiceLog::new(&settings.log_path))),
        LogBackend::Sqlite => Ok(Box::new(SqliteInvoiceLog::open(&settings.log_path)?)),
    }
}
