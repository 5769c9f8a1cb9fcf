pub mod config;
pub mod error;
pub mod invoicer;
pub mod log;
pub mod model;
pub mod numbering;
pub mod pdf;
pub mod tax;

pub use config::{LogBackend, Settings};
pub use error::{InvoiceError, Result};
pub use invoicer::{local_now, FinalizedInvoice, InvoicePreview, Invoicer};
pub use log::{open_log, InvoiceLog};
pub use model::{InvoiceForm, InvoiceRecord, InvoiceType, LineItem, LineItemInput, ShipVia};
pub use tax::{TaxRates, TaxSummary};
