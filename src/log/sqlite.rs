use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use rusqlite::{params, Connection};
use rust_decimal::Decimal;

use super::InvoiceLog;
use crate::error::{InvoiceError, Result};
use crate::model::{self, InvoiceRecord};

/// Invoice log kept in an embedded SQLite database. Rows are ordered by their autoincrement id,
/// so "last row" means the most recently inserted invoice.
pub struct SqliteInvoiceLog {
    conn: Connection,
}

struct RawRow {
    timestamp: String,
    invoice_number: String,
    client: String,
    client_address: Option<String>,
    date: String,
    initials: Option<String>,
    quote_number: Option<String>,
    ship_via: String,
    invoice_type: String,
    subtotal: String,
    pst: String,
    gst: String,
    total: String,
}

fn configure_sqlite(conn: &Connection) -> std::result::Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;\n\
         PRAGMA synchronous = NORMAL;\n\
         PRAGMA busy_timeout = 5000;\n",
    )?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

fn init_schema(conn: &Connection) -> std::result::Result<(), rusqlite::Error> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS invoice_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            invoiceNumber TEXT NOT NULL,
            client TEXT NOT NULL,
            clientAddress TEXT,
            date TEXT NOT NULL,
            initials TEXT,
            quoteNumber TEXT,
            shipVia TEXT NOT NULL,
            type TEXT NOT NULL,
            subtotal TEXT NOT NULL,
            pst TEXT NOT NULL,
            gst TEXT NOT NULL,
            total TEXT NOT NULL
        );
        "#,
    )
}

fn parse_amount(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).map_err(|e| InvoiceError::MalformedLog(format!("invalid amount {raw:?}: {e}")))
}

impl SqliteInvoiceLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        configure_sqlite(&conn)?;
        init_schema(&conn)?;
        tracing::debug!(path = %path.display(), "opened sqlite invoice log");
        Ok(SqliteInvoiceLog { conn })
    }

    fn read_raw_rows(&self) -> Result<Vec<RawRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, invoiceNumber, client, clientAddress, date, initials, quoteNumber, shipVia, type, subtotal, pst, gst, total FROM invoice_log ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok(RawRow {
                    timestamp: r.get(0)?,
                    invoice_number: r.get(1)?,
                    client: r.get(2)?,
                    client_address: r.get(3)?,
                    date: r.get(4)?,
                    initials: r.get(5)?,
                    quote_number: r.get(6)?,
                    ship_via: r.get(7)?,
                    invoice_type: r.get(8)?,
                    subtotal: r.get(9)?,
                    pst: r.get(10)?,
                    gst: r.get(11)?,
                    total: r.get(12)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl InvoiceLog for SqliteInvoiceLog {
    fn load_all(&self) -> Result<Vec<InvoiceRecord>> {
        self.read_raw_rows()?
            .into_iter()
            .map(|raw| -> Result<InvoiceRecord> {
                Ok(InvoiceRecord {
                    timestamp: model::parse_timestamp(&raw.timestamp)?,
                    invoice_number: raw.invoice_number,
                    client: raw.client,
                    client_address: raw.client_address,
                    date: model::parse_date(&raw.date)?,
                    initials: raw.initials,
                    quote_number: raw.quote_number,
                    ship_via: raw.ship_via.parse()?,
                    invoice_type: raw.invoice_type.parse()?,
                    subtotal: parse_amount(&raw.subtotal)?,
                    pst: parse_amount(&raw.pst)?,
                    gst: parse_amount(&raw.gst)?,
                    total: parse_amount(&raw.total)?,
                })
            })
            .collect()
    }

    fn append_one(&self, record: &InvoiceRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO invoice_log (timestamp, invoiceNumber, client, clientAddress, date, initials, quoteNumber, shipVia, type, subtotal, pst, gst, total) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                record.timestamp_string()?,
                record.invoice_number,
                record.client,
                record.client_address,
                record.date_string()?,
                record.initials,
                record.quote_number,
                record.ship_via.as_str(),
                record.invoice_type.as_str(),
                record.subtotal.to_string(),
                record.pst.to_string(),
                record.gst.to_string(),
                record.total.to_string(),
            ],
        )?;
        tracing::info!(invoice_number = %record.invoice_number, "appended invoice to sqlite log");
        Ok(())
    }

    fn invoice_numbers(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT invoiceNumber FROM invoice_log WHERE TRIM(invoiceNumber) <> '' ORDER BY id ASC")?;
        let numbers = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(numbers)
    }
}
