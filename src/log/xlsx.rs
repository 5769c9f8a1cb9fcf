use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook};
use time::{Date, Duration, Month, PrimitiveDateTime, Time};

use super::{InvoiceLog, COLUMNS, INVOICE_NUMBER_COLUMN};
use crate::error::{InvoiceError, Result};
use crate::model::{self, InvoiceRecord};

const SHEET_NAME: &str = "Sheet1";
const DATE_NUM_FORMAT: &str = "yyyy-mm-dd";
const DATETIME_NUM_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Invoice log kept as a single-sheet workbook (`invoice_log.xlsx`), header row first.
///
/// Appending rewrites the whole workbook: every existing cell is carried over as read, unknown
/// columns included, then the file is replaced through a rename.
pub struct XlsxInvoiceLog {
    path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel serial date (days since 1899-12-30, fraction = time of day).
    Date(f64),
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::Date(dt.as_f64()),
            other => Cell::Text(other.to_string()),
        }
    }
}

struct Sheet {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    fn cell(&self, row: &[Cell], name: &str) -> Result<Cell> {
        let idx = self
            .column(name)
            .ok_or_else(|| InvoiceError::MalformedLog(format!("missing column {name:?}")))?;
        Ok(row.get(idx).cloned().unwrap_or(Cell::Empty))
    }
}

impl XlsxInvoiceLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        XlsxInvoiceLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_sheet(&self) -> Result<Option<Sheet>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut workbook: Xlsx<BufReader<File>> = open_workbook(&self.path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| InvoiceError::MalformedLog("workbook has no worksheets".to_string()))??;

        let mut rows = range.rows();
        let headers = match rows.next() {
            Some(header) => header
                .iter()
                .map(|c| cell_text(&Cell::from(c)).unwrap_or_default())
                .collect(),
            None => Vec::new(),
        };
        let rows = rows
            .map(|r| r.iter().map(Cell::from).collect::<Vec<_>>())
            .filter(|r| r.iter().any(|c| *c != Cell::Empty))
            .collect();

        Ok(Some(Sheet { headers, rows }))
    }

    fn write_sheet(&self, sheet: &Sheet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let date_format = Format::new().set_num_format(DATE_NUM_FORMAT);
        let datetime_format = Format::new().set_num_format(DATETIME_NUM_FORMAT);

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, header, &header_format)?;
        }

        for (idx, row) in sheet.rows.iter().enumerate() {
            let row_num = (idx + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                let col = col as u16;
                match cell {
                    Cell::Empty => {}
                    Cell::Text(s) => {
                        worksheet.write_string(row_num, col, s)?;
                    }
                    Cell::Number(n) => {
                        worksheet.write_number(row_num, col, *n)?;
                    }
                    Cell::Bool(b) => {
                        worksheet.write_boolean(row_num, col, *b)?;
                    }
                    Cell::Date(serial) => {
                        let format = if serial.fract() == 0.0 { &date_format } else { &datetime_format };
                        worksheet.write_number_with_format(row_num, col, *serial, format)?;
                    }
                }
            }
        }

        // Save next to the log, then swap it in so a failed save leaves the old log intact.
        let tmp = self.path.with_extension("xlsx.tmp");
        workbook.save(&tmp)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl InvoiceLog for XlsxInvoiceLog {
    fn load_all(&self) -> Result<Vec<InvoiceRecord>> {
        let Some(sheet) = self.read_sheet()? else {
            return Ok(Vec::new());
        };
        sheet.rows.iter().map(|row| record_from_row(&sheet, row)).collect()
    }

    fn append_one(&self, record: &InvoiceRecord) -> Result<()> {
        let mut sheet = self.read_sheet()?.unwrap_or(Sheet {
            headers: Vec::new(),
            rows: Vec::new(),
        });

        for column in COLUMNS {
            if sheet.column(column).is_none() {
                sheet.headers.push(column.to_string());
            }
        }

        let mut row = vec![Cell::Empty; sheet.headers.len()];
        for (name, cell) in record_cells(record)? {
            if let Some(idx) = sheet.column(name) {
                row[idx] = cell;
            }
        }
        sheet.rows.push(row);

        self.write_sheet(&sheet)?;
        tracing::info!(
            path = %self.path.display(),
            invoice_number = %record.invoice_number,
            rows = sheet.rows.len(),
            "appended invoice to log"
        );
        Ok(())
    }

    fn invoice_numbers(&self) -> Result<Vec<String>> {
        let Some(sheet) = self.read_sheet()? else {
            return Ok(Vec::new());
        };
        let idx = sheet
            .column(INVOICE_NUMBER_COLUMN)
            .ok_or_else(|| InvoiceError::MalformedLog(format!("missing column {INVOICE_NUMBER_COLUMN:?}")))?;
        Ok(sheet
            .rows
            .iter()
            .filter_map(|row| row.get(idx).and_then(cell_text))
            .collect())
    }
}

fn record_cells(record: &InvoiceRecord) -> Result<Vec<(&'static str, Cell)>> {
    let text = |s: &str| Cell::Text(s.to_string());
    let optional = |s: &Option<String>| s.as_deref().map(text).unwrap_or(Cell::Empty);
    // Parsed from the decimal text so the float is the nearest one to the exact amount.
    let number = |d: Decimal| Cell::Number(d.to_string().parse::<f64>().unwrap_or_default());

    Ok(vec![
        ("Timestamp", Cell::Text(record.timestamp_string()?)),
        ("Invoice Number", text(&record.invoice_number)),
        ("Client", text(&record.client)),
        ("Client Address", optional(&record.client_address)),
        ("Date", Cell::Date(date_to_serial(record.date)?)),
        ("Initials", optional(&record.initials)),
        ("Quote Number", optional(&record.quote_number)),
        ("Ship Via", text(record.ship_via.as_str())),
        ("Type", text(record.invoice_type.as_str())),
        ("Amount", number(record.subtotal)),
        ("PST", number(record.pst)),
        ("GST", number(record.gst)),
        ("Total", number(record.total)),
    ])
}

fn record_from_row(sheet: &Sheet, row: &[Cell]) -> Result<InvoiceRecord> {
    let text = |name: &str| -> Result<Option<String>> { Ok(cell_text(&sheet.cell(row, name)?)) };

    Ok(InvoiceRecord {
        timestamp: cell_timestamp(&sheet.cell(row, "Timestamp")?)?,
        invoice_number: text("Invoice Number")?.unwrap_or_default(),
        client: text("Client")?.unwrap_or_default(),
        client_address: text("Client Address")?,
        date: cell_date(&sheet.cell(row, "Date")?)?,
        initials: text("Initials")?,
        quote_number: text("Quote Number")?,
        ship_via: text("Ship Via")?.unwrap_or_default().parse()?,
        invoice_type: text("Type")?.unwrap_or_default().parse()?,
        subtotal: cell_decimal(&sheet.cell(row, "Amount")?)?,
        pst: cell_decimal(&sheet.cell(row, "PST")?)?,
        gst: cell_decimal(&sheet.cell(row, "GST")?)?,
        total: cell_decimal(&sheet.cell(row, "Total")?)?,
    })
}

fn cell_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Text(s) => model::non_empty(s),
        Cell::Number(n) => Some(n.to_string()),
        Cell::Bool(b) => Some(b.to_string()),
        Cell::Date(serial) => serial_to_datetime(*serial)
            .ok()
            .and_then(|dt| dt.date().format(model::DATE_FORMAT).ok()),
    }
}

fn cell_decimal(cell: &Cell) -> Result<Decimal> {
    let raw = match cell {
        // Shortest round-trip text of the float, so 8.6415 reads back as 8.6415.
        Cell::Number(n) => n.to_string(),
        Cell::Text(s) => s.trim().to_string(),
        Cell::Empty => return Ok(Decimal::ZERO),
        other => return Err(InvoiceError::MalformedLog(format!("expected an amount, found {other:?}"))),
    };
    Decimal::from_str(&raw).map_err(|e| InvoiceError::MalformedLog(format!("invalid amount {raw:?}: {e}")))
}

fn cell_date(cell: &Cell) -> Result<Date> {
    match cell {
        Cell::Date(serial) | Cell::Number(serial) => Ok(serial_to_datetime(*serial)?.date()),
        Cell::Text(s) => {
            // Tolerate `2024-03-15 00:00:00` as written by some spreadsheet tools.
            let s = s.trim();
            model::parse_date(s.get(..10).unwrap_or(s))
        }
        other => Err(InvoiceError::MalformedLog(format!("expected a date, found {other:?}"))),
    }
}

fn cell_timestamp(cell: &Cell) -> Result<PrimitiveDateTime> {
    match cell {
        Cell::Date(serial) | Cell::Number(serial) => serial_to_datetime(*serial),
        Cell::Text(s) => model::parse_timestamp(s),
        other => Err(InvoiceError::MalformedLog(format!("expected a timestamp, found {other:?}"))),
    }
}

fn excel_epoch() -> Result<PrimitiveDateTime> {
    let date = Date::from_calendar_date(1899, Month::December, 30).map_err(|e| InvoiceError::Time(e.to_string()))?;
    Ok(PrimitiveDateTime::new(date, Time::MIDNIGHT))
}

fn serial_to_datetime(serial: f64) -> Result<PrimitiveDateTime> {
    let days = serial.floor();
    let seconds = ((serial - days) * 86_400.0).round() as i64;
    excel_epoch()?
        .checked_add(Duration::days(days as i64) + Duration::seconds(seconds))
        .ok_or_else(|| InvoiceError::MalformedLog(format!("date serial {serial} out of range")))
}

fn date_to_serial(date: Date) -> Result<f64> {
    let elapsed = PrimitiveDateTime::new(date, Time::MIDNIGHT) - excel_epoch()?;
    Ok(elapsed.whole_days() as f64)
}
