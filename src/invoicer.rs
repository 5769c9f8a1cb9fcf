use std::path::PathBuf;

use time::{OffsetDateTime, PrimitiveDateTime};

use crate::config::Settings;
use crate::error::{InvoiceError, Result};
use crate::log::{open_log, InvoiceLog};
use crate::model::{self, InvoiceForm, InvoiceRecord, LineItem};
use crate::numbering;
use crate::pdf;
use crate::tax::{TaxRates, TaxSummary};

#[derive(Debug, Clone)]
pub struct InvoicePreview {
    pub invoice_number: String,
    pub line_items: Vec<LineItem>,
    pub taxes: TaxSummary,
}

#[derive(Debug, Clone)]
pub struct FinalizedInvoice {
    pub record: InvoiceRecord,
    pub line_items: Vec<LineItem>,
    pub pdf_path: PathBuf,
}

/// Ties the form to the log and the renderer. One finalize at a time; nothing here guards against
/// another process finalizing against the same log.
pub struct Invoicer {
    settings: Settings,
    log: Box<dyn InvoiceLog>,
}

impl Invoicer {
    pub fn new(settings: Settings, log: Box<dyn InvoiceLog>) -> Self {
        Invoicer { settings, log }
    }

    pub fn from_settings(settings: Settings) -> Result<Self> {
        let log = open_log(&settings)?;
        Ok(Invoicer::new(settings, log))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn log(&self) -> &dyn InvoiceLog {
        self.log.as_ref()
    }

    fn rates(&self) -> TaxRates {
        TaxRates {
            pst: self.settings.pst_rate,
            gst: self.settings.gst_rate,
        }
    }

    pub fn next_invoice_number(&self) -> String {
        numbering::next_invoice_number(self.log.as_ref(), &self.settings.invoice_prefix)
    }

    pub fn pdf_path(&self, invoice_number: &str, client: &str) -> PathBuf {
        self.settings
            .output_dir
            .join(model::pdf_file_name(invoice_number, client))
    }

    /// Totals and the number a finalize would allocate right now. No side effects.
    pub fn preview(&self, form: &InvoiceForm) -> Result<InvoicePreview> {
        form.validate()?;
        Ok(InvoicePreview {
            invoice_number: self.next_invoice_number(),
            line_items: form.line_items(),
            taxes: TaxSummary::compute(form.subtotal(), form.pst_exempt, form.gst_exempt, self.rates()),
        })
    }

    /// Allocates a number, logs the invoice and writes its PDF. Any error aborts the whole
    /// operation; the PDF is rendered in memory before anything touches the disk.
    pub fn finalize(&self, form: &InvoiceForm, now: PrimitiveDateTime) -> Result<FinalizedInvoice> {
        let preview = self.preview(form)?;
        let taxes = preview.taxes;

        let record = InvoiceRecord {
            timestamp: now,
            invoice_number: preview.invoice_number,
            client: form.client.clone(),
            client_address: model::non_empty(&form.client_address),
            date: form.date,
            initials: model::non_empty(&form.initials),
            quote_number: model::non_empty(&form.quote_number),
            ship_via: form.ship_via,
            invoice_type: form.invoice_type,
            subtotal: taxes.subtotal,
            pst: taxes.pst,
            gst: taxes.gst,
            total: taxes.total,
        };

        let bytes = pdf::render_invoice_pdf_bytes(&record, &preview.line_items, &self.settings)?;

        std::fs::create_dir_all(&self.settings.output_dir)?;
        self.log.append_one(&record)?;

        let pdf_path = self.pdf_path(&record.invoice_number, &record.client);
        std::fs::write(&pdf_path, bytes)?;

        tracing::info!(
            invoice_number = %record.invoice_number,
            client = %record.client,
            total = %record.total,
            path = %pdf_path.display(),
            "finalized invoice"
        );

        Ok(FinalizedInvoice {
            record,
            line_items: preview.line_items,
            pdf_path,
        })
    }
}

/// Local wall-clock time to the second; falls back to UTC when the local offset is unknown.
pub fn local_now() -> Result<PrimitiveDateTime> {
    let now = OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .replace_nanosecond(0)
        .map_err(|e| InvoiceError::Time(e.to_string()))?;
    Ok(PrimitiveDateTime::new(now.date(), now.time()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogBackend;
    use crate::model::{InvoiceType, LineItemInput, ShipVia};
    use rust_decimal::Decimal;
    use std::path::Path;
    use time::macros::{date, datetime};

    fn settings_in(dir: &Path, backend: LogBackend) -> Settings {
        let log_name = match backend {
            LogBackend::Xlsx => "invoice_log.xlsx",
            LogBackend::Sqlite => "invoice_log.db",
        };
        Settings {
            logo_path: dir.join("RitewayLogoWeb.png"),
            log_path: dir.join(log_name),
            log_backend: backend,
            output_dir: dir.join("Client Invoices"),
            ..Settings::default()
        }
    }

    fn acme_form() -> InvoiceForm {
        InvoiceForm {
            client: "Acme Co".to_string(),
            client_address: String::new(),
            date: date!(2024 - 03 - 15),
            initials: "MJ".to_string(),
            quote_number: String::new(),
            ship_via: ShipVia::CustomerPu,
            invoice_type: InvoiceType::Invoice,
            items: vec![LineItemInput {
                description: "Fence install".to_string(),
                amount: Decimal::new(50000, 2),
            }],
            pst_exempt: false,
            gst_exempt: false,
        }
    }

    fn page_count(path: &Path) -> usize {
        lopdf::Document::load(path).unwrap().get_pages().len()
    }

    #[test]
    fn acme_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let invoicer = Invoicer::from_settings(settings_in(dir.path(), LogBackend::Xlsx)).unwrap();

        let done = invoicer.finalize(&acme_form(), datetime!(2024-03-15 09:00:00)).unwrap();

        assert_eq!(done.record.invoice_number, "KAM001");
        assert_eq!(done.record.subtotal, Decimal::new(500, 0));
        assert_eq!(done.record.pst, Decimal::new(35, 0));
        assert_eq!(done.record.gst, Decimal::new(25, 0));
        assert_eq!(done.record.total, Decimal::new(560, 0));
        assert_eq!(done.record.quote_number, None);
        assert_eq!(done.pdf_path, dir.path().join("Client Invoices").join("KAM001_Acme_Co.pdf"));
        assert_eq!(page_count(&done.pdf_path), 4);

        let logged = invoicer.log().load_all().unwrap();
        assert_eq!(logged, vec![done.record]);
    }

    #[test]
    fn consecutive_finalizes_increment_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let invoicer = Invoicer::from_settings(settings_in(dir.path(), LogBackend::Xlsx)).unwrap();

        let first = invoicer.finalize(&acme_form(), datetime!(2024-03-15 09:00:00)).unwrap();
        let mut form = acme_form();
        form.client = "Bob/Sons Ltd".to_string();
        let second = invoicer.finalize(&form, datetime!(2024-03-15 09:05:00)).unwrap();

        assert_eq!(first.record.invoice_number, "KAM001");
        assert_eq!(second.record.invoice_number, "KAM002");
        assert!(second.pdf_path.ends_with("KAM002_Bob_Sons_Ltd.pdf"));
        assert_eq!(invoicer.next_invoice_number(), "KAM003");
    }

    #[test]
    fn preview_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path(), LogBackend::Xlsx);
        let invoicer = Invoicer::from_settings(settings.clone()).unwrap();

        let mut form = acme_form();
        form.pst_exempt = true;
        form.items[0].description = String::new();
        form.quote_number = "Q-100".to_string();

        let preview = invoicer.preview(&form).unwrap();
        assert_eq!(preview.invoice_number, "KAM001");
        assert_eq!(preview.taxes.pst, Decimal::ZERO);
        assert_eq!(preview.taxes.total, Decimal::new(525, 0));
        assert_eq!(preview.line_items[0].description, "As per quote Q-100");
        assert!(!settings.log_path.exists());
        assert!(!settings.output_dir.exists());
    }

    #[test]
    fn invalid_form_leaves_log_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path(), LogBackend::Xlsx);
        let invoicer = Invoicer::from_settings(settings.clone()).unwrap();

        let mut form = acme_form();
        form.items.clear();
        assert!(matches!(
            invoicer.finalize(&form, datetime!(2024-03-15 09:00:00)),
            Err(InvoiceError::Validation(_))
        ));
        assert!(!settings.log_path.exists());
    }

    #[test]
    fn unwritable_output_dir_aborts_before_logging() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path(), LogBackend::Xlsx);
        std::fs::write(&settings.output_dir, b"a file where the folder should be").unwrap();
        let invoicer = Invoicer::from_settings(settings.clone()).unwrap();

        assert!(matches!(
            invoicer.finalize(&acme_form(), datetime!(2024-03-15 09:00:00)),
            Err(InvoiceError::Io(_))
        ));
        assert!(invoicer.log().load_all().unwrap().is_empty());
    }

    #[test]
    fn sqlite_backend_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let invoicer = Invoicer::from_settings(settings_in(dir.path(), LogBackend::Sqlite)).unwrap();

        let first = invoicer.finalize(&acme_form(), datetime!(2024-03-15 09:00:00)).unwrap();
        let second = invoicer.finalize(&acme_form(), datetime!(2024-03-15 09:01:00)).unwrap();

        assert_eq!(first.record.invoice_number, "KAM001");
        assert_eq!(second.record.invoice_number, "KAM002");
        assert_eq!(invoicer.log().load_all().unwrap().len(), 2);
        assert_eq!(page_count(&second.pdf_path), 4);
    }

    #[test]
    fn local_now_has_whole_seconds() {
        assert_eq!(local_now().unwrap().nanosecond(), 0);
    }
}
