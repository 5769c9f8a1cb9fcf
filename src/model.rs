use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

use crate::error::{InvoiceError, Result};

pub const MAX_LINE_ITEMS: usize = 10;

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
pub const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipVia {
    CustomerPu,
    RiteWaySemi,
}

impl ShipVia {
    pub fn as_str(self) -> &'static str {
        match self {
            ShipVia::CustomerPu => "Customer PU",
            ShipVia::RiteWaySemi => "Rite-Way Semi",
        }
    }
}

impl fmt::Display for ShipVia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipVia {
    type Err = InvoiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Customer PU" => Ok(ShipVia::CustomerPu),
            "Rite-Way Semi" => Ok(ShipVia::RiteWaySemi),
            other => Err(InvoiceError::MalformedLog(format!("unknown ship-via value {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceType {
    Invoice,
    Deposit,
    Credit,
}

impl InvoiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceType::Invoice => "Invoice",
            InvoiceType::Deposit => "Deposit",
            InvoiceType::Credit => "Credit",
        }
    }
}

impl fmt::Display for InvoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceType {
    type Err = InvoiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Invoice" => Ok(InvoiceType::Invoice),
            "Deposit" => Ok(InvoiceType::Deposit),
            "Credit" => Ok(InvoiceType::Credit),
            other => Err(InvoiceError::MalformedLog(format!("unknown invoice type {other:?}"))),
        }
    }
}

/// A line item as typed into the form; the description may still be blank.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemInput {
    pub description: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub description: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct InvoiceForm {
    pub client: String,
    pub client_address: String,
    pub date: Date,
    pub initials: String,
    pub quote_number: String,
    pub ship_via: ShipVia,
    pub invoice_type: InvoiceType,
    pub items: Vec<LineItemInput>,
    pub pst_exempt: bool,
    pub gst_exempt: bool,
}

impl InvoiceForm {
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() || self.items.len() > MAX_LINE_ITEMS {
            return Err(InvoiceError::Validation(format!(
                "an invoice needs between 1 and {MAX_LINE_ITEMS} line items, got {}",
                self.items.len()
            )));
        }
        if let Some((idx, item)) = self
            .items
            .iter()
            .enumerate()
            .find(|(_, it)| it.amount < Decimal::ZERO)
        {
            return Err(InvoiceError::Validation(format!(
                "line item #{} has a negative amount ({})",
                idx + 1,
                item.amount
            )));
        }
        Ok(())
    }

    /// Line items with blank descriptions replaced by `As per quote {quote_number}`.
    pub fn line_items(&self) -> Vec<LineItem> {
        self.items
            .iter()
            .map(|it| {
                let description = if it.description.trim().is_empty() {
                    format!("As per quote {}", self.quote_number)
                } else {
                    it.description.clone()
                };
                LineItem {
                    description,
                    amount: it.amount,
                }
            })
            .collect()
    }

    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(|it| it.amount).sum()
    }
}

/// One finalized invoice, exactly as it is written to the log.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceRecord {
    pub timestamp: PrimitiveDateTime,
    pub invoice_number: String,
    pub client: String,
    pub client_address: Option<String>,
    pub date: Date,
    pub initials: Option<String>,
    pub quote_number: Option<String>,
    pub ship_via: ShipVia,
    pub invoice_type: InvoiceType,
    pub subtotal: Decimal,
    pub pst: Decimal,
    pub gst: Decimal,
    pub total: Decimal,
}

impl InvoiceRecord {
    pub fn timestamp_string(&self) -> Result<String> {
        Ok(self.timestamp.format(TIMESTAMP_FORMAT)?)
    }

    pub fn date_string(&self) -> Result<String> {
        Ok(self.date.format(DATE_FORMAT)?)
    }
}

pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn parse_date(value: &str) -> Result<Date> {
    Ok(Date::parse(value.trim(), DATE_FORMAT)?)
}

pub fn parse_timestamp(value: &str) -> Result<PrimitiveDateTime> {
    Ok(PrimitiveDateTime::parse(value.trim(), TIMESTAMP_FORMAT)?)
}

/// `1234.5` -> `1234.50`, rounded half away from zero. No digit grouping.
pub fn format_money(v: Decimal) -> String {
    let mut rounded = v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    rounded.to_string()
}

pub fn format_currency(v: Decimal) -> String {
    format!("${}", format_money(v))
}

/// Client name made safe for the PDF file name: spaces and `/` become `_`.
pub fn sanitize_client_name(input: &str) -> String {
    input.replace([' ', '/'], "_")
}

pub fn pdf_file_name(invoice_number: &str, client: &str) -> String {
    format!("{}_{}.pdf", invoice_number, sanitize_client_name(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn form_with(items: Vec<LineItemInput>) -> InvoiceForm {
        InvoiceForm {
            client: "Acme Co".to_string(),
            client_address: String::new(),
            date: date!(2024 - 03 - 15),
            initials: "MJ".to_string(),
            quote_number: "Q-100".to_string(),
            ship_via: ShipVia::CustomerPu,
            invoice_type: InvoiceType::Invoice,
            items,
            pst_exempt: false,
            gst_exempt: false,
        }
    }

    fn item(description: &str, amount: Decimal) -> LineItemInput {
        LineItemInput {
            description: description.to_string(),
            amount,
        }
    }

    #[test]
    fn blank_description_uses_quote_number() {
        let form = form_with(vec![item("", Decimal::new(10000, 2)), item("  ", Decimal::ZERO)]);
        let items = form.line_items();
        assert_eq!(items[0].description, "As per quote Q-100");
        assert_eq!(items[1].description, "As per quote Q-100");
    }

    #[test]
    fn explicit_description_is_kept() {
        let form = form_with(vec![item("Fence install", Decimal::new(50000, 2))]);
        assert_eq!(form.line_items()[0].description, "Fence install");
    }

    #[test]
    fn validate_rejects_empty_and_oversized_item_lists() {
        assert!(matches!(form_with(vec![]).validate(), Err(InvoiceError::Validation(_))));

        let eleven = (0..11).map(|_| item("x", Decimal::ONE)).collect();
        assert!(matches!(form_with(eleven).validate(), Err(InvoiceError::Validation(_))));

        let ten = (0..10).map(|_| item("x", Decimal::ONE)).collect();
        assert!(form_with(ten).validate().is_ok());
    }

    #[test]
    fn validate_rejects_negative_amounts() {
        let form = form_with(vec![item("a", Decimal::ONE), item("b", Decimal::new(-5, 0))]);
        let err = form.validate().unwrap_err();
        assert!(err.to_string().contains("#2"));
    }

    #[test]
    fn subtotal_sums_amounts() {
        let form = form_with(vec![item("a", Decimal::new(1050, 2)), item("b", Decimal::new(2025, 2))]);
        assert_eq!(form.subtotal(), Decimal::new(3075, 2));
    }

    #[test]
    fn money_formatting() {
        assert_eq!(format_money(Decimal::new(500, 0)), "500.00");
        assert_eq!(format_money(Decimal::new(12345, 1)), "1234.50");
        assert_eq!(format_money(Decimal::new(1234567891, 2)), "12345678.91");
        assert_eq!(format_money(Decimal::new(-4, 3)), "0.00");
        assert_eq!(format_money(Decimal::new(70035, 4)), "7.00");
        assert_eq!(format_money(Decimal::new(1005, 3)), "1.01");
        assert_eq!(format_currency(Decimal::new(56000, 2)), "$560.00");
        assert_eq!(format_currency(Decimal::new(123450, 2)), "$1234.50");
    }

    #[test]
    fn file_name_sanitizes_spaces_and_slashes() {
        assert_eq!(sanitize_client_name("Acme Co"), "Acme_Co");
        assert_eq!(sanitize_client_name("A/B Fence Ltd"), "A_B_Fence_Ltd");
        assert_eq!(pdf_file_name("KAM001", "Acme Co"), "KAM001_Acme_Co.pdf");
    }

    #[test]
    fn enum_display_round_trips_through_from_str() {
        for sv in [ShipVia::CustomerPu, ShipVia::RiteWaySemi] {
            assert_eq!(sv.to_string().parse::<ShipVia>().unwrap(), sv);
        }
        for ty in [InvoiceType::Invoice, InvoiceType::Deposit, InvoiceType::Credit] {
            assert_eq!(ty.to_string().parse::<InvoiceType>().unwrap(), ty);
        }
        assert!("Courier".parse::<ShipVia>().is_err());
    }

    #[test]
    fn non_empty_maps_blank_to_none() {
        assert_eq!(non_empty(""), None);
        assert_eq!(non_empty("   "), None);
        assert_eq!(non_empty("MJ"), Some("MJ".to_string()));
    }
}
