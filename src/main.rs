use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use time::{Date, OffsetDateTime};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use riteway_invoice_lib::config::DEFAULT_SETTINGS_FILE;
use riteway_invoice_lib::model::{self, format_currency};
use riteway_invoice_lib::{
    local_now, InvoiceForm, InvoiceType, Invoicer, LineItemInput, Settings, ShipVia, TaxSummary,
};

#[derive(Parser, Debug)]
#[command(name = "riteway-invoice", about = "Rite-Way Fencing invoice generator")]
struct Cli {
    /// JSON settings file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the totals and the invoice number a finalize would use.
    Preview(FormArgs),

    /// Log the invoice, write its PDF and open it.
    Finalize {
        #[command(flatten)]
        form: FormArgs,

        #[arg(long)]
        no_open: bool,
    },

    /// Print the invoice number the next finalize will use.
    NextNumber,

    /// List logged invoices.
    Log,
}

#[derive(Args, Debug)]
struct FormArgs {
    #[arg(long, default_value = "")]
    client: String,

    #[arg(long, default_value = "")]
    client_address: String,

    /// Invoice date (YYYY-MM-DD), today when omitted.
    #[arg(long, value_parser = parse_date_arg)]
    date: Option<Date>,

    #[arg(long, default_value = "")]
    initials: String,

    #[arg(long, default_value = "")]
    quote_number: String,

    #[arg(long, value_enum, default_value_t = ShipViaArg::CustomerPu)]
    ship_via: ShipViaArg,

    #[arg(long = "type", value_enum, default_value_t = InvoiceTypeArg::Invoice)]
    invoice_type: InvoiceTypeArg,

    /// Line item as "DESCRIPTION=AMOUNT"; repeat for up to 10 items.
    #[arg(long = "item", value_parser = parse_item_arg, required = true)]
    items: Vec<LineItemInput>,

    #[arg(long)]
    pst_exempt: bool,

    #[arg(long)]
    gst_exempt: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ShipViaArg {
    CustomerPu,
    RiteWaySemi,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InvoiceTypeArg {
    Invoice,
    Deposit,
    Credit,
}

impl From<ShipViaArg> for ShipVia {
    fn from(arg: ShipViaArg) -> Self {
        match arg {
            ShipViaArg::CustomerPu => ShipVia::CustomerPu,
            ShipViaArg::RiteWaySemi => ShipVia::RiteWaySemi,
        }
    }
}

impl From<InvoiceTypeArg> for InvoiceType {
    fn from(arg: InvoiceTypeArg) -> Self {
        match arg {
            InvoiceTypeArg::Invoice => InvoiceType::Invoice,
            InvoiceTypeArg::Deposit => InvoiceType::Deposit,
            InvoiceTypeArg::Credit => InvoiceType::Credit,
        }
    }
}

fn parse_date_arg(s: &str) -> Result<Date, String> {
    model::parse_date(s).map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn parse_item_arg(s: &str) -> Result<LineItemInput, String> {
    let (description, amount) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected DESCRIPTION=AMOUNT, got {s:?}"))?;
    let amount = Decimal::from_str(amount.trim().trim_start_matches('$').replace(',', "").as_str())
        .map_err(|e| format!("invalid amount {amount:?}: {e}"))?;
    Ok(LineItemInput {
        description: description.trim().to_string(),
        amount,
    })
}

fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

impl FormArgs {
    fn into_form(self) -> InvoiceForm {
        InvoiceForm {
            client: self.client.trim().to_string(),
            client_address: self.client_address,
            date: self.date.unwrap_or_else(today),
            initials: self.initials.trim().to_string(),
            quote_number: self.quote_number.trim().to_string(),
            ship_via: self.ship_via.into(),
            invoice_type: self.invoice_type.into(),
            items: self.items,
            pst_exempt: self.pst_exempt,
            gst_exempt: self.gst_exempt,
        }
    }
}

fn tax_line(label: &str, amount: Decimal, exempt: bool) -> String {
    if exempt {
        format!("{label:<10}Exempt")
    } else {
        format!("{label:<10}{}", format_currency(amount))
    }
}

fn print_totals(taxes: &TaxSummary, form: &InvoiceForm) {
    println!("{:<10}{}", "Subtotal", format_currency(taxes.subtotal));
    println!("{}", tax_line("PST", taxes.pst, form.pst_exempt));
    println!("{}", tax_line("GST", taxes.gst, form.gst_exempt));
    println!("{:<10}{}", "Total", format_currency(taxes.total));
}

fn open_pdf(path: &Path) -> bool {
    match opener::open(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not open pdf viewer");
            false
        }
    }
}

fn saved_message(invoice_number: &str, opened: bool) -> String {
    if opened {
        format!("Invoice {invoice_number} saved and opened!")
    } else {
        format!("Invoice {invoice_number} saved!")
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let settings = Settings::load(&cli.settings)
        .with_context(|| format!("loading settings from {}", cli.settings.display()))?;
    let invoicer = Invoicer::from_settings(settings).context("opening the invoice log")?;

    match cli.command {
        Command::Preview(args) => {
            let form = args.into_form();
            let preview = invoicer.preview(&form)?;
            println!("Invoice {}", preview.invoice_number);
            for item in &preview.line_items {
                println!("  {:<40}{}", item.description, format_currency(item.amount));
            }
            print_totals(&preview.taxes, &form);
        }

        Command::Finalize { form, no_open } => {
            let form = form.into_form();
            let done = invoicer.finalize(&form, local_now()?)?;

            let opened = !no_open && open_pdf(&done.pdf_path);
            println!("{}", saved_message(&done.record.invoice_number, opened));
        }

        Command::NextNumber => {
            println!("{}", invoicer.next_invoice_number());
        }

        Command::Log => {
            let records = invoicer.log().load_all()?;
            if records.is_empty() {
                println!("No invoices logged yet.");
            }
            for rec in records {
                println!(
                    "{:<8} {} {:<8} {:<30} {:>12}",
                    rec.invoice_number,
                    rec.date_string()?,
                    rec.invoice_type.as_str(),
                    rec.client,
                    format_currency(rec.total)
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn item_splits_at_last_equals() {
        let item = parse_item_arg("Gate a=b=1,250.50").unwrap();
        assert_eq!(item.description, "Gate a=b");
        assert_eq!(item.amount, Decimal::new(125050, 2));

        let blank = parse_item_arg("=500").unwrap();
        assert_eq!(blank.description, "");
        assert_eq!(blank.amount, Decimal::new(500, 0));

        assert!(parse_item_arg("no amount").is_err());
        assert!(parse_item_arg("Posts=abc").is_err());
    }

    #[test]
    fn finalize_flags_build_a_form() {
        let cli = Cli::try_parse_from([
            "riteway-invoice",
            "finalize",
            "--client",
            "Acme Co",
            "--date",
            "2024-03-15",
            "--ship-via",
            "rite-way-semi",
            "--type",
            "deposit",
            "--item",
            "Fence install=500",
            "--item",
            "=20",
            "--gst-exempt",
            "--no-open",
        ])
        .unwrap();

        let Command::Finalize { form, no_open } = cli.command else {
            panic!("expected finalize");
        };
        assert!(no_open);
        let form = form.into_form();
        assert_eq!(form.client, "Acme Co");
        assert_eq!(form.date, time::macros::date!(2024 - 03 - 15));
        assert_eq!(form.ship_via, ShipVia::RiteWaySemi);
        assert_eq!(form.invoice_type, InvoiceType::Deposit);
        assert_eq!(form.items.len(), 2);
        assert!(form.gst_exempt && !form.pst_exempt);
        assert_eq!(cli.settings, PathBuf::from(DEFAULT_SETTINGS_FILE));
    }

    #[test]
    fn saved_message_only_claims_open_when_the_viewer_launched() {
        assert_eq!(saved_message("KAM001", true), "Invoice KAM001 saved and opened!");
        assert_eq!(saved_message("KAM001", false), "Invoice KAM001 saved!");
    }

    #[test]
    fn every_subcommand_has_help_text() {
        let cli = Cli::command();
        for sub in cli.get_subcommands().filter(|s| s.get_name() != "help") {
            assert!(sub.get_about().is_some(), "{} has no description", sub.get_name());
        }
    }

    #[test]
    fn items_are_required() {
        assert!(Cli::try_parse_from(["riteway-invoice", "preview", "--client", "X"]).is_err());
    }
}
