use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{InvoiceError, Result};

pub const DEFAULT_SETTINGS_FILE: &str = "invoice_settings.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogBackend {
    Xlsx,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub company_name: String,
    pub company_address_line: String,
    pub company_city_line: String,
    pub logo_path: PathBuf,
    pub log_path: PathBuf,
    pub log_backend: LogBackend,
    pub output_dir: PathBuf,
    pub invoice_prefix: String,
    /// Stored as strings in the JSON file ("0.07") so no float rounding creeps in.
    #[serde(with = "rust_decimal::serde::str")]
    pub pst_rate: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub gst_rate: Decimal,
    pub terms: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            company_name: "Rite-Way Fencing (Kamloops) Inc.".to_string(),
            company_address_line: "405 Chilcotin Rd.".to_string(),
            company_city_line: "Kamloops, BC V2H 1G3".to_string(),
            logo_path: PathBuf::from("RitewayLogoWeb.png"),
            log_path: PathBuf::from("invoice_log.xlsx"),
            log_backend: LogBackend::Xlsx,
            output_dir: PathBuf::from("Client Invoices"),
            invoice_prefix: "KAM".to_string(),
            pst_rate: Decimal::new(7, 2),
            gst_rate: Decimal::new(5, 2),
            terms: default_terms(),
        }
    }
}

fn default_terms() -> Vec<String> {
    [
        "* Due upon receipt unless previous arrangements made",
        "* Approved credit customers net 30 days",
        "* 1 1/2 per month (18% per annum) service charge on all overdue",
        "* Minimum charge $20.00",
        "* Shortages must be reported on delivery",
        "* Goods returned without our permission are subject to 20% restocking charge",
        "* We do not accept returns after 30 days.",
        "Make all checks payable to Rite-Way Fencing (Kamloops) Inc.",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Settings {
    /// Reads settings from `path` when the file exists, otherwise returns the defaults.
    /// Keys missing from the file keep their default values.
    pub fn load(path: &Path) -> Result<Settings> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "settings file not found, using defaults");
            return Ok(Settings::default());
        }

        let json = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str::<Settings>(&json).map_err(|source| InvoiceError::Settings {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn company_lines(&self) -> [&str; 3] {
        [
            self.company_name.as_str(),
            self.company_address_line.as_str(),
            self.company_city_line.as_str(),
        ]
    }
}
