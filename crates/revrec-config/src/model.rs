use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Engine-wide settings. Every field has a default so partial files load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_currency_value")]
    pub default_currency: String,
    /// Free-text terms applied to contracts that carry none, e.g. `"monthly"`.
    #[serde(default = "Config::default_payment_terms_value")]
    pub default_payment_terms: String,
    #[serde(default = "Config::default_due_days_value")]
    pub default_due_days: u32,
    /// Contracts longer than this get a financing-component warning.
    #[serde(default = "Config::default_financing_warning_months_value")]
    pub financing_warning_months: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Where documents are stored. Defaults to `{base}/data`.
    pub data_root: Option<PathBuf>,

    /// Tenants visited by `sweep` when none are named explicitly.
    #[serde(default)]
    pub sweep_tenants: Vec<String>,
    #[serde(default = "Config::default_log_filter_value")]
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_currency: Self::default_currency_value(),
            default_payment_terms: Self::default_payment_terms_value(),
            default_due_days: Self::default_due_days_value(),
            financing_warning_months: Self::default_financing_warning_months_value(),
            data_root: None,
            sweep_tenants: Vec::new(),
            log_filter: Self::default_log_filter_value(),
        }
    }
}

impl Config {
    pub fn default_currency_value() -> String {
        "USD".into()
    }

    pub fn default_payment_terms_value() -> String {
        "monthly".into()
    }

    pub fn default_due_days_value() -> u32 {
        30
    }

    pub fn default_financing_warning_months_value() -> u32 {
        12
    }

    pub fn default_log_filter_value() -> String {
        "revrec=info".into()
    }

    pub fn resolve_data_root(&self, base: &Path) -> PathBuf {
        match &self.data_root {
            Some(path) => path.clone(),
            None => base.join("data"),
        }
    }

    /// `~/.revrec`, or the working directory when no home directory is known.
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".revrec")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let currency = self.default_currency.trim();
        if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(ConfigError::Invalid(format!(
                "default_currency `{}` is not an ISO 4217 code",
                self.default_currency
            )));
        }
        if self.financing_warning_months == 0 {
            return Err(ConfigError::Invalid(
                "financing_warning_months must be positive".into(),
            ));
        }
        Ok(())
    }
}
