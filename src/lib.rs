#![doc(test(attr(deny(warnings))))]

//! Revrec ties the recognition engine, the JSON document store, and the persisted
//! configuration together behind the `revrec_cli` binary.

pub mod bundle;
pub mod cli;
pub mod errors;
pub mod utils;

use std::sync::Once;

use revrec_config::Config;
use revrec_core::{EngineOptions, PaymentTerms};

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing with the default `revrec=info` filter.
pub fn init() {
    init_with_filter(&Config::default_log_filter_value());
}

/// Initializes global tracing once per process; later calls are ignored.
pub fn init_with_filter(filter: &str) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(filter);
        tracing::debug!("revrec tracing initialized");
    });
}

/// Engine knobs derived from the persisted configuration.
pub fn engine_options(config: &Config) -> EngineOptions {
    let fallback = PaymentTerms {
        due_days: config.default_due_days,
        ..PaymentTerms::default()
    };
    EngineOptions {
        default_terms: PaymentTerms::parse(&config.default_payment_terms, fallback),
        financing_warning_months: config.financing_warning_months,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revrec_domain::BillingFrequency;

    #[test]
    fn init_does_not_panic() {
        super::init();
        super::init();
    }

    #[test]
    fn engine_options_follow_config() {
        let config = Config {
            default_payment_terms: "quarterly".into(),
            default_due_days: 45,
            financing_warning_months: 24,
            ..Config::default()
        };
        let options = engine_options(&config);
        assert_eq!(options.default_terms.frequency, BillingFrequency::Quarterly);
        assert_eq!(options.default_terms.due_days, 45);
        assert_eq!(options.financing_warning_months, 24);

        assert_eq!(engine_options(&Config::default()), EngineOptions::default());
    }
}
