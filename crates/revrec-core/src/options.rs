use crate::billing_service::PaymentTerms;

/// Knobs the engine reads; built from the persisted configuration by callers.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Used when a contract carries no payment terms, and for fields the terms text omits.
    pub default_terms: PaymentTerms,
    /// Contracts longer than this many months get a financing-component warning.
    pub financing_warning_months: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_terms: PaymentTerms::default(),
            financing_warning_months: 12,
        }
    }
}
