//! Shared traits and monetary helpers for revenue primitives.

use rust_decimal::{Decimal, RoundingStrategy};

/// Fixed functional-currency exchange rate. Translation is a passthrough.
pub const DEFAULT_EXCHANGE_RATE: Decimal = Decimal::ONE;

/// Default ISO 4217 currency for documents that omit one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Exposes the document key an entity is stored under.
pub trait Identifiable {
    fn id(&self) -> &str;
}

/// Rounds an amount to cents, half away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Splits `total` into `count` cent amounts. Every part but the last is `total / count`
/// truncated toward zero, and the last takes the remainder, so the parts sum to `total` and
/// none has the opposite sign.
pub fn split_evenly(total: Decimal, count: usize) -> Vec<Decimal> {
    if count == 0 {
        return Vec::new();
    }
    let per_part = (total / Decimal::from(count)).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let mut parts = vec![per_part; count];
    parts[count - 1] = total - per_part * Decimal::from(count - 1);
    parts
}

/// Clamps negative values to zero.
pub fn positive_part(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}

pub(crate) fn default_currency() -> String {
    DEFAULT_CURRENCY.into()
}

pub(crate) fn default_exchange_rate() -> Decimal {
    DEFAULT_EXCHANGE_RATE
}

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_quantity() -> Decimal {
    Decimal::ONE
}
