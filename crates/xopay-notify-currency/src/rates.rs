//! Normalized exchange-rate entries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange rates are kept to six significant digits.
const RATE_PRECISION: u8 = 6;

/// One normalized exchange rate: multiply an amount in `from_currency` by
/// `rate` to get `to_currency`.
///
/// The rate serializes as a string so downstream consumers are not exposed
/// to binary floating point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateEntry {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: Decimal,
}

impl RateEntry {
    /// Build an entry, rounding the rate to the shared precision.
    pub fn new(
        from_currency: impl Into<String>,
        to_currency: impl Into<String>,
        rate: Decimal,
    ) -> Self {
        Self {
            from_currency: from_currency.into(),
            to_currency: to_currency.into(),
            rate: round_rate(rate),
        }
    }

    /// The reverse direction, computed as `1/rate` from the sell side.
    pub fn inverse_of(
        from_currency: impl Into<String>,
        to_currency: impl Into<String>,
        sell: Decimal,
    ) -> Self {
        Self::new(from_currency, to_currency, Decimal::ONE / sell)
    }
}

/// Round to six significant digits.
pub fn round_rate(rate: Decimal) -> Decimal {
    rate.round_sf(u32::from(RATE_PRECISION)).unwrap_or(rate)
}
