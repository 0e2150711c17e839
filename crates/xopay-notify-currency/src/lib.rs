//! # xopay-notify-currency
//!
//! Periodic currency-exchange refresh:
//!
//! - [`rates`] - the normalized `{from, to, rate}` entry with 6-digit
//!   decimal precision
//! - [`sources`] - the pluggable [`sources::RateSource`] interface and the
//!   bundled bank API sources
//! - [`scheduler`] - the timezone-aware daemon that fetches, pushes to the
//!   admin service and reports the outcome

pub mod error;
pub mod rates;
pub mod scheduler;
pub mod sources;

pub use error::RateError;
pub use rates::RateEntry;
pub use scheduler::{CurrencyScheduler, CurrencySettings};
pub use sources::{NbuSource, PrivatBankSource, RateSource};
