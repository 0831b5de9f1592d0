//! Value Objects for the storefront

use chrono::Utc;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parses a price stored as text in the remote schema.
///
/// Accepts surrounding whitespace; rejects blanks, garbage and negative values.
pub fn parse_price(raw: &str) -> Result<Decimal, PriceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() { return Err(PriceError::Empty); }
    let value: Decimal = trimmed.parse().map_err(|_| PriceError::Malformed(trimmed.to_string()))?;
    if value.is_sign_negative() && !value.is_zero() { return Err(PriceError::Negative); }
    Ok(value)
}

/// Rounds an amount to currency precision (2 dp, midpoint away from zero).
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts a major-unit amount into minor units (paise, cents) for the payment gateway.
pub fn to_minor_units(amount: Decimal) -> Result<i64, PriceError> {
    let minor = (amount * Decimal::ONE_HUNDRED).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    minor.to_i64().ok_or(PriceError::OutOfRange)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceError { Empty, Malformed(String), Negative, OutOfRange }
impl std::error::Error for PriceError {}
impl fmt::Display for PriceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "price is empty"),
            Self::Malformed(raw) => write!(f, "price '{}' is not a number", raw),
            Self::Negative => write!(f, "price is negative"),
            Self::OutOfRange => write!(f, "amount out of range"),
        }
    }
}

/// Human-facing order reference: `TRK` + epoch millis + a 4-digit random suffix.
///
/// Two orders placed in the same millisecond collide with probability 1/9000.
/// That is accepted at this scale; the internal order id stays the unique key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingId(String);

impl TrackingId {
    pub const PREFIX: &'static str = "TRK";

    pub fn generate() -> Self { Self::generate_at(Utc::now().timestamp_millis(), &mut rand::thread_rng()) }

    pub fn generate_at<R: Rng + ?Sized>(epoch_millis: i64, rng: &mut R) -> Self {
        let suffix: u16 = rng.gen_range(1000..=9999);
        Self(format!("{}{}{}", Self::PREFIX, epoch_millis, suffix))
    }

    /// `TRK`, at least 13 timestamp digits, then the 4-digit suffix.
    pub fn is_well_formed(value: &str) -> bool {
        match value.strip_prefix(Self::PREFIX) {
            Some(digits) => digits.len() >= 17 && digits.bytes().all(|b| b.is_ascii_digit()),
            None => false,
        }
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}
