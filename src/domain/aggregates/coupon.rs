//! Coupon Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{parse_price, PriceError};

/// Percentage discount code from the `coupons` path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Coupon {
    pub id: String,
    pub code: String,
    /// Percentage as text, e.g. `"10"` or `"12.5"`.
    pub discount: String,
    pub active: bool,
}

impl Coupon {
    pub fn discount_percent(&self) -> Result<Decimal, PriceError> {
        let percent = parse_price(&self.discount)?;
        if percent > Decimal::ONE_HUNDRED { return Err(PriceError::OutOfRange); }
        Ok(percent)
    }

    /// `amount * (1 - percent / 100)`, unrounded.
    pub fn apply_to(&self, amount: Decimal) -> Result<Decimal, PriceError> {
        let percent = self.discount_percent()?;
        Ok(amount * (Decimal::ONE - percent / Decimal::ONE_HUNDRED))
    }
}
