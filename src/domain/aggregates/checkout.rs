//! Checkout Session
//!
//! Transient state for one checkout flow, entered either from "buy now" on a
//! single product or from the cart. The source is copied by value at entry, so
//! later cart edits never reach an in-flight checkout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};
use crate::domain::aggregates::{CartItem, Coupon, CouponSnapshot, OrderDraft, Product};
use crate::domain::value_objects::{round_money, PriceError};

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() { Err(ValidationError::new("blank")) } else { Ok(()) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ShippingDetails {
    #[validate(custom = "not_blank")]
    pub name: String,
    #[validate(custom = "not_blank")]
    pub phone: String,
    #[validate(custom = "not_blank")]
    pub address: String,
    #[validate(custom = "not_blank")]
    pub city: String,
    #[validate(custom = "not_blank")]
    pub state: String,
    #[validate(custom = "not_blank")]
    pub pincode: String,
}

impl ShippingDetails {
    /// Names of the fields that fail validation, sorted.
    pub fn missing_fields(&self) -> Vec<String> {
        match self.validate() {
            Ok(()) => vec![],
            Err(errors) => {
                let mut fields: Vec<String> = errors.field_errors().keys().map(|k| k.to_string()).collect();
                fields.sort();
                fields
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingField { Name, Phone, Address, City, State, Pincode }

/// What is being bought. The two sources never mix within one session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum CheckoutSource {
    BuyNow(Vec<Product>),
    Cart(Vec<CartItem>),
    #[default]
    Empty,
}

impl CheckoutSource {
    pub fn is_cart(&self) -> bool { matches!(self, Self::Cart(_)) }

    pub fn is_empty(&self) -> bool {
        match self { Self::BuyNow(p) => p.is_empty(), Self::Cart(c) => c.is_empty(), Self::Empty => true }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckoutSession {
    shipping: ShippingDetails,
    /// Address of the last order, as fetched for prefill.
    address_on_file: Option<ShippingDetails>,
    shipping_edited: bool,
    prefilled: bool,
    #[serde(with = "rust_decimal::serde::float")]
    original_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    total_amount: Decimal,
    selected_coupon: Option<Coupon>,
    source: CheckoutSource,
    /// Set once the shipping step has been left; editing shipping returns to it.
    at_payment_step: bool,
}

impl CheckoutSession {
    fn with_source(source: CheckoutSource, original_amount: Decimal) -> Self {
        let original_amount = round_money(original_amount);
        Self {
            shipping: ShippingDetails::default(), address_on_file: None, shipping_edited: false, prefilled: false,
            original_amount, total_amount: original_amount, selected_coupon: None, source, at_payment_step: false,
        }
    }

    /// Single-product checkout. A product whose price cannot be read is refused.
    pub fn buy_now(product: Product) -> Result<Self, CheckoutError> {
        let price = product.unit_price().map_err(|source| CheckoutError::InvalidPrice { product_id: product.product_id.clone(), source })?;
        Ok(Self::with_source(CheckoutSource::BuyNow(vec![product]), price))
    }

    pub fn from_cart(items: &[CartItem]) -> Result<Self, CheckoutError> {
        if items.is_empty() { return Err(CheckoutError::NothingToCheckout); }
        let total = items.iter().map(CartItem::line_total).sum();
        Ok(Self::with_source(CheckoutSource::Cart(items.to_vec()), total))
    }

    pub fn shipping(&self) -> &ShippingDetails { &self.shipping }
    pub fn original_amount(&self) -> Decimal { self.original_amount }
    pub fn total_amount(&self) -> Decimal { self.total_amount }
    pub fn selected_coupon(&self) -> Option<&Coupon> { self.selected_coupon.as_ref() }
    pub fn source(&self) -> &CheckoutSource { &self.source }
    pub fn is_cart_checkout(&self) -> bool { self.source.is_cart() }
    pub fn is_at_payment_step(&self) -> bool { self.at_payment_step }

    fn require_payment_step(&self) -> Result<(), CheckoutError> {
        if self.at_payment_step { Ok(()) } else { Err(CheckoutError::NotAtPaymentStep) }
    }

    /// Coupons are only chosen on the payment step.
    pub fn apply_coupon(&mut self, coupon: &Coupon) -> Result<Decimal, CheckoutError> {
        self.require_payment_step()?;
        if !coupon.active { return Err(CheckoutError::CouponInactive(coupon.code.clone())); }
        let discounted = coupon.apply_to(self.original_amount).map_err(|source| CheckoutError::InvalidCoupon { code: coupon.code.clone(), source })?;
        self.total_amount = round_money(discounted);
        self.selected_coupon = Some(coupon.clone());
        Ok(self.total_amount)
    }

    pub fn clear_coupon(&mut self) -> Result<(), CheckoutError> {
        self.require_payment_step()?;
        self.reset_coupon();
        Ok(())
    }

    fn reset_coupon(&mut self) {
        self.selected_coupon = None;
        self.total_amount = self.original_amount;
    }

    /// Entering the payment step always starts from the undiscounted amount.
    pub fn enter_payment_step(&mut self) -> Result<(), CheckoutError> {
        self.ensure_ready()?;
        self.reset_coupon();
        self.at_payment_step = true;
        Ok(())
    }

    fn back_to_shipping(&mut self) {
        self.shipping_edited = true;
        if self.at_payment_step {
            self.at_payment_step = false;
            self.reset_coupon();
        }
    }

    /// Records the address on file and copies it into the form unless the user has
    /// already typed into it. Returns whether the form was filled.
    pub fn prefill_shipping(&mut self, last: ShippingDetails) -> bool {
        self.address_on_file = Some(last.clone());
        if self.shipping_edited || self.prefilled { return false; }
        self.shipping = last;
        self.prefilled = true;
        true
    }

    pub fn set_field(&mut self, field: ShippingField, value: impl Into<String>) {
        let value = value.into();
        let slot = match field {
            ShippingField::Name => &mut self.shipping.name,
            ShippingField::Phone => &mut self.shipping.phone,
            ShippingField::Address => &mut self.shipping.address,
            ShippingField::City => &mut self.shipping.city,
            ShippingField::State => &mut self.shipping.state,
            ShippingField::Pincode => &mut self.shipping.pincode,
        };
        *slot = value;
        self.back_to_shipping();
    }

    pub fn set_shipping(&mut self, details: ShippingDetails) {
        self.shipping = details;
        self.back_to_shipping();
    }

    pub fn is_form_valid(&self) -> bool { self.shipping.validate().is_ok() }

    /// Field-by-field comparison against the last fetched address. With nothing on
    /// file, any address counts as new.
    pub fn address_changed(&self) -> bool {
        self.address_on_file.as_ref().map_or(true, |on_file| on_file != &self.shipping)
    }

    pub fn ensure_ready(&self) -> Result<(), CheckoutError> {
        if self.source.is_empty() { return Err(CheckoutError::NothingToCheckout); }
        let missing = self.shipping.missing_fields();
        if !missing.is_empty() { return Err(CheckoutError::IncompleteShipping(missing)); }
        Ok(())
    }

    /// Snapshot of this session for the payment continuation. Only a session on
    /// the payment step can be paid for.
    pub fn draft(&self, user_id: impl Into<String>, currency: impl Into<String>) -> Result<OrderDraft, CheckoutError> {
        self.require_payment_step()?;
        self.ensure_ready()?;
        Ok(OrderDraft {
            correlation_id: Uuid::new_v4(), user_id: user_id.into(), shipping: self.shipping.clone(),
            total_amount: self.total_amount, currency: currency.into(),
            coupon: self.selected_coupon.as_ref().map(CouponSnapshot::from), source: self.source.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckoutError {
    #[error("Product {product_id} has an unreadable price: {source}")]
    InvalidPrice { product_id: String, source: PriceError },
    #[error("Nothing to check out")]
    NothingToCheckout,
    #[error("Shipping details incomplete: {}", .0.join(", "))]
    IncompleteShipping(Vec<String>),
    #[error("Coupon {0} is not active")]
    CouponInactive(String),
    #[error("Coupon {code} has an invalid discount: {source}")]
    InvalidCoupon { code: String, source: PriceError },
    #[error("Checkout has not reached the payment step")]
    NotAtPaymentStep,
}
