//! Storefront Core
//!
//! Headless order pipeline for a small shop backed by a realtime document store.
//!
//! ## Features
//! - Live product catalog and promotional banners
//! - Per-user cart synced to the remote store
//! - Buy-now and cart checkout with coupons
//! - Payment hand-off and order recording
//! - Order tracking and history

pub mod api;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;
pub mod storefront;
pub mod stores;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;
use crate::domain::aggregates::{CheckoutError, OrderError};
use crate::domain::value_objects::PriceError;
use crate::ports::{NotifyError, StoreError};

pub use crate::config::AppConfig;
pub use crate::storefront::{Storefront, StorefrontOptions};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Product {0} not found")]
    ProductNotFound(String),

    #[error("Order not found")]
    OrderNotFound,

    #[error("Cart item {0} not found")]
    CartItemNotFound(String),

    #[error("Coupon {0} not found")]
    CouponNotFound(String),

    #[error("User not authenticated")]
    NotSignedIn,

    #[error("No checkout in progress")]
    NoCheckout,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Invalid amount: {0}")]
    Amount(#[from] PriceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Notification(#[from] NotifyError),

    #[error("Payment continuation unreadable: {0}")]
    Continuation(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
