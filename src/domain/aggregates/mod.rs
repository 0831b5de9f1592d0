//! Aggregates module
pub mod product;
pub mod cart;
pub mod coupon;
pub mod checkout;
pub mod order;

pub use product::{Banner, Product};
pub use cart::{Cart, CartItem};
pub use coupon::Coupon;
pub use checkout::{CheckoutError, CheckoutSession, CheckoutSource, ShippingDetails, ShippingField};
pub use order::{CouponSnapshot, Order, OrderDraft, OrderError, OrderStage, OrderStages, OrderedProduct};
