//! Client-side state mirrored from the document store.
pub mod banners;
pub mod cart;
pub mod catalog;
pub mod coupons;
mod live;

pub use banners::BannerFeed;
pub use cart::{CartStore, CartSync};
pub use catalog::ProductCatalog;
pub use coupons::CouponCatalog;
pub use live::LiveList;
