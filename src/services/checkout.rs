//! Checkout Service
//!
//! Entry into a checkout session, best-effort prefill from the last order,
//! address persistence and coupon lookup.

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::domain::aggregates::{CheckoutError, CheckoutSession, Coupon, Order, ShippingDetails};
use crate::ports::document_store::{decode_children, paths};
use crate::ports::{DocumentStore, IdentityProvider, StoreError};
use crate::services::profile::ProfileService;
use crate::stores::{CartStore, CouponCatalog, ProductCatalog};
use crate::{Result, StorefrontError};

pub struct CheckoutService {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    catalog: Arc<ProductCatalog>,
    cart: Arc<CartStore>,
    coupons: CouponCatalog,
    profiles: ProfileService,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        catalog: Arc<ProductCatalog>,
        cart: Arc<CartStore>,
    ) -> Self {
        let coupons = CouponCatalog::new(store.clone());
        let profiles = ProfileService::new(store.clone());
        Self { store, identity, catalog, cart, coupons, profiles }
    }

    pub fn begin_buy_now(&self, product_id: &str) -> Result<CheckoutSession> {
        let product = self.catalog.by_id(product_id).ok_or_else(|| StorefrontError::ProductNotFound(product_id.to_string()))?;
        let session = CheckoutSession::buy_now(product)?;
        info!(%product_id, amount = %session.original_amount(), "Buy-now checkout started");
        Ok(session)
    }

    /// Copies the current cart into a new session.
    pub fn begin_cart_checkout(&self) -> Result<CheckoutSession> {
        if self.identity.current_user().is_none() { return Err(StorefrontError::NotSignedIn); }
        let session = CheckoutSession::from_cart(&self.cart.snapshot())?;
        info!(amount = %session.original_amount(), "Cart checkout started");
        Ok(session)
    }

    /// Shipping details of the newest order on file. Read failures count as none.
    pub async fn last_shipping_address(&self) -> Option<ShippingDetails> {
        let user = self.identity.current_user()?;
        let path = paths::orders(&user.uid);
        let snapshot = match self.store.get(&path).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%path, %error, "Could not read previous orders for prefill");
                return None;
            }
        };
        decode_children::<Order>(snapshot.as_ref(), &path).into_iter().max_by_key(|o| o.timestamp).map(|o| o.shipping)
    }

    /// Fills the shipping form from the newest order unless the user already typed
    /// into it. Returns whether the form changed.
    pub async fn prefill_from_last_order(&self, session: &mut CheckoutSession) -> bool {
        match self.last_shipping_address().await {
            Some(last) => session.prefill_shipping(last),
            None => false,
        }
    }

    /// Validates the form, stores a changed address on the profile in the
    /// background, and resets any coupon for the payment step.
    pub fn proceed_to_payment(&self, session: &mut CheckoutSession) -> Result<Option<JoinHandle<()>>> {
        session.ensure_ready()?;
        let user = self.identity.current_user().ok_or(StorefrontError::NotSignedIn)?;
        let saving = if session.address_changed() {
            Some(self.profiles.save_address(&user.uid, session.shipping()))
        } else {
            debug!(uid = %user.uid, "Shipping address unchanged");
            None
        };
        session.enter_payment_step()?;
        Ok(saving)
    }

    pub async fn available_coupons(&self) -> std::result::Result<Vec<Coupon>, StoreError> { self.coupons.active_coupons().await }

    pub async fn find_coupon(&self, coupon_id: &str) -> Result<Coupon> {
        self.coupons.find_active(coupon_id).await?.ok_or_else(|| StorefrontError::CouponNotFound(coupon_id.to_string()))
    }

    pub async fn apply_coupon(&self, session: &mut CheckoutSession, coupon_id: &str) -> Result<Decimal> {
        if !session.is_at_payment_step() { return Err(CheckoutError::NotAtPaymentStep.into()); }
        let coupon = self.find_coupon(coupon_id).await?;
        let total = session.apply_coupon(&coupon)?;
        info!(code = %coupon.code, %total, "Coupon applied");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::ShippingField;
    use crate::ports::{InMemoryDocumentStore, SessionIdentity, UserIdentity};
    use crate::testing::shipping;
    use serde_json::json;

    struct Fixture {
        store: Arc<InMemoryDocumentStore>,
        cart: Arc<CartStore>,
        service: CheckoutService,
    }

    async fn fixture(root: serde_json::Value) -> Fixture {
        let store = Arc::new(InMemoryDocumentStore::with_root(root));
        let identity = Arc::new(SessionIdentity::signed_in(UserIdentity { uid: "u1".into(), email: "asha@example.com".into() }));
        let catalog = Arc::new(ProductCatalog::new(store.as_ref()));
        let cart = Arc::new(CartStore::new(store.clone(), identity.clone()));
        cart.wait_until_loaded().await;
        let service = CheckoutService::new(store.clone(), identity, catalog, cart.clone());
        Fixture { store, cart, service }
    }

    fn catalog_root() -> serde_json::Value {
        json!({
            "products": {
                "a": {"productId": "p1", "name": "Rex", "price": "500"},
                "b": {"productId": "p2", "name": "Broken", "price": "soon"}
            },
            "coupons": { "c1": {"id": "c1", "code": "DINO10", "discount": "10", "active": true} }
        })
    }

    #[tokio::test]
    async fn test_buy_now_entry() {
        let f = fixture(catalog_root()).await;
        assert_eq!(f.service.begin_buy_now("p1").unwrap().original_amount(), Decimal::new(500, 0));
        assert!(matches!(f.service.begin_buy_now("nope"), Err(StorefrontError::ProductNotFound(_))));
        assert!(matches!(f.service.begin_buy_now("p2"), Err(StorefrontError::Checkout(CheckoutError::InvalidPrice { .. }))));
    }

    #[tokio::test]
    async fn test_cart_checkout_copies_by_value() {
        let f = fixture(catalog_root()).await;
        assert!(matches!(f.service.begin_cart_checkout(), Err(StorefrontError::Checkout(CheckoutError::NothingToCheckout))));

        let rex = f.service.catalog.by_id("p1").unwrap();
        f.cart.add_item(&rex);
        f.cart.add_item(&rex);
        let session = f.service.begin_cart_checkout().unwrap();
        f.cart.add_item(&rex);
        assert_eq!(session.original_amount(), Decimal::new(1000, 0));
    }

    #[tokio::test]
    async fn test_prefill_uses_newest_order_and_respects_edits() {
        let mut root = catalog_root();
        root["orders"] = json!({ "u1": {
            "o1": {"orderId": "o1", "name": "Old", "city": "Delhi", "timestamp": 1},
            "o2": {"orderId": "o2", "name": "Asha", "city": "Pune", "timestamp": 2}
        }});
        let f = fixture(root).await;

        let mut session = f.service.begin_buy_now("p1").unwrap();
        assert!(f.service.prefill_from_last_order(&mut session).await);
        assert_eq!(session.shipping().city, "Pune");

        let mut edited = f.service.begin_buy_now("p1").unwrap();
        edited.set_field(ShippingField::Name, "Ravi");
        assert!(!f.service.prefill_from_last_order(&mut edited).await);
        assert_eq!(edited.shipping().name, "Ravi");
        assert_eq!(edited.shipping().city, "");
    }

    #[tokio::test]
    async fn test_proceed_blocks_invalid_form() {
        let f = fixture(catalog_root()).await;
        let mut session = f.service.begin_buy_now("p1").unwrap();
        assert!(matches!(f.service.proceed_to_payment(&mut session), Err(StorefrontError::Checkout(CheckoutError::IncompleteShipping(_)))));
        assert_eq!(f.store.get("users/u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_proceed_saves_changed_address_and_resets_coupon() {
        let f = fixture(catalog_root()).await;
        let mut session = f.service.begin_buy_now("p1").unwrap();
        session.set_shipping(shipping());
        assert!(matches!(f.service.apply_coupon(&mut session, "c1").await, Err(StorefrontError::Checkout(CheckoutError::NotAtPaymentStep))));

        let saving = f.service.proceed_to_payment(&mut session).unwrap();
        saving.unwrap().await.unwrap();
        assert_eq!(f.store.get("users/u1/address/city").await.unwrap(), Some(json!("Pune")));
        assert_eq!(f.service.apply_coupon(&mut session, "c1").await.unwrap(), Decimal::new(450, 0));

        f.service.proceed_to_payment(&mut session).unwrap();
        assert_eq!(session.total_amount(), Decimal::new(500, 0));
        assert!(session.selected_coupon().is_none());
    }

    #[tokio::test]
    async fn test_unchanged_address_is_not_saved_again() {
        let mut root = catalog_root();
        root["orders"] = json!({ "u1": { "o1": serde_json::to_value(shipping()).unwrap() } });
        let f = fixture(root).await;
        let mut session = f.service.begin_buy_now("p1").unwrap();
        f.service.prefill_from_last_order(&mut session).await;
        assert!(f.service.proceed_to_payment(&mut session).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_coupon() {
        let f = fixture(catalog_root()).await;
        let mut session = f.service.begin_buy_now("p1").unwrap();
        session.set_shipping(shipping());
        f.service.proceed_to_payment(&mut session).unwrap();
        assert!(matches!(f.service.apply_coupon(&mut session, "zzz").await, Err(StorefrontError::CouponNotFound(_))));
        assert_eq!(f.service.available_coupons().await.unwrap().len(), 1);
    }
}
