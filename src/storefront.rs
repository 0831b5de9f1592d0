//! Storefront
//!
//! Wires the stores and services together for one client session and holds the
//! checkout in progress.

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use crate::domain::aggregates::{CartItem, CheckoutSession, Coupon, Order, Product, ShippingDetails};
use crate::ports::{DocumentStore, IdentityProvider, Notification, NotificationSink, PaymentGateway, SessionIdentity, UserIdentity};
use crate::services::{CheckoutService, OrderHistory, OrderHistoryView, OrderSubmission, OrderTracking, SubmissionOptions, SubmissionOutcome, TrackingState};
use crate::stores::{BannerFeed, CartStore, CartSync, ProductCatalog};
use crate::utils::RetryConfig;
use crate::{Result, StorefrontError};

#[derive(Clone, Debug)]
pub struct StorefrontOptions {
    pub currency: String,
    pub merchant_name: String,
    pub order_write_retry: RetryConfig,
}

impl Default for StorefrontOptions {
    fn default() -> Self {
        let submission = SubmissionOptions::default();
        Self { currency: submission.currency, merchant_name: submission.merchant_name, order_write_retry: submission.retry }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

/// Waits for a cart write to land so the response matches the stored cart. A
/// failed write is already logged by the writer; the local change stands.
async fn synced(sync: Option<CartSync>) {
    if let Some(sync) = sync {
        let _ = sync.wait().await;
    }
}

pub struct Storefront {
    identity: Arc<SessionIdentity>,
    catalog: Arc<ProductCatalog>,
    banners: BannerFeed,
    cart: Arc<CartStore>,
    checkout: CheckoutService,
    submission: OrderSubmission,
    tracking: OrderTracking,
    history: OrderHistory,
    notifier: Arc<dyn NotificationSink>,
    session: Mutex<Option<CheckoutSession>>,
}

impl Storefront {
    /// Subscribes to the catalog, banners and cart. Must run inside a tokio runtime.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationSink>,
        options: StorefrontOptions,
    ) -> Self {
        let identity = Arc::new(SessionIdentity::new());
        let provider: Arc<dyn IdentityProvider> = identity.clone();
        let catalog = Arc::new(ProductCatalog::new(store.as_ref()));
        let banners = BannerFeed::new(store.as_ref(), notifier.clone());
        let cart = Arc::new(CartStore::new(store.clone(), provider.clone()));
        let checkout = CheckoutService::new(store.clone(), provider.clone(), catalog.clone(), cart.clone());
        let submission_options = SubmissionOptions { currency: options.currency, merchant_name: options.merchant_name, retry: options.order_write_retry };
        let submission = OrderSubmission::new(store.clone(), provider.clone(), gateway, notifier.clone(), submission_options);
        let tracking = OrderTracking::new(store.clone(), provider.clone());
        let history = OrderHistory::new(store, provider);
        Self { identity, catalog, banners, cart, checkout, submission, tracking, history, notifier, session: Mutex::new(None) }
    }

    // --- session ---

    pub fn current_user(&self) -> Option<UserIdentity> { self.identity.current_user() }

    pub async fn sign_in(&self, user: UserIdentity) {
        self.identity.sign_in(user);
        self.cart.wait_until_loaded().await;
    }

    /// Also abandons any checkout in progress.
    pub async fn sign_out(&self) {
        self.identity.sign_out();
        *self.session.lock().await = None;
        self.cart.wait_until_loaded().await;
    }

    // --- catalog ---

    pub fn products(&self, category: Option<&str>) -> Vec<Product> {
        match category {
            Some(category) => self.catalog.by_category(category),
            None => self.catalog.snapshot().to_vec(),
        }
    }

    pub fn product(&self, product_id: &str) -> Result<Product> {
        self.catalog.by_id(product_id).ok_or_else(|| StorefrontError::ProductNotFound(product_id.to_string()))
    }

    pub fn banners(&self) -> Vec<String> { self.banners.links().to_vec() }

    // --- cart ---

    pub fn cart(&self) -> CartView {
        let items = self.cart.snapshot();
        CartView { total: items.iter().map(CartItem::line_total).sum(), items: items.to_vec() }
    }

    pub async fn add_to_cart(&self, product_id: &str) -> Result<CartView> {
        self.require_user()?;
        let product = self.product(product_id)?;
        self.cart.wait_until_loaded().await;
        synced(self.cart.add_item(&product)).await;
        Ok(self.cart())
    }

    pub async fn increase_item(&self, key: &str) -> Result<CartView> {
        let item = self.cart_item(key).await?;
        synced(self.cart.increase(&item)).await;
        Ok(self.cart())
    }

    pub async fn decrease_item(&self, key: &str) -> Result<CartView> {
        let item = self.cart_item(key).await?;
        synced(self.cart.decrease(&item)).await;
        Ok(self.cart())
    }

    pub async fn remove_item(&self, key: &str) -> Result<CartView> {
        let item = self.cart_item(key).await?;
        synced(self.cart.remove_item(&item)).await;
        Ok(self.cart())
    }

    async fn cart_item(&self, key: &str) -> Result<CartItem> {
        self.require_user()?;
        self.cart.wait_until_loaded().await;
        self.cart.find(key).ok_or_else(|| StorefrontError::CartItemNotFound(key.to_string()))
    }

    fn require_user(&self) -> Result<UserIdentity> { self.identity.current_user().ok_or(StorefrontError::NotSignedIn) }

    // --- checkout ---

    pub async fn begin_buy_now(&self, product_id: &str) -> Result<CheckoutSession> {
        self.require_user()?;
        let session = self.checkout.begin_buy_now(product_id)?;
        self.start(session).await
    }

    pub async fn begin_cart_checkout(&self) -> Result<CheckoutSession> {
        self.cart.wait_until_loaded().await;
        let session = self.checkout.begin_cart_checkout()?;
        self.start(session).await
    }

    async fn start(&self, mut session: CheckoutSession) -> Result<CheckoutSession> {
        let mut current = self.session.lock().await;
        self.checkout.prefill_from_last_order(&mut session).await;
        *current = Some(session.clone());
        Ok(session)
    }

    pub async fn checkout(&self) -> Result<CheckoutSession> {
        self.session.lock().await.clone().ok_or(StorefrontError::NoCheckout)
    }

    pub async fn update_shipping(&self, details: ShippingDetails) -> Result<CheckoutSession> {
        let mut current = self.session.lock().await;
        let session = current.as_mut().ok_or(StorefrontError::NoCheckout)?;
        session.set_shipping(details);
        Ok(session.clone())
    }

    /// Leaves the shipping step. The address save runs in the background.
    pub async fn proceed_to_payment(&self) -> Result<CheckoutSession> {
        let mut current = self.session.lock().await;
        let session = current.as_mut().ok_or(StorefrontError::NoCheckout)?;
        self.checkout.proceed_to_payment(session)?;
        Ok(session.clone())
    }

    pub async fn coupons(&self) -> Result<Vec<Coupon>> { Ok(self.checkout.available_coupons().await?) }

    pub async fn apply_coupon(&self, coupon_id: &str) -> Result<CheckoutSession> {
        let mut current = self.session.lock().await;
        let session = current.as_mut().ok_or(StorefrontError::NoCheckout)?;
        self.checkout.apply_coupon(session, coupon_id).await?;
        Ok(session.clone())
    }

    pub async fn clear_coupon(&self) -> Result<CheckoutSession> {
        let mut current = self.session.lock().await;
        let session = current.as_mut().ok_or(StorefrontError::NoCheckout)?;
        session.clear_coupon()?;
        Ok(session.clone())
    }

    /// Pays for the current checkout, which must be on the payment step. The
    /// session ends once the payment clears; after a failed payment it stays as it was.
    pub async fn pay(&self) -> Result<SubmissionOutcome> {
        let mut current = self.session.lock().await;
        let session = current.as_ref().ok_or(StorefrontError::NoCheckout)?;
        let outcome = self.submission.submit(session).await?;
        if !matches!(outcome, SubmissionOutcome::PaymentFailed { .. }) {
            info!("Checkout finished");
            *current = None;
        }
        Ok(outcome)
    }

    // --- orders ---

    pub async fn orders(&self) -> Result<OrderHistoryView> { self.history.load().await }

    pub async fn track(&self, order_id: &str) -> TrackingState { self.tracking.fetch(order_id).await }

    pub async fn retry_pending_orders(&self) -> Vec<Order> { self.submission.retry_pending().await }

    // --- notifications ---

    /// Routes an incoming push message to its channel and forwards it to the sink.
    pub async fn relay_push(&self, title: Option<&str>, body: Option<&str>) -> Result<Notification> {
        let notification = Notification::from_push(title, body);
        self.notifier.notify(&notification).await?;
        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::CheckoutError;
    use crate::ports::{InMemoryDocumentStore, NotificationChannel, PaymentFailure};
    use crate::testing::{shipping, RecordingNotifier, ScriptedGateway};
    use serde_json::json;

    fn user() -> UserIdentity { UserIdentity { uid: "u1".into(), email: "asha@example.com".into() } }

    fn storefront(gateway: Arc<ScriptedGateway>) -> (Storefront, Arc<InMemoryDocumentStore>) {
        let store = Arc::new(InMemoryDocumentStore::with_root(json!({
            "products": {
                "a": {"productId": "p1", "category": "Toys", "name": "Rex", "price": "100"},
                "b": {"productId": "p2", "category": "Books", "name": "Dino Book", "price": "50"}
            }
        })));
        let options = StorefrontOptions { order_write_retry: RetryConfig::immediate(1), ..Default::default() };
        let storefront = Storefront::new(store.clone(), gateway, Arc::new(RecordingNotifier::default()), options);
        (storefront, store)
    }

    #[tokio::test]
    async fn test_cart_checkout_end_to_end() {
        let (shop, store) = storefront(Arc::new(ScriptedGateway::default()));
        shop.sign_in(user()).await;
        shop.add_to_cart("p1").await.unwrap();
        shop.add_to_cart("p1").await.unwrap();
        assert_eq!(shop.add_to_cart("p2").await.unwrap().total, Decimal::new(250, 0));

        shop.begin_cart_checkout().await.unwrap();
        shop.update_shipping(shipping()).await.unwrap();
        assert_eq!(shop.proceed_to_payment().await.unwrap().total_amount(), Decimal::new(250, 0));

        let SubmissionOutcome::Confirmed(order) = shop.pay().await.unwrap() else { panic!("expected confirmation") };
        assert!(matches!(shop.checkout().await, Err(StorefrontError::NoCheckout)));
        let mut cart = shop.cart.subscribe();
        cart.wait_for(|items| items.is_empty()).await.unwrap();
        assert!(store.get("carts/u1").await.unwrap().is_none());

        let TrackingState::Found(tracked) = shop.track(&order.order_id).await else { panic!("expected tracked order") };
        assert_eq!(tracked.tracking_id, order.tracking_id);
        assert_eq!(shop.orders().await.unwrap().cart_orders.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_payment_keeps_session() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.fail_next(PaymentFailure::DECLINED, "Card declined");
        let (shop, _store) = storefront(gateway);
        shop.sign_in(user()).await;
        shop.begin_buy_now("p1").await.unwrap();
        shop.update_shipping(shipping()).await.unwrap();
        shop.proceed_to_payment().await.unwrap();

        let outcome = shop.pay().await.unwrap();
        assert_eq!(outcome, SubmissionOutcome::PaymentFailed { code: 2, message: "Card declined".into() });
        assert_eq!(shop.checkout().await.unwrap().shipping(), &shipping());
        assert!(matches!(shop.pay().await.unwrap(), SubmissionOutcome::Confirmed(_)));
    }

    #[tokio::test]
    async fn test_payment_step_gates_coupons_and_pay() {
        let gateway = Arc::new(ScriptedGateway::default());
        let (shop, store) = storefront(gateway.clone());
        store.set("coupons", json!({ "c1": {"id": "c1", "code": "DINO10", "discount": "10", "active": true} })).await.unwrap();
        shop.sign_in(user()).await;
        shop.begin_buy_now("p1").await.unwrap();
        shop.update_shipping(shipping()).await.unwrap();

        let early = shop.apply_coupon("c1").await;
        assert!(matches!(early, Err(StorefrontError::Checkout(CheckoutError::NotAtPaymentStep))));
        assert!(matches!(shop.pay().await, Err(StorefrontError::Checkout(CheckoutError::NotAtPaymentStep))));
        assert!(gateway.requests().is_empty());

        shop.proceed_to_payment().await.unwrap();
        assert_eq!(shop.apply_coupon("c1").await.unwrap().total_amount(), Decimal::new(90, 0));

        let mut moved = shipping();
        moved.city = "Mumbai".into();
        let back = shop.update_shipping(moved).await.unwrap();
        assert!(back.selected_coupon().is_none());
        assert!(matches!(shop.pay().await, Err(StorefrontError::Checkout(CheckoutError::NotAtPaymentStep))));

        shop.proceed_to_payment().await.unwrap();
        shop.apply_coupon("c1").await.unwrap();
        assert!(matches!(shop.pay().await.unwrap(), SubmissionOutcome::Confirmed(_)));
        assert_eq!(gateway.requests()[0].amount_minor, 9000);
        let mut profile = store.subscribe("users/u1/address/city");
        profile.wait_for(|city| city.as_ref() == Some(&json!("Mumbai"))).await.unwrap();
    }

    #[tokio::test]
    async fn test_push_relay() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(InMemoryDocumentStore::new());
        let shop = Storefront::new(store, Arc::new(ScriptedGateway::default()), notifier.clone(), StorefrontOptions::default());
        let sent = shop.relay_push(Some("New deal on dinos"), None).await.unwrap();
        assert_eq!(sent.channel, NotificationChannel::PromotionalBanners);
        assert_eq!(sent.body, "You have a new notification!");
        assert_eq!(notifier.sent(), vec![sent]);
    }

    #[tokio::test]
    async fn test_signed_out_access() {
        let (shop, _store) = storefront(Arc::new(ScriptedGateway::default()));
        assert_eq!(shop.products(Some("toys")).len(), 1);
        assert!(matches!(shop.add_to_cart("p1").await, Err(StorefrontError::NotSignedIn)));
        assert!(matches!(shop.begin_buy_now("p1").await, Err(StorefrontError::NotSignedIn)));

        shop.sign_in(user()).await;
        shop.begin_buy_now("p1").await.unwrap();
        shop.sign_out().await;
        assert!(matches!(shop.checkout().await, Err(StorefrontError::NoCheckout)));
    }
}
