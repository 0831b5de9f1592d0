//! Order Submission
//!
//! Hands a ready checkout to the payment gateway and records the order once the
//! payment clears. The draft travels through the gateway metadata, so completion
//! needs nothing but the confirmation and the current identity.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use crate::domain::aggregates::{CheckoutSession, Order, OrderDraft};
use crate::domain::value_objects::{to_minor_units, TrackingId};
use crate::ports::document_store::paths;
use crate::ports::{DocumentStore, IdentityProvider, Notification, NotificationSink, PaymentConfirmation, PaymentGateway, PaymentRequest, StoreError};
use crate::utils::{retry_with_backoff, RetryConfig};
use crate::{Result, StorefrontError};

pub const PAYMENT_DESCRIPTION: &str = "Payment for order";

#[derive(Clone, Debug)]
pub struct SubmissionOptions {
    pub currency: String,
    pub merchant_name: String,
    pub retry: RetryConfig,
}

impl Default for SubmissionOptions {
    fn default() -> Self {
        Self { currency: "INR".to_string(), merchant_name: "Baby Dino".to_string(), retry: RetryConfig::default() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Confirmed(Box<Order>),
    /// Nothing was recorded; the session can be paid again as is.
    PaymentFailed { code: i32, message: String },
    /// Paid, but the order could not be written yet. Kept for reconciliation.
    RecordPending { payment_ref: String, tracking_id: TrackingId },
}

/// A paid order waiting to be written.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PendingOrder {
    pub uid: String,
    pub order: Order,
}

impl PendingOrder {
    pub fn payment_ref(&self) -> &str { self.order.payment_id.as_deref().unwrap_or_default() }
}

pub struct OrderSubmission {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationSink>,
    options: SubmissionOptions,
    pending: Mutex<Vec<PendingOrder>>,
}

impl OrderSubmission {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationSink>,
        options: SubmissionOptions,
    ) -> Self {
        Self { store, identity, gateway, notifier, options, pending: Mutex::new(vec![]) }
    }

    /// Builds the gateway request for `session`, carrying the draft as metadata.
    pub fn payment_request(&self, session: &CheckoutSession) -> Result<PaymentRequest> {
        let user = self.identity.current_user().ok_or(StorefrontError::NotSignedIn)?;
        let draft = session.draft(&user.uid, &self.options.currency)?;
        Ok(PaymentRequest {
            amount_minor: to_minor_units(draft.total_amount)?,
            currency: draft.currency.clone(),
            merchant_name: self.options.merchant_name.clone(),
            description: PAYMENT_DESCRIPTION.to_string(),
            buyer_name: draft.shipping.name.clone(),
            buyer_email: user.email,
            buyer_phone: draft.shipping.phone.clone(),
            metadata: serde_json::to_value(&draft)?,
        })
    }

    #[instrument(skip_all, fields(amount = %session.total_amount()))]
    pub async fn submit(&self, session: &CheckoutSession) -> Result<SubmissionOutcome> {
        let request = self.payment_request(session)?;
        info!(amount_minor = request.amount_minor, currency = %request.currency, "Opening payment checkout");
        match self.gateway.open_checkout(request).await {
            Ok(confirmation) => self.complete(confirmation).await,
            Err(failure) => {
                warn!(code = failure.code, message = %failure.message, "Payment failed");
                Ok(SubmissionOutcome::PaymentFailed { code: failure.code, message: failure.message })
            }
        }
    }

    /// Records the order for a cleared payment.
    pub async fn complete(&self, confirmation: PaymentConfirmation) -> Result<SubmissionOutcome> {
        let payment_ref = confirmation.payment_ref;
        let draft: OrderDraft = serde_json::from_value(confirmation.metadata).map_err(|e| {
            error!(%payment_ref, error = %e, "Paid checkout has an unreadable continuation");
            e
        })?;
        match self.identity.current_user() {
            Some(user) if user.uid == draft.user_id => {}
            Some(user) => warn!(payer = %draft.user_id, current = %user.uid, "Identity changed during payment, recording under payer"),
            None => warn!(payer = %draft.user_id, "Signed out during payment, recording under payer"),
        }

        let uid = draft.user_id.clone();
        let order_id = match self.store.push(&paths::orders(&uid)).await {
            Ok(id) => id,
            Err(error) => {
                warn!(%error, "Could not reserve an order key, using a local one");
                Uuid::now_v7().to_string()
            }
        };
        let mut order = Order::place(&draft, order_id, &payment_ref, TrackingId::generate(), Utc::now().timestamp_millis())?;
        for event in order.take_events() { info!(correlation_id = %draft.correlation_id, ?event, "Order placed"); }

        match self.write(&uid, &order).await {
            Ok(()) => {
                self.after_recorded(&uid, &order).await;
                Ok(SubmissionOutcome::Confirmed(Box::new(order)))
            }
            Err(error) => {
                error!(%payment_ref, order_id = %order.order_id, %error, "Order write failed after payment, queued for reconciliation");
                let tracking_id = order.tracking_id.clone().unwrap_or_else(TrackingId::generate);
                self.pending.lock().push(PendingOrder { uid, order });
                Ok(SubmissionOutcome::RecordPending { payment_ref, tracking_id })
            }
        }
    }

    pub fn pending(&self) -> Vec<PendingOrder> { self.pending.lock().clone() }

    /// Writes every queued order once more. Returns the ones now recorded.
    pub async fn retry_pending(&self) -> Vec<Order> {
        let queued = std::mem::take(&mut *self.pending.lock());
        let mut recorded = vec![];
        for entry in queued {
            match self.write(&entry.uid, &entry.order).await {
                Ok(()) => {
                    info!(payment_ref = %entry.payment_ref(), order_id = %entry.order.order_id, "Pending order recorded");
                    self.after_recorded(&entry.uid, &entry.order).await;
                    recorded.push(entry.order);
                }
                Err(_) => { self.pending.lock().push(entry); }
            }
        }
        recorded
    }

    async fn write(&self, uid: &str, order: &Order) -> std::result::Result<(), StoreError> {
        let path = paths::order(uid, &order.order_id);
        let value = serde_json::to_value(order).map_err(|e| StoreError::Unavailable(format!("order encoding failed: {}", e)))?;
        retry_with_backoff(&self.options.retry, |_| self.store.set(&path, value.clone())).await
    }

    /// Clears the remote cart for cart orders and announces the order. Both are best-effort.
    async fn after_recorded(&self, uid: &str, order: &Order) {
        if order.is_cart_order() {
            if let Err(error) = self.store.remove(&paths::cart(uid)).await {
                warn!(%uid, %error, "Could not clear cart after order");
            }
        }
        if let Err(error) = self.notifier.notify(&Notification::order_confirmed()).await {
            warn!(%error, "Order confirmation notification failed");
        }
    }
}
