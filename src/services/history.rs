//! Order history for the profile screen.

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use crate::domain::aggregates::Order;
use crate::domain::value_objects::TrackingId;
use crate::ports::document_store::{children, paths};
use crate::ports::{DocumentStore, IdentityProvider};
use crate::services::profile::{ProfileService, UserProfile};
use crate::{Result, StorefrontError};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderSummary {
    pub order_id: String,
    pub timestamp: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub tracking_id: Option<TrackingId>,
    pub status: String,
    pub item_count: usize,
}

impl OrderSummary {
    fn of(key: String, order: &Order) -> Self {
        let status = if order.order_status.trim().is_empty() { "confirmed".to_string() } else { order.order_status.clone() };
        Self {
            order_id: if order.order_id.is_empty() { key } else { order.order_id.clone() },
            timestamp: order.timestamp,
            total_amount: order.total_amount,
            tracking_id: order.tracking_id.clone(),
            status,
            item_count: order.items.len() + order.ordered_items.len(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OrderHistoryView {
    pub profile: UserProfile,
    pub cart_orders: Vec<OrderSummary>,
    pub product_orders: Vec<OrderSummary>,
}

pub struct OrderHistory {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    profiles: ProfileService,
}

impl OrderHistory {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        let profiles = ProfileService::new(store.clone());
        Self { store, identity, profiles }
    }

    /// Orders of the signed-in user, newest first, split by how they were placed.
    /// Records that do not decode are skipped.
    pub async fn load(&self) -> Result<OrderHistoryView> {
        let user = self.identity.current_user().ok_or(StorefrontError::NotSignedIn)?;
        let profile = self.profiles.load(&user.uid).await?;
        let path = paths::orders(&user.uid);
        let snapshot = self.store.get(&path).await?;

        let mut view = OrderHistoryView { profile, ..Default::default() };
        for (key, value) in children(snapshot.as_ref()) {
            let order: Order = match serde_json::from_value(value.clone()) {
                Ok(order) => order,
                Err(error) => {
                    tracing::debug!(%path, %key, %error, "Skipping unreadable order");
                    continue;
                }
            };
            let summary = OrderSummary::of(key, &order);
            if order.is_cart_order() { view.cart_orders.push(summary) } else { view.product_orders.push(summary) }
        }
        view.cart_orders.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        view.product_orders.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        tracing::debug!(uid = %user.uid, cart = view.cart_orders.len(), products = view.product_orders.len(), "Order history loaded");
        Ok(view)
    }
}
