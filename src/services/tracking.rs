//! Order Tracking
//!
//! One-shot fetch of a single order of the signed-in user, exposed as an
//! observable state, plus the derived stage timeline and item lines.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use crate::domain::aggregates::{Order, OrderStage};
use crate::domain::value_objects::parse_price;
use crate::ports::document_store::paths;
use crate::ports::{DocumentStore, IdentityProvider};

pub const NOT_AUTHENTICATED: &str = "User not authenticated";
pub const INVALID_ORDER: &str = "Invalid order data";

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum TrackingState {
    #[default]
    Idle,
    Loading,
    Found(Box<Order>),
    NotFound,
    Error(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub stage: OrderStage,
    pub label: &'static str,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fixed five-stage timeline. `confirmed` counts as completed even without a stamp.
pub fn timeline(order: &Order) -> Vec<TimelineEntry> {
    OrderStage::ALL.into_iter().map(|stage| {
        let stamp = order.order_stages.get(stage);
        TimelineEntry {
            stage,
            label: stage.label(),
            completed: stage == OrderStage::Confirmed || stamp.is_some(),
            completed_at: stamp.and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        }
    }).collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderLine {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub unit_price: Option<Decimal>,
    pub quantity: u32,
    pub image_url: Option<String>,
}

/// Cart lines followed by buy-now lines. A well-formed order has only one kind,
/// but both are kept if a record carries both.
pub fn order_lines(order: &Order) -> Vec<OrderLine> {
    let cart = order.items.iter().map(|item| OrderLine {
        name: item.name.clone(),
        unit_price: Some(item.price),
        quantity: item.quantity,
        image_url: Some(item.image_url.clone()).filter(|url| !url.is_empty()),
    });
    let single = order.ordered_items.iter().map(|product| OrderLine {
        name: product.name.clone(),
        unit_price: parse_price(&product.price).ok(),
        quantity: 1,
        image_url: product.image_urls.first().cloned(),
    });
    cart.chain(single).collect()
}

pub struct OrderTracking {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    state: watch::Sender<TrackingState>,
}

impl OrderTracking {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity, state: watch::channel(TrackingState::Idle).0 }
    }

    pub fn state(&self) -> TrackingState { self.state.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<TrackingState> { self.state.subscribe() }

    /// Dismisses an error and returns to idle. Other states are left alone.
    pub fn clear_error(&self) {
        self.state.send_if_modified(|state| {
            if !matches!(state, TrackingState::Error(_)) { return false; }
            *state = TrackingState::Idle;
            true
        });
    }

    pub async fn fetch(&self, order_id: &str) -> TrackingState {
        let Some(user) = self.identity.current_user() else {
            return self.settle(TrackingState::Error(NOT_AUTHENTICATED.to_string()));
        };
        self.state.send_replace(TrackingState::Loading);
        let path = paths::order(&user.uid, order_id);
        let next = match self.store.get(&path).await {
            Ok(None) => TrackingState::NotFound,
            Ok(Some(value)) => match serde_json::from_value::<Order>(value) {
                Ok(mut order) => {
                    if order.order_id.is_empty() { order.order_id = order_id.to_string(); }
                    if !order.order_stages.is_monotonic() {
                        warn!(%path, "Order stages are stamped out of order");
                    }
                    info!(%path, status = %order.order_status, "Order fetched");
                    TrackingState::Found(Box::new(order))
                }
                Err(error) => {
                    debug!(%path, %error, "Order document did not decode");
                    TrackingState::Error(INVALID_ORDER.to_string())
                }
            },
            Err(error) => TrackingState::Error(format!("Failed to fetch order: {}", error)),
        };
        self.settle(next)
    }

    fn settle(&self, next: TrackingState) -> TrackingState {
        self.state.send_replace(next.clone());
        next
    }
}
