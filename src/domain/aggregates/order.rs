//! Order Aggregate
//!
//! An order is written once, on payment success, under `orders/{uid}/{orderId}`.
//! This client never advances it past `confirmed`; later stages are stamped by the
//! fulfilment back office and only read here.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::{CartItem, CheckoutSource, Coupon, Product, ShippingDetails};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::TrackingId;

/// Fulfilment milestones, in the only order they can be reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStage { #[default] Confirmed, Packed, Shipped, OutForDelivery, Delivered }

impl OrderStage {
    pub const ALL: [OrderStage; 5] = [Self::Confirmed, Self::Packed, Self::Shipped, Self::OutForDelivery, Self::Delivered];

    pub fn key(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Packed => "packed",
            Self::Shipped => "shipped",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Confirmed => "Order Confirmed",
            Self::Packed => "Packed",
            Self::Shipped => "Shipped",
            Self::OutForDelivery => "Out for Delivery",
            Self::Delivered => "Delivered",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> { Self::ALL.into_iter().find(|s| s.key() == key) }
}

/// Epoch-millis stamp per stage; `None` means not reached yet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderStages {
    pub confirmed: Option<i64>,
    pub packed: Option<i64>,
    pub shipped: Option<i64>,
    pub out_for_delivery: Option<i64>,
    pub delivered: Option<i64>,
}

impl OrderStages {
    pub fn confirmed_at(epoch_millis: i64) -> Self { Self { confirmed: Some(epoch_millis), ..Default::default() } }

    pub fn get(&self, stage: OrderStage) -> Option<i64> {
        match stage {
            OrderStage::Confirmed => self.confirmed,
            OrderStage::Packed => self.packed,
            OrderStage::Shipped => self.shipped,
            OrderStage::OutForDelivery => self.out_for_delivery,
            OrderStage::Delivered => self.delivered,
        }
    }

    fn slot(&mut self, stage: OrderStage) -> &mut Option<i64> {
        match stage {
            OrderStage::Confirmed => &mut self.confirmed,
            OrderStage::Packed => &mut self.packed,
            OrderStage::Shipped => &mut self.shipped,
            OrderStage::OutForDelivery => &mut self.out_for_delivery,
            OrderStage::Delivered => &mut self.delivered,
        }
    }

    /// Furthest stage with a stamp.
    pub fn latest(&self) -> Option<OrderStage> { OrderStage::ALL.into_iter().rev().find(|s| self.get(*s).is_some()) }

    /// Stamps `stage`. Only the next unstamped stage may be stamped, never earlier than its predecessor.
    pub fn stamp(&mut self, stage: OrderStage, epoch_millis: i64) -> Result<(), OrderError> {
        if self.get(stage).is_some() { return Err(OrderError::AlreadyStamped(stage)); }
        let expected = match self.latest() {
            None => OrderStage::Confirmed,
            Some(OrderStage::Delivered) => return Err(OrderError::AlreadyStamped(OrderStage::Delivered)),
            Some(last) => OrderStage::ALL[OrderStage::ALL.iter().position(|s| *s == last).unwrap_or(0) + 1],
        };
        if stage != expected { return Err(OrderError::StageOutOfOrder { stage, expected }); }
        if let Some(previous) = self.latest().and_then(|s| self.get(s)) {
            if epoch_millis < previous { return Err(OrderError::StampBeforePrevious(stage)); }
        }
        *self.slot(stage) = Some(epoch_millis);
        Ok(())
    }

    /// True when stamps form a gap-free prefix with non-decreasing times.
    pub fn is_monotonic(&self) -> bool {
        let mut previous: Option<i64> = None;
        let mut gap = false;
        for stage in OrderStage::ALL {
            match (self.get(stage), gap) {
                (Some(_), true) => return false,
                (Some(at), false) => {
                    if previous.map_or(false, |p| at < p) { return false; }
                    previous = Some(at);
                }
                (None, _) => gap = true,
            }
        }
        true
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouponSnapshot { pub code: String, pub discount: String, pub id: String }

impl From<&Coupon> for CouponSnapshot {
    fn from(c: &Coupon) -> Self { Self { code: c.code.clone(), discount: c.discount.clone(), id: c.id.clone() } }
}

/// Buy-now line as denormalized into `orderedItems`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderedProduct {
    pub name: String,
    pub price: String,
    pub description: String,
    #[serde(rename = "imageUrl")]
    pub image_urls: Vec<String>,
    pub ebook_url: Option<String>,
}

impl From<&Product> for OrderedProduct {
    fn from(p: &Product) -> Self {
        Self { name: p.name.clone(), price: p.price.clone(), description: p.description.clone(), image_urls: p.image_urls.clone(), ebook_url: p.ebook_url.clone() }
    }
}

/// Everything needed to write the order once payment clears. Travels through the
/// payment gateway's opaque metadata, so it is plain serializable data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub correlation_id: Uuid,
    pub user_id: String,
    pub shipping: ShippingDetails,
    pub total_amount: Decimal,
    pub currency: String,
    pub coupon: Option<CouponSnapshot>,
    pub source: CheckoutSource,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub order_id: String,
    #[serde(flatten)]
    pub shipping: ShippingDetails,
    #[serde(with = "rust_decimal::serde::float", default)]
    pub total_amount: Decimal,
    /// Creation time, epoch millis.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default = "confirmed_status")]
    pub order_status: String,
    #[serde(default)]
    pub tracking_id: Option<TrackingId>,
    #[serde(default)]
    pub order_stages: OrderStages,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon: Option<CouponSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ordered_items: Vec<OrderedProduct>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<CartItem>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

fn confirmed_status() -> String { OrderStage::Confirmed.key().to_string() }

impl Order {
    /// Builds the record for a paid draft. `confirmed` is stamped with the creation time.
    pub fn place(draft: &OrderDraft, order_id: impl Into<String>, payment_ref: impl Into<String>, tracking_id: TrackingId, now_millis: i64) -> Result<Self, OrderError> {
        let (ordered_items, items) = match &draft.source {
            CheckoutSource::BuyNow(products) => (products.iter().map(OrderedProduct::from).collect(), vec![]),
            CheckoutSource::Cart(lines) => (vec![], lines.clone()),
            CheckoutSource::Empty => return Err(OrderError::NoItems),
        };
        let mut order = Self {
            order_id: order_id.into(), shipping: draft.shipping.clone(), total_amount: draft.total_amount,
            timestamp: now_millis, payment_id: Some(payment_ref.into()), order_status: confirmed_status(),
            tracking_id: Some(tracking_id.clone()), order_stages: OrderStages::confirmed_at(now_millis),
            coupon: draft.coupon.clone(), ordered_items, items, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed { order_id: order.order_id.clone(), tracking_id, total: order.total_amount }));
        Ok(order)
    }

    pub fn is_cart_order(&self) -> bool { !self.items.is_empty() }

    pub fn status_stage(&self) -> Option<OrderStage> { OrderStage::from_key(&self.order_status) }

    /// `out_for_delivery` -> `Out For Delivery`.
    pub fn status_label(&self) -> String {
        self.order_status.split('_').filter(|w| !w.is_empty()).map(|w| {
            let mut chars = w.chars();
            match chars.next() { Some(first) => first.to_uppercase().chain(chars).collect::<String>(), None => String::new() }
        }).collect::<Vec<_>>().join(" ")
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Order has no items")]
    NoItems,
    #[error("Stage {0:?} is already stamped")]
    AlreadyStamped(OrderStage),
    #[error("Stage {stage:?} cannot be stamped before {expected:?}")]
    StageOutOfOrder { stage: OrderStage, expected: OrderStage },
    #[error("Stage {0:?} stamped earlier than the previous stage")]
    StampBeforePrevious(OrderStage),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipping() -> ShippingDetails {
        ShippingDetails { name: "Asha".into(), phone: "9999999999".into(), address: "1 Main St".into(), city: "Pune".into(), state: "MH".into(), pincode: "411001".into() }
    }

    fn cart_draft() -> OrderDraft {
        let line = CartItem { product_id: "A".into(), name: "A".into(), price: Decimal::new(100, 0), quantity: 2, image_url: String::new(), ebook_url: None };
        OrderDraft { correlation_id: Uuid::new_v4(), user_id: "u1".into(), shipping: shipping(), total_amount: Decimal::new(200, 0), currency: "INR".into(), coupon: None, source: CheckoutSource::Cart(vec![line]) }
    }

    #[test]
    fn test_place_stamps_confirmed_only() {
        let mut order = Order::place(&cart_draft(), "o1", "pay_1", TrackingId::generate(), 1_700_000_000_000).unwrap();
        assert_eq!(order.order_stages.confirmed, Some(1_700_000_000_000));
        assert_eq!(order.order_stages.latest(), Some(OrderStage::Confirmed));
        assert_eq!(order.status_stage(), Some(OrderStage::Confirmed));
        assert!(order.is_cart_order());
        assert!(matches!(order.take_events().as_slice(), [DomainEvent::Order(OrderEvent::Placed { .. })]));
    }

    #[test]
    fn test_place_refuses_empty_source() {
        let mut draft = cart_draft();
        draft.source = CheckoutSource::Empty;
        assert_eq!(Order::place(&draft, "o1", "p", TrackingId::generate(), 0), Err(OrderError::NoItems));
    }

    #[test]
    fn test_stages_are_append_only() {
        let mut stages = OrderStages::confirmed_at(10);
        assert_eq!(stages.stamp(OrderStage::Shipped, 20), Err(OrderError::StageOutOfOrder { stage: OrderStage::Shipped, expected: OrderStage::Packed }));
        assert_eq!(stages.stamp(OrderStage::Packed, 5), Err(OrderError::StampBeforePrevious(OrderStage::Packed)));
        stages.stamp(OrderStage::Packed, 20).unwrap();
        assert_eq!(stages.stamp(OrderStage::Packed, 30), Err(OrderError::AlreadyStamped(OrderStage::Packed)));
        assert!(stages.is_monotonic());
    }

    #[test]
    fn test_gap_is_not_monotonic() {
        let stages = OrderStages { confirmed: Some(1), shipped: Some(2), ..Default::default() };
        assert!(!stages.is_monotonic());
    }

    #[test]
    fn test_document_shape() {
        let order = Order::place(&cart_draft(), "o1", "pay_1", TrackingId::generate(), 5).unwrap();
        let doc = serde_json::to_value(&order).unwrap();
        assert_eq!(doc["orderId"], "o1");
        assert_eq!(doc["pincode"], "411001");
        assert_eq!(doc["orderStatus"], "confirmed");
        assert_eq!(doc["orderStages"]["confirmed"], 5);
        assert!(doc["orderStages"]["out_for_delivery"].is_null());
        assert_eq!(doc["items"][0]["quantity"], 2);
        assert!(doc.get("orderedItems").is_none());
        let back: Order = serde_json::from_value(doc).unwrap();
        assert_eq!(back.total_amount, Decimal::new(200, 0));
    }

    #[test]
    fn test_status_label() {
        let mut order = Order::place(&cart_draft(), "o1", "p", TrackingId::generate(), 0).unwrap();
        order.order_status = "out_for_delivery".into();
        assert_eq!(order.status_label(), "Out For Delivery");
    }
}
