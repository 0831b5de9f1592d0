//! Domain events
use rust_decimal::Decimal;
use crate::domain::value_objects::TrackingId;

#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Cart(CartEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum CartEvent {
    ItemAdded { key: String, quantity: u32 },
    QuantityChanged { key: String, quantity: u32 },
    ItemRemoved { key: String },
    Cleared,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OrderEvent {
    Placed { order_id: String, tracking_id: TrackingId, total: Decimal },
}
