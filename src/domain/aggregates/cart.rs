//! Cart Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::Product;
use crate::domain::events::{CartEvent, DomainEvent};

/// One line of a user's cart, as stored under `carts/{uid}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Empty on rows written before lines were keyed by catalog id.
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(with = "rust_decimal::serde::float", default)]
    pub price: Decimal,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub ebook_url: Option<String>,
}

fn one() -> u32 { 1 }

impl CartItem {
    pub fn from_product(product: &Product) -> Self {
        Self {
            product_id: product.product_id.clone(),
            name: product.name.clone(),
            price: product.unit_price_or_zero(),
            quantity: 1,
            image_url: product.primary_image().unwrap_or_default().to_string(),
            ebook_url: product.ebook_url.clone(),
        }
    }

    /// Merge key: the catalog id, or the name for legacy rows without one.
    pub fn key(&self) -> &str { if self.product_id.is_empty() { &self.name } else { &self.product_id } }

    pub fn line_total(&self) -> Decimal { self.price * Decimal::from(self.quantity) }

    fn refers_to(&self, product: &Product) -> bool {
        if self.product_id.is_empty() || product.product_id.is_empty() { self.name == product.name }
        else { self.product_id == product.product_id }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Cart {
    items: Vec<CartItem>,
    events: Vec<DomainEvent>,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn from_items(items: Vec<CartItem>) -> Self { Self { items, events: vec![] } }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn item_count(&self) -> usize { self.items.len() }

    pub fn total(&self) -> Decimal { self.items.iter().map(CartItem::line_total).sum() }

    /// Adds one unit of `product`. An existing line for the same catalog item keeps its position.
    pub fn add_product(&mut self, product: &Product) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.refers_to(product)) {
            existing.quantity += 1;
            if existing.product_id.is_empty() { existing.product_id = product.product_id.clone(); }
            let (key, quantity) = (existing.key().to_string(), existing.quantity);
            self.raise_event(CartEvent::QuantityChanged { key, quantity });
        } else {
            let item = CartItem::from_product(product);
            self.raise_event(CartEvent::ItemAdded { key: item.key().to_string(), quantity: 1 });
            self.items.push(item);
        }
    }

    /// Removes the line equal to `item`. Returns false when nothing matched.
    pub fn remove_item(&mut self, item: &CartItem) -> bool {
        match self.items.iter().position(|i| i == item) {
            Some(index) => {
                let removed = self.items.remove(index);
                self.raise_event(CartEvent::ItemRemoved { key: removed.key().to_string() });
                true
            }
            None => false,
        }
    }

    pub fn increase(&mut self, item: &CartItem) -> bool {
        let Some(existing) = self.items.iter_mut().find(|i| i.key() == item.key()) else { return false };
        existing.quantity += 1;
        let (key, quantity) = (existing.key().to_string(), existing.quantity);
        self.raise_event(CartEvent::QuantityChanged { key, quantity });
        true
    }

    /// Takes one unit off; a line already at 1 is removed instead.
    pub fn decrease(&mut self, item: &CartItem) -> bool {
        let Some(index) = self.items.iter().position(|i| i.key() == item.key()) else { return false };
        if self.items[index].quantity > 1 {
            self.items[index].quantity -= 1;
            let (key, quantity) = (self.items[index].key().to_string(), self.items[index].quantity);
            self.raise_event(CartEvent::QuantityChanged { key, quantity });
        } else {
            let removed = self.items.remove(index);
            self.raise_event(CartEvent::ItemRemoved { key: removed.key().to_string() });
        }
        true
    }

    pub fn clear(&mut self) { self.items.clear(); self.raise_event(CartEvent::Cleared); }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: CartEvent) { self.events.push(DomainEvent::Cart(e)); }
}
