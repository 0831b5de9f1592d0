//! Product catalog mirror.

use std::sync::Arc;
use tokio::sync::watch;
use crate::domain::aggregates::Product;
use crate::ports::document_store::{decode_children, paths};
use crate::ports::DocumentStore;
use crate::stores::live::LiveList;

pub struct ProductCatalog {
    products: LiveList<Product>,
}

impl ProductCatalog {
    pub fn new(store: &dyn DocumentStore) -> Self {
        Self { products: LiveList::mirror(store, paths::PRODUCTS, |snapshot| decode_children(snapshot, paths::PRODUCTS)) }
    }

    pub fn snapshot(&self) -> Arc<Vec<Product>> { self.products.snapshot() }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Product>>> { self.products.subscribe() }

    pub fn by_id(&self, product_id: &str) -> Option<Product> {
        self.snapshot().iter().find(|p| p.product_id == product_id).cloned()
    }

    /// Case-insensitive category match.
    pub fn by_category(&self, category: &str) -> Vec<Product> {
        self.snapshot().iter().filter(|p| p.in_category(category)).cloned().collect()
    }
}
