//! Coupon catalog. Read once per request rather than mirrored.

use std::sync::Arc;
use crate::domain::aggregates::Coupon;
use crate::ports::document_store::{children, paths};
use crate::ports::{DocumentStore, StoreError};

pub struct CouponCatalog {
    store: Arc<dyn DocumentStore>,
}

impl CouponCatalog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self { Self { store } }

    /// Active coupons in store order. A coupon without an `id` takes its child key.
    pub async fn active_coupons(&self) -> Result<Vec<Coupon>, StoreError> {
        let snapshot = self.store.get(paths::COUPONS).await?;
        let coupons = children(snapshot.as_ref()).into_iter().filter_map(|(key, value)| {
            let mut coupon: Coupon = match serde_json::from_value(value.clone()) {
                Ok(coupon) => coupon,
                Err(error) => {
                    tracing::debug!(%key, %error, "Skipping malformed coupon");
                    return None;
                }
            };
            if coupon.id.is_empty() { coupon.id = key; }
            Some(coupon)
        }).filter(|c| c.active).collect();
        Ok(coupons)
    }

    pub async fn find_active(&self, coupon_id: &str) -> Result<Option<Coupon>, StoreError> {
        Ok(self.active_coupons().await?.into_iter().find(|c| c.id == coupon_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::InMemoryDocumentStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_only_active_coupons_are_offered() {
        let store = Arc::new(InMemoryDocumentStore::with_root(json!({
            "coupons": {
                "c1": {"id": "c1", "code": "DINO10", "discount": "10", "active": true},
                "c2": {"id": "c2", "code": "OLD50", "discount": "50", "active": false},
                "c3": {"code": "KEYED", "discount": "5", "active": true}
            }
        })));
        let catalog = CouponCatalog::new(store);
        let codes: Vec<String> = catalog.active_coupons().await.unwrap().into_iter().map(|c| c.code).collect();
        assert_eq!(codes, vec!["DINO10", "KEYED"]);
        assert_eq!(catalog.find_active("c3").await.unwrap().unwrap().code, "KEYED");
        assert!(catalog.find_active("c2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_coupons() {
        let catalog = CouponCatalog::new(Arc::new(InMemoryDocumentStore::new()));
        assert!(catalog.active_coupons().await.unwrap().is_empty());
    }
}
