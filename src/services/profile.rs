//! User profile document at `users/{uid}`.

use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use crate::domain::aggregates::ShippingDetails;
use crate::ports::document_store::paths;
use crate::ports::{DocumentStore, StoreError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<ShippingDetails>,
}

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn DocumentStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self { Self { store } }

    /// Missing or unreadable profiles come back empty.
    pub async fn load(&self, uid: &str) -> Result<UserProfile, StoreError> {
        let snapshot = self.store.get(&paths::user(uid)).await?;
        Ok(snapshot.and_then(|value| match serde_json::from_value(value) {
            Ok(profile) => Some(profile),
            Err(error) => {
                warn!(%uid, %error, "Unreadable user profile");
                None
            }
        }).unwrap_or_default())
    }

    /// Stores `details` as the profile address in the background. Failures are
    /// logged and not retried.
    pub fn save_address(&self, uid: &str, details: &ShippingDetails) -> JoinHandle<()> {
        let store = self.store.clone();
        let path = paths::user(uid);
        let address = serde_json::to_value(details);
        tokio::spawn(async move {
            let address = match address {
                Ok(address) => address,
                Err(error) => {
                    warn!(%path, %error, "Could not encode address");
                    return;
                }
            };
            let mut fields = Map::new();
            fields.insert("address".to_string(), address);
            match store.update(&path, fields).await {
                Ok(()) => info!(%path, "Profile address updated"),
                Err(error) => warn!(%path, %error, "Profile address update failed"),
            }
        })
    }
}
