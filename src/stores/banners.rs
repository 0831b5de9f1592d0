//! Promotional banner feed.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use crate::domain::aggregates::Banner;
use crate::ports::document_store::{decode_children, paths};
use crate::ports::{DocumentStore, Notification, NotificationSink};
use crate::stores::live::LiveList;

/// Live list of banner image links. Links that show up after the first snapshot
/// raise a "new deal" notification on the promotional channel.
pub struct BannerFeed {
    links: LiveList<String>,
    announcer: JoinHandle<()>,
}

impl BannerFeed {
    pub fn new(store: &dyn DocumentStore, notifier: Arc<dyn NotificationSink>) -> Self {
        let links = LiveList::mirror(store, paths::BANNERS, |snapshot| {
            decode_children::<Banner>(snapshot, paths::BANNERS).into_iter().map(|b| b.link).filter(|link| !link.is_empty()).collect()
        });
        let mut updates = links.subscribe();
        let mut seen: HashSet<String> = links.snapshot().iter().cloned().collect();
        let announcer = tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let current = updates.borrow_and_update().clone();
                for link in current.iter().filter(|link| !seen.contains(*link)) {
                    tracing::info!(%link, "New banner");
                    if let Err(error) = notifier.notify(&Notification::new_deal()).await {
                        tracing::warn!(%error, "Failed to announce new banner");
                    }
                }
                seen = current.iter().cloned().collect();
            }
        });
        Self { links, announcer }
    }

    pub fn links(&self) -> Arc<Vec<String>> { self.links.snapshot() }
}

impl Drop for BannerFeed {
    fn drop(&mut self) { self.announcer.abort(); }
}
