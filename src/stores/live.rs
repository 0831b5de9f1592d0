//! Read-only mirrors of remote collections.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use crate::ports::DocumentStore;

/// Keeps an immutable, decoded copy of a remote collection. Each remote snapshot
/// replaces the previous copy wholesale.
pub struct LiveList<T> {
    snapshot: watch::Receiver<Arc<Vec<T>>>,
    task: JoinHandle<()>,
}

impl<T: Send + Sync + 'static> LiveList<T> {
    /// Subscribes to `path`. The first snapshot is decoded before this returns.
    pub fn mirror<F>(store: &dyn DocumentStore, path: &str, decode: F) -> Self
    where
        F: Fn(Option<&Value>) -> Vec<T> + Send + 'static,
    {
        let mut remote = store.subscribe(path);
        let initial = decode(remote.borrow_and_update().as_ref());
        let (tx, snapshot) = watch::channel(Arc::new(initial));
        let path = path.to_string();
        let task = tokio::spawn(async move {
            while remote.changed().await.is_ok() {
                let items = decode(remote.borrow_and_update().as_ref());
                tracing::debug!(%path, count = items.len(), "Remote snapshot replaced");
                tx.send_replace(Arc::new(items));
            }
            tracing::debug!(%path, "Subscription closed");
        });
        Self { snapshot, task }
    }

    pub fn snapshot(&self) -> Arc<Vec<T>> { self.snapshot.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<T>>> { self.snapshot.clone() }
}

impl<T> Drop for LiveList<T> {
    fn drop(&mut self) { self.task.abort(); }
}
