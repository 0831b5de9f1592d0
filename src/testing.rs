//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use crate::domain::aggregates::{Product, ShippingDetails};
use crate::ports::{
    DocumentStore, InMemoryDocumentStore, Notification, NotificationSink, NotifyError, PaymentConfirmation,
    PaymentFailure, PaymentGateway, PaymentRequest, Snapshot, StoreError, Subscription,
};

pub fn shipping() -> ShippingDetails {
    ShippingDetails {
        name: "Asha".into(), phone: "9999999999".into(), address: "1 Main St".into(),
        city: "Pune".into(), state: "MH".into(), pincode: "411001".into(),
    }
}

pub fn product(id: &str, name: &str, price: &str) -> Product {
    Product { product_id: id.into(), name: name.into(), price: price.into(), image_urls: vec![format!("{}.png", id)], ..Default::default() }
}

pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    count: watch::Sender<usize>,
}

impl Default for RecordingNotifier {
    fn default() -> Self { Self { sent: Mutex::new(vec![]), count: watch::channel(0).0 } }
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> { self.sent.lock().clone() }

    /// Waits until at least `n` notifications went out. Panics after two seconds.
    pub async fn wait_for(&self, n: usize) {
        let mut count = self.count.subscribe();
        tokio::time::timeout(Duration::from_secs(2), count.wait_for(|c| *c >= n))
            .await
            .expect("timed out waiting for notifications")
            .expect("notifier dropped");
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let len = {
            let mut sent = self.sent.lock();
            sent.push(notification.clone());
            sent.len()
        };
        self.count.send_replace(len);
        Ok(())
    }
}

/// In-memory store whose writes under chosen prefixes fail until healed.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryDocumentStore,
    failing: Mutex<Vec<String>>,
    failed_writes: AtomicUsize,
}

impl FlakyStore {
    pub fn fail_writes_under(&self, prefix: &str) { self.failing.lock().push(prefix.to_string()); }

    pub fn heal(&self) { self.failing.lock().clear(); }

    pub fn failed_writes(&self) -> usize { self.failed_writes.load(Ordering::SeqCst) }

    fn check(&self, path: &str) -> Result<(), StoreError> {
        if self.failing.lock().iter().any(|prefix| path.starts_with(prefix.as_str())) {
            self.failed_writes.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable(format!("write to '{}' failed", path)));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    fn subscribe(&self, path: &str) -> Subscription { self.inner.subscribe(path) }

    async fn get(&self, path: &str) -> Result<Snapshot, StoreError> { self.inner.get(path).await }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.check(path)?;
        self.inner.set(path, value).await
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.check(path)?;
        self.inner.update(path, fields).await
    }

    async fn push(&self, path: &str) -> Result<String, StoreError> { self.inner.push(path).await }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.check(path)?;
        self.inner.remove(path).await
    }
}

/// Gateway that replays queued outcomes, succeeding once the queue is empty.
#[derive(Default)]
pub struct ScriptedGateway {
    outcomes: Mutex<VecDeque<Result<String, PaymentFailure>>>,
    requests: Mutex<Vec<PaymentRequest>>,
}

impl ScriptedGateway {
    pub fn fail_next(&self, code: i32, message: &str) {
        self.outcomes.lock().push_back(Err(PaymentFailure { code, message: message.to_string() }));
    }

    pub fn requests(&self) -> Vec<PaymentRequest> { self.requests.lock().clone() }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn open_checkout(&self, request: PaymentRequest) -> Result<PaymentConfirmation, PaymentFailure> {
        self.requests.lock().push(request.clone());
        let outcome = self.outcomes.lock().pop_front().unwrap_or_else(|| Ok("pay_test".to_string()));
        outcome.map(|payment_ref| PaymentConfirmation { payment_ref, metadata: request.metadata })
    }
}
