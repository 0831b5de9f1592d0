//! Per-user cart, mirrored from `carts/{uid}`.
//!
//! Local mutations apply immediately and are then written back as a whole-cart
//! overwrite by a single writer task, so writes land in the order they were made.
//! Remote snapshots replace local state, except while local writes are still in
//! flight. The store follows the identity provider: sign-out empties it, sign-in
//! re-subscribes to the new user's cart.

use rust_decimal::Decimal;
use serde_json::Value;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::domain::aggregates::{Cart, CartItem, Product};
use crate::ports::document_store::{decode_children, paths};
use crate::ports::{DocumentStore, IdentityProvider, StoreError};

/// Completion of one cart write. Dropping it leaves the write running.
#[derive(Debug)]
pub struct CartSync(oneshot::Receiver<Result<(), StoreError>>);

impl CartSync {
    pub async fn wait(self) -> Result<(), StoreError> {
        self.0.await.unwrap_or_else(|_| Err(StoreError::Unavailable("cart writer stopped".to_string())))
    }
}

struct WriteJob {
    path: String,
    items: Vec<CartItem>,
    done: oneshot::Sender<Result<(), StoreError>>,
}

struct CartState {
    uid: Option<String>,
    cart: Cart,
}

struct CartInner {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    state: Mutex<CartState>,
    snapshots: watch::Sender<Arc<[CartItem]>>,
    loaded_for: watch::Sender<Option<String>>,
    in_flight: Arc<AtomicUsize>,
    writes: mpsc::UnboundedSender<WriteJob>,
}

impl CartInner {
    fn replace(&self, uid: Option<String>, items: Vec<CartItem>) {
        {
            let mut state = self.state.lock();
            state.uid = uid.clone();
            state.cart = Cart::from_items(items);
            self.snapshots.send_replace(state.cart.items().into());
        }
        self.loaded_for.send_replace(uid);
    }

    /// Applies a remote snapshot unless local writes are still queued.
    fn apply_remote(&self, uid: &str, items: Vec<CartItem>) -> bool {
        {
            let mut state = self.state.lock();
            if self.in_flight.load(Ordering::SeqCst) > 0 { return false; }
            state.cart = Cart::from_items(items);
            self.snapshots.send_replace(state.cart.items().into());
        }
        self.loaded_for.send_replace(Some(uid.to_string()));
        true
    }
}

pub struct CartStore {
    inner: Arc<CartInner>,
    follower: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl CartStore {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        let (writes, queue) = mpsc::unbounded_channel();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let writer = tokio::spawn(run_writer(store.clone(), queue, in_flight.clone()));
        let inner = Arc::new(CartInner {
            store, identity,
            state: Mutex::new(CartState { uid: None, cart: Cart::new() }),
            snapshots: watch::channel(Arc::from(Vec::new())).0,
            loaded_for: watch::channel(None).0,
            in_flight, writes,
        });
        let follower = tokio::spawn(follow_identity(inner.clone()));
        Self { inner, follower, writer }
    }

    pub fn snapshot(&self) -> Arc<[CartItem]> { self.inner.snapshots.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<Arc<[CartItem]>> { self.inner.snapshots.subscribe() }

    pub fn total(&self) -> Decimal { self.snapshot().iter().map(CartItem::line_total).sum() }

    pub fn find(&self, key: &str) -> Option<CartItem> { self.snapshot().iter().find(|i| i.key() == key).cloned() }

    /// Resolves once the cart of the currently signed-in user (or the empty
    /// signed-out cart) has been loaded. The target follows identity changes
    /// made while waiting.
    pub async fn wait_until_loaded(&self) {
        let mut auth = self.inner.identity.watch();
        let mut loaded = self.inner.loaded_for.subscribe();
        loop {
            let target = auth.borrow_and_update().as_ref().map(|u| u.uid.clone());
            if *loaded.borrow_and_update() == target { return; }
            tokio::select! {
                changed = loaded.changed() => if changed.is_err() { return; },
                changed = auth.changed() => if changed.is_err() { return; },
            }
        }
    }

    pub fn add_item(&self, product: &Product) -> Option<CartSync> {
        self.mutate("add", |cart| { cart.add_product(product); true })
    }

    pub fn remove_item(&self, item: &CartItem) -> Option<CartSync> { self.mutate("remove", |cart| cart.remove_item(item)) }

    pub fn increase(&self, item: &CartItem) -> Option<CartSync> { self.mutate("increase", |cart| cart.increase(item)) }

    /// At quantity 1 this removes the line.
    pub fn decrease(&self, item: &CartItem) -> Option<CartSync> { self.mutate("decrease", |cart| cart.decrease(item)) }

    /// Applies `change` for the signed-in user and queues the write-back. `None`
    /// when nobody is signed in, the user's cart is not loaded yet, or nothing changed.
    fn mutate(&self, operation: &'static str, change: impl FnOnce(&mut Cart) -> bool) -> Option<CartSync> {
        let user = self.inner.identity.current_user()?;
        let mut state = self.inner.state.lock();
        if state.uid.as_deref() != Some(user.uid.as_str()) {
            debug!(uid = %user.uid, operation, "Cart not loaded for user yet, ignoring");
            return None;
        }
        if !change(&mut state.cart) { return None; }
        for event in state.cart.take_events() { debug!(uid = %user.uid, ?event, "Cart changed"); }
        let items = state.cart.items().to_vec();
        self.inner.snapshots.send_replace(items.clone().into());
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        drop(state);

        let (done, receipt) = oneshot::channel();
        let job = WriteJob { path: paths::cart(&user.uid), items, done };
        if let Err(mpsc::error::SendError(job)) = self.inner.writes.send(job) {
            self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
            warn!(path = %job.path, "Cart writer is gone, change kept locally only");
        }
        Some(CartSync(receipt))
    }
}

impl Drop for CartStore {
    fn drop(&mut self) {
        self.follower.abort();
        self.writer.abort();
    }
}

async fn run_writer(store: Arc<dyn DocumentStore>, mut queue: mpsc::UnboundedReceiver<WriteJob>, in_flight: Arc<AtomicUsize>) {
    while let Some(job) = queue.recv().await {
        let result = match serde_json::to_value(&job.items) {
            Ok(value) => store.set(&job.path, value).await,
            Err(error) => Err(StoreError::Unavailable(format!("cart encoding failed: {}", error))),
        };
        in_flight.fetch_sub(1, Ordering::SeqCst);
        match &result {
            Ok(()) => debug!(path = %job.path, count = job.items.len(), "Cart synced"),
            Err(error) => warn!(path = %job.path, %error, "Cart sync failed"),
        }
        let _ = job.done.send(result);
    }
}

fn decode_cart(snapshot: Option<&Value>, path: &str) -> Vec<CartItem> {
    decode_children::<CartItem>(snapshot, path).into_iter().filter(|item| item.quantity > 0).collect()
}

async fn follow_identity(inner: Arc<CartInner>) {
    let mut auth = inner.identity.watch();
    loop {
        let user = auth.borrow_and_update().clone();
        let Some(user) = user else {
            inner.replace(None, Vec::new());
            if auth.changed().await.is_err() { return; }
            continue;
        };

        let path = paths::cart(&user.uid);
        let mut remote = inner.store.subscribe(&path);
        let initial = decode_cart(remote.borrow_and_update().as_ref(), &path);
        info!(uid = %user.uid, count = initial.len(), "Cart subscribed");
        inner.replace(Some(user.uid.clone()), initial);

        loop {
            tokio::select! {
                changed = remote.changed() => {
                    if changed.is_err() {
                        warn!(%path, "Cart subscription closed");
                        if auth.changed().await.is_err() { return; }
                        break;
                    }
                    let items = decode_cart(remote.borrow_and_update().as_ref(), &path);
                    if !inner.apply_remote(&user.uid, items) {
                        debug!(%path, "Local cart writes in flight, remote snapshot skipped");
                    }
                }
                changed = auth.changed() => {
                    if changed.is_err() { return; }
                    debug!(%path, "Identity changed, dropping cart subscription");
                    break;
                }
            }
        }
    }
}
