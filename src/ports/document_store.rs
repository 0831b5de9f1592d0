//! Remote document store port.
//!
//! The realtime database is an external service; the core only needs the narrow
//! surface below. [`InMemoryDocumentStore`] backs the local binary and the tests.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::watch;
use uuid::Uuid;

pub mod paths {
    pub const PRODUCTS: &str = "products";
    pub const BANNERS: &str = "banners";
    pub const COUPONS: &str = "coupons";

    pub fn cart(uid: &str) -> String { format!("carts/{}", uid) }
    pub fn orders(uid: &str) -> String { format!("orders/{}", uid) }
    pub fn order(uid: &str, order_id: &str) -> String { format!("orders/{}/{}", uid, order_id) }
    pub fn user(uid: &str) -> String { format!("users/{}", uid) }
}

/// Latest value at a path; `None` when nothing is stored there.
pub type Snapshot = Option<Value>;

/// Continuous subscription. Dropping the receiver tears it down.
pub type Subscription = watch::Receiver<Snapshot>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("permission denied at '{0}'")]
    PermissionDenied(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("cannot update fields of a non-object at '{0}'")]
    NotAnObject(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Subscribes to `path`. The receiver starts with the current value.
    fn subscribe(&self, path: &str) -> Subscription;
    async fn get(&self, path: &str) -> Result<Snapshot, StoreError>;
    /// Overwrites the document at `path` (last writer wins).
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;
    /// Reserves a new child key under `path`; nothing is written yet.
    async fn push(&self, path: &str) -> Result<String, StoreError>;
    async fn remove(&self, path: &str) -> Result<(), StoreError>;
}

/// Children of a collection node: array elements, or object values in key order.
pub fn children(snapshot: Option<&Value>) -> Vec<(String, &Value)> {
    match snapshot {
        Some(Value::Array(items)) => items.iter().enumerate().filter(|(_, v)| !v.is_null()).map(|(i, v)| (i.to_string(), v)).collect(),
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        _ => vec![],
    }
}

/// Decodes every child of `snapshot` as `T`, skipping the ones that do not fit.
pub fn decode_children<T: DeserializeOwned>(snapshot: Option<&Value>, path: &str) -> Vec<T> {
    children(snapshot).into_iter().filter_map(|(key, value)| match serde_json::from_value(value.clone()) {
        Ok(item) => Some(item),
        Err(error) => {
            tracing::debug!(%path, %key, %error, "Skipping malformed child");
            None
        }
    }).collect()
}

fn segments(path: &str) -> Vec<String> { path.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect() }

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.iter().all(Value::is_null),
        _ => false,
    }
}

fn lookup<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| match node {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }).filter(|v| !is_absent(v))
}

fn as_object(node: &mut Value) -> &mut Map<String, Value> {
    if let Value::Array(items) = node {
        let map = items.drain(..).enumerate().filter(|(_, v)| !v.is_null()).map(|(i, v)| (i.to_string(), v)).collect();
        *node = Value::Object(map);
    }
    if !node.is_object() { *node = Value::Object(Map::new()); }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just made an object"),
    }
}

fn write(root: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = if is_absent(&value) { Value::Object(Map::new()) } else { value };
        return;
    };
    let mut node = root;
    for key in parents { node = as_object(node).entry(key.clone()).or_insert(Value::Null); }
    let map = as_object(node);
    if is_absent(&value) { map.remove(last); } else { map.insert(last.clone(), value); }
}

/// Drops empty objects left behind along `path` after a removal.
fn prune(root: &mut Value, path: &[String]) {
    for depth in (1..path.len()).rev() {
        if lookup(root, &path[..depth]).is_none() { write(root, &path[..depth], Value::Null); }
    }
}

struct Watcher {
    path: Vec<String>,
    sender: watch::Sender<Snapshot>,
}

/// Process-local document tree with path subscriptions.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    root: RwLock<Value>,
    watchers: Mutex<Vec<Watcher>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self { Self { root: RwLock::new(Value::Object(Map::new())), watchers: Mutex::new(vec![]) } }

    pub fn with_root(root: Value) -> Self { Self { root: RwLock::new(root), watchers: Mutex::new(vec![]) } }

    fn read(&self, path: &[String]) -> Snapshot { lookup(&self.root.read(), path).cloned() }

    fn notify(&self, changed: &[String]) {
        let mut watchers = self.watchers.lock();
        watchers.retain(|w| !w.sender.is_closed());
        for watcher in watchers.iter() {
            let related = watcher.path.starts_with(changed) || changed.starts_with(&watcher.path);
            if !related { continue; }
            let latest = self.read(&watcher.path);
            watcher.sender.send_if_modified(|current| {
                if *current == latest { return false; }
                *current = latest;
                true
            });
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn subscribe(&self, path: &str) -> Subscription {
        let path = segments(path);
        let mut watchers = self.watchers.lock();
        let (sender, receiver) = watch::channel(self.read(&path));
        watchers.push(Watcher { path, sender });
        receiver
    }

    async fn get(&self, path: &str) -> Result<Snapshot, StoreError> { Ok(self.read(&segments(path))) }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let path = segments(path);
        {
            let mut root = self.root.write();
            write(&mut root, &path, value);
            prune(&mut root, &path);
        }
        self.notify(&path);
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let path = segments(path);
        {
            let mut root = self.root.write();
            if let Some(existing) = lookup(&root, &path) {
                if !existing.is_object() { return Err(StoreError::NotAnObject(path.join("/"))); }
            }
            for (key, value) in fields {
                let mut child = path.clone();
                child.extend(segments(&key));
                write(&mut root, &child, value);
                prune(&mut root, &child);
            }
        }
        self.notify(&path);
        Ok(())
    }

    async fn push(&self, _path: &str) -> Result<String, StoreError> { Ok(Uuid::now_v7().to_string()) }

    async fn remove(&self, path: &str) -> Result<(), StoreError> { self.set(path, Value::Null).await }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = InMemoryDocumentStore::new();
        store.set("orders/u1/o1", json!({"totalAmount": 250.0})).await.unwrap();
        assert_eq!(store.get("orders/u1/o1/totalAmount").await.unwrap(), Some(json!(250.0)));
        store.remove("orders/u1/o1").await.unwrap();
        assert_eq!(store.get("orders/u1").await.unwrap(), None);
        assert_eq!(store.get("orders").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = InMemoryDocumentStore::new();
        store.set("users/u1", json!({"fullName": "Asha", "email": "a@x.in"})).await.unwrap();
        let mut fields = Map::new();
        fields.insert("address".into(), json!({"city": "Pune"}));
        store.update("users/u1", fields).await.unwrap();
        let user = store.get("users/u1").await.unwrap().unwrap();
        assert_eq!(user["fullName"], "Asha");
        assert_eq!(user["address"]["city"], "Pune");
    }

    #[tokio::test]
    async fn test_subscription_sees_descendant_and_ancestor_writes() {
        let store = InMemoryDocumentStore::new();
        let mut cart = store.subscribe("carts/u1");
        assert_eq!(*cart.borrow_and_update(), None);

        store.set("carts/u1", json!([{"name": "A"}])).await.unwrap();
        assert!(cart.has_changed().unwrap());
        assert_eq!(cart.borrow_and_update().as_ref().unwrap()[0]["name"], "A");

        store.set("carts", json!({"u2": []})).await.unwrap();
        assert_eq!(*cart.borrow_and_update(), None);

        store.set("carts/u2/0", json!({"name": "B"})).await.unwrap();
        assert!(!cart.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_dropped_subscriptions_are_released() {
        let store = InMemoryDocumentStore::new();
        drop(store.subscribe("products"));
        store.set("products/p1", json!({"name": "Rex"})).await.unwrap();
        assert!(store.watchers.lock().is_empty());
    }

    #[test]
    fn test_decode_children_skips_malformed() {
        let value = json!({"a": {"code": "X", "active": true}, "b": 42});
        #[derive(serde::Deserialize)]
        struct Code { code: String }
        let codes: Vec<Code> = decode_children(Some(&value), "coupons");
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, "X");
    }

    #[tokio::test]
    async fn test_push_keys_are_unique() {
        let store = InMemoryDocumentStore::new();
        let a = store.push("orders/u1").await.unwrap();
        let b = store.push("orders/u1").await.unwrap();
        assert_ne!(a, b);
    }
}
