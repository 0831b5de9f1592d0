//! Narrow interfaces to the external services the core depends on.
pub mod document_store;
pub mod identity;
pub mod notifications;
pub mod payment;

pub use document_store::{paths, DocumentStore, InMemoryDocumentStore, Snapshot, StoreError, Subscription};
pub use identity::{IdentityProvider, SessionIdentity, UserIdentity};
pub use notifications::{LogNotifier, NatsNotifier, Notification, NotificationChannel, NotificationSink, NotifyError};
pub use payment::{PaymentConfirmation, PaymentFailure, PaymentGateway, PaymentRequest, SimulatedGateway};
