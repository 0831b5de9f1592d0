//! Identity provider port.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub uid: String,
    #[serde(default)]
    pub email: String,
}

pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserIdentity>;
    /// Auth-state changes; the receiver starts with the current user.
    fn watch(&self) -> watch::Receiver<Option<UserIdentity>>;
}

/// Identity held by this process, switched by explicit sign-in and sign-out.
pub struct SessionIdentity {
    state: watch::Sender<Option<UserIdentity>>,
}

impl Default for SessionIdentity {
    fn default() -> Self { Self::new() }
}

impl SessionIdentity {
    pub fn new() -> Self { Self { state: watch::channel(None).0 } }

    pub fn signed_in(user: UserIdentity) -> Self { Self { state: watch::channel(Some(user)).0 } }

    pub fn sign_in(&self, user: UserIdentity) {
        tracing::info!(uid = %user.uid, "User signed in");
        self.state.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.state.send_replace(None) {
            tracing::info!(uid = %previous.uid, "User signed out");
        }
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user(&self) -> Option<UserIdentity> { self.state.borrow().clone() }
    fn watch(&self) -> watch::Receiver<Option<UserIdentity>> { self.state.subscribe() }
}
