//! Auth provider with a preconfigured identity

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use super::{AuthError, AuthGrant, AuthProvider, AuthResult, AuthUser};
use crate::util::lock;

/// Provider that always signs in as one configured identity.
///
/// Used for local development and tests; can be told to reject sign-ins.
#[derive(Clone)]
pub struct FixedAuthProvider {
    grant: AuthGrant,
    reject_with: Arc<Mutex<Option<String>>>,
    state: Arc<Mutex<Option<watch::Sender<Option<AuthUser>>>>>,
}

impl FixedAuthProvider {
    pub fn new(user: AuthUser, access_token: Option<String>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            grant: AuthGrant { user, access_token },
            reject_with: Arc::new(Mutex::new(None)),
            state: Arc::new(Mutex::new(Some(state))),
        }
    }

    /// Make subsequent sign-ins fail with `message`, or succeed again with `None`.
    pub fn reject_sign_ins(&self, message: Option<&str>) {
        *lock(&self.reject_with) = message.map(str::to_string);
    }

    /// Simulate the provider dropping the session on its own (e.g. revoked).
    pub fn expire(&self) {
        self.publish(None);
    }

    /// Close the auth state feed, as when the provider goes away entirely.
    pub fn shut_down(&self) {
        lock(&self.state).take();
    }

    fn publish(&self, user: Option<AuthUser>) {
        if let Some(state) = lock(&self.state).as_ref() {
            state.send_replace(user);
        }
    }
}

impl AuthProvider for FixedAuthProvider {
    async fn sign_in(&self) -> AuthResult<AuthGrant> {
        let rejection = lock(&self.reject_with).clone();
        if let Some(message) = rejection {
            return Err(AuthError::Provider(message));
        }
        self.publish(Some(self.grant.user.clone()));
        Ok(self.grant.clone())
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.publish(None);
        Ok(())
    }

    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>> {
        match lock(&self.state).as_ref() {
            Some(state) => state.subscribe(),
            None => watch::channel(None).1,
        }
    }
}
