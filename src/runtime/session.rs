//! Session runtime: sign-in, restore and onboarding against the backend

use super::traits::AuthBackend;
use super::{Outcome, SkipReason, ViewEvent, VIEW_EVENT_CAPACITY};
use crate::access_gate::{resolve, AccessFlags, Screen};
use crate::api::{ApiError, AuthGrant, Credentials, ProfileDetails, Registration};
use crate::session::{SessionStatus, SessionStore, User};
use tokio::sync::{broadcast, Mutex};

/// Drives a `SessionStore` from backend results.
///
/// Any `Unauthorized` response signs the session out.
pub struct SessionRuntime<A: AuthBackend> {
    backend: A,
    store: Mutex<SessionStore>,
    events: broadcast::Sender<ViewEvent>,
}

impl<A: AuthBackend> SessionRuntime<A> {
    pub fn new(backend: A) -> Self {
        let (events, _) = broadcast::channel(VIEW_EVENT_CAPACITY);
        Self {
            backend,
            store: Mutex::new(SessionStore::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    pub fn backend(&self) -> &A {
        &self.backend
    }

    pub async fn status(&self) -> SessionStatus {
        self.store.lock().await.status().clone()
    }

    pub async fn user(&self) -> Option<User> {
        self.store.lock().await.user().cloned()
    }

    pub async fn access_flags(&self) -> Option<AccessFlags> {
        self.store.lock().await.access_flags()
    }

    /// Where a navigation to `requested` lands; `None` while loading
    pub async fn landing(&self, requested: Screen) -> Option<Screen> {
        resolve(self.access_flags().await, requested)
    }

    /// Check a saved credential on startup. Any failure, including an
    /// unreachable backend, leaves the session signed out.
    pub async fn restore(&self, token: Option<String>) -> SessionStatus {
        self.update(SessionStore::begin_restore).await;

        let Some(token) = token else {
            tracing::debug!("No saved credential");
            self.update(SessionStore::restore_failed).await;
            return SessionStatus::SignedOut;
        };

        self.backend.set_token(Some(token)).await;
        match self.backend.current_user().await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "Session restored");
                self.update(|store| store.restore_succeeded(user)).await;
            }
            Err(error) => {
                tracing::warn!(error = %error, "Saved credential rejected");
                self.backend.set_token(None).await;
                self.update(SessionStore::restore_failed).await;
            }
        }
        self.status().await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User, ApiError> {
        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let grant = self.backend.login(&credentials).await;
        self.sign_in_with(grant).await
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ApiError> {
        let registration = Registration {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let grant = self.backend.register(&registration).await;
        self.sign_in_with(grant).await
    }

    pub async fn complete_profile(&self, details: &ProfileDetails) -> Result<Outcome<()>, ApiError> {
        if self.user().await.is_none() {
            return Ok(Outcome::Skipped(SkipReason::SignedOut));
        }
        if let Err(error) = self.backend.complete_profile(details).await {
            return Err(self.failed(error).await);
        }
        self.update(SessionStore::mark_profile_complete).await;
        Ok(Outcome::Done(()))
    }

    pub async fn complete_persona_selection(&self) -> Result<Outcome<()>, ApiError> {
        if self.user().await.is_none() {
            return Ok(Outcome::Skipped(SkipReason::SignedOut));
        }
        if let Err(error) = self.backend.complete_persona_selection().await {
            return Err(self.failed(error).await);
        }
        self.update(SessionStore::mark_persona_selected).await;
        Ok(Outcome::Done(()))
    }

    pub async fn logout(&self) {
        self.backend.set_token(None).await;
        self.update(SessionStore::sign_out).await;
        tracing::info!("Signed out");
    }

    /// Report an error from another runtime sharing the same credential;
    /// an expired credential signs the session out
    pub async fn observe(&self, error: &ApiError) {
        if error.is_unauthorized() && self.user().await.is_some() {
            tracing::info!("Credential expired");
            self.update(SessionStore::sign_out).await;
        }
    }

    async fn sign_in_with(&self, grant: Result<AuthGrant, ApiError>) -> Result<User, ApiError> {
        let grant = match grant {
            Ok(grant) => grant,
            Err(error) => return Err(self.failed(error).await),
        };
        self.backend.set_token(Some(grant.token)).await;

        // The credential is only kept once the account behind it is known
        let user = match self.backend.current_user().await {
            Ok(user) => user,
            Err(error) => {
                tracing::warn!(error = %error, "Account lookup after sign-in failed");
                self.backend.set_token(None).await;
                return Err(self.failed(error).await);
            }
        };
        tracing::info!(user_id = %user.id, "Signed in");
        let signed_in = user.clone();
        self.update(|store| store.signed_in(signed_in)).await;
        Ok(user)
    }

    async fn failed(&self, error: ApiError) -> ApiError {
        if error.is_unauthorized() {
            self.backend.set_token(None).await;
            self.update(SessionStore::sign_out).await;
        }
        let _ = self.events.send(ViewEvent::Error {
            message: error.to_string(),
        });
        error
    }

    /// Mutate the store and announce the new status if it changed
    async fn update<R>(&self, change: impl FnOnce(&mut SessionStore) -> R) -> R {
        let (result, before, after) = {
            let mut store = self.store.lock().await;
            let before = store.status().clone();
            let result = change(&mut store);
            (result, before, store.status().clone())
        };
        if before != after {
            let _ = self.events.send(ViewEvent::SessionChanged(after));
        }
        result
    }
}
