//! Who is signed in, and how far through onboarding they are

use crate::access_gate::AccessFlags;
use serde::Serialize;

/// Identity of the signed-in user plus onboarding progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub profile_complete: bool,
    pub persona_selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", content = "user", rename_all = "snake_case")]
pub enum SessionStatus {
    /// A saved credential is being checked
    #[default]
    Loading,
    SignedOut,
    SignedIn(User),
}

/// Session state machine. Holds no credential; that lives with the
/// backend client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStore {
    status: SessionStatus,
}

impl SessionStore {
    /// Starts in `Loading`, as on app start
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn user(&self) -> Option<&User> {
        match &self.status {
            SessionStatus::SignedIn(user) => Some(user),
            SessionStatus::Loading | SessionStatus::SignedOut => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == SessionStatus::Loading
    }

    pub fn begin_restore(&mut self) {
        self.status = SessionStatus::Loading;
    }

    pub fn restore_succeeded(&mut self, user: User) {
        self.signed_in(user);
    }

    pub fn restore_failed(&mut self) {
        self.sign_out();
    }

    pub fn signed_in(&mut self, user: User) {
        self.status = SessionStatus::SignedIn(user);
    }

    /// Returns false when nobody is signed in
    pub fn mark_profile_complete(&mut self) -> bool {
        match &mut self.status {
            SessionStatus::SignedIn(user) => {
                user.profile_complete = true;
                true
            }
            SessionStatus::Loading | SessionStatus::SignedOut => false,
        }
    }

    /// Returns false when nobody is signed in
    pub fn mark_persona_selected(&mut self) -> bool {
        match &mut self.status {
            SessionStatus::SignedIn(user) => {
                user.persona_selected = true;
                true
            }
            SessionStatus::Loading | SessionStatus::SignedOut => false,
        }
    }

    pub fn sign_out(&mut self) {
        self.status = SessionStatus::SignedOut;
    }

    /// Flags for the access gate; `None` while the session is loading
    pub fn access_flags(&self) -> Option<AccessFlags> {
        match &self.status {
            SessionStatus::Loading => None,
            SessionStatus::SignedOut => Some(AccessFlags::SIGNED_OUT),
            SessionStatus::SignedIn(user) => Some(AccessFlags::new(
                true,
                user.profile_complete,
                user.persona_selected,
            )),
        }
    }
}
