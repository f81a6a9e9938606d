//! Onboarding access gate
//!
//! Pure decision over the three completion flags: which screen a user may
//! reach, or where they should be sent instead. Navigation itself is left
//! to the caller.

#[cfg(test)]
mod proptests;

use serde::{Deserialize, Serialize};

/// The screens an access decision can land on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Login,
    Register,
    ProfileCompletion,
    PersonaSelection,
    Main,
}

impl Screen {
    pub const ALL: [Screen; 5] = [
        Screen::Login,
        Screen::Register,
        Screen::ProfileCompletion,
        Screen::PersonaSelection,
        Screen::Main,
    ];

    /// Map a client route to a screen. Unknown routes fall through to main.
    pub fn from_path(path: &str) -> Self {
        let trimmed = path.split(['?', '#']).next().unwrap_or_default();
        match trimmed.trim_end_matches('/') {
            "/login" => Screen::Login,
            "/register" => Screen::Register,
            "/complete-profile" => Screen::ProfileCompletion,
            "/select-persona" => Screen::PersonaSelection,
            _ => Screen::Main,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Screen::Login => "/login",
            Screen::Register => "/register",
            Screen::ProfileCompletion => "/complete-profile",
            Screen::PersonaSelection => "/select-persona",
            Screen::Main => "/",
        }
    }

    /// Login and registration are reachable without a session
    pub fn is_public(self) -> bool {
        matches!(self, Screen::Login | Screen::Register)
    }
}

/// Snapshot of the flags the gate reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessFlags {
    pub authenticated: bool,
    pub profile_complete: bool,
    pub persona_selected: bool,
}

impl AccessFlags {
    pub const SIGNED_OUT: AccessFlags = AccessFlags {
        authenticated: false,
        profile_complete: false,
        persona_selected: false,
    };

    pub fn new(authenticated: bool, profile_complete: bool, persona_selected: bool) -> Self {
        Self {
            authenticated,
            profile_complete,
            persona_selected,
        }
    }

    /// The screen a signed-in user is expected to be on
    pub fn stage(self) -> Screen {
        if !self.authenticated {
            Screen::Login
        } else if !self.profile_complete {
            Screen::ProfileCompletion
        } else if !self.persona_selected {
            Screen::PersonaSelection
        } else {
            Screen::Main
        }
    }
}

/// Outcome of a navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Flags are still loading; render a neutral loading state
    Pending,
    Allow,
    Redirect(Screen),
}

/// Decide whether `requested` is reachable.
///
/// `flags` is `None` while the session is still loading, in which case no
/// redirect is ever produced. Rules are checked in order, first match wins.
pub fn decide(flags: Option<AccessFlags>, requested: Screen) -> GateDecision {
    let Some(flags) = flags else {
        return GateDecision::Pending;
    };

    if !flags.authenticated {
        return if requested.is_public() {
            GateDecision::Allow
        } else {
            GateDecision::Redirect(Screen::Login)
        };
    }

    if !flags.profile_complete {
        return match requested {
            Screen::ProfileCompletion => GateDecision::Allow,
            _ => GateDecision::Redirect(Screen::ProfileCompletion),
        };
    }

    match (flags.persona_selected, requested) {
        (false, Screen::PersonaSelection) | (true, Screen::Main) => GateDecision::Allow,
        (false, Screen::Main | Screen::ProfileCompletion) => {
            GateDecision::Redirect(Screen::PersonaSelection)
        }
        (true, Screen::PersonaSelection | Screen::ProfileCompletion)
        | (_, Screen::Login | Screen::Register) => GateDecision::Redirect(Screen::Main),
    }
}

/// Longest redirect chain `decide` can produce (public -> main -> persona)
const MAX_REDIRECT_HOPS: usize = 3;

/// Follow redirects from `requested` to the screen that is finally allowed.
///
/// Returns `None` while flags are loading.
pub fn resolve(flags: Option<AccessFlags>, requested: Screen) -> Option<Screen> {
    let mut current = requested;
    for _ in 0..=MAX_REDIRECT_HOPS {
        match decide(flags, current) {
            GateDecision::Pending => return None,
            GateDecision::Allow => return Some(current),
            GateDecision::Redirect(next) => current = next,
        }
    }
    tracing::warn!(?flags, ?requested, landed = ?current, "Redirect chain did not settle");
    Some(current)
}
