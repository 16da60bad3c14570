//! Session state and lifecycle phase

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokenrelay_domain::impl_domain_enum_conversions;

/// Where the session stands in its authentication lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
    RefreshingToken,
    /// A call used up its attempt budget while recovering
    LockedOut,
}

impl_domain_enum_conversions!(AuthPhase {
    Unauthenticated => "unauthenticated",
    Authenticating => "authenticating",
    Authenticated => "authenticated",
    RefreshingToken => "refreshing_token",
    LockedOut => "locked_out",
});

/// Token and bookkeeping owned by one auth session.
///
/// An empty access token means unauthenticated.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    access_token: String,
    last_auth_attempt: Option<DateTime<Utc>>,
    last_refresh_attempt: Option<DateTime<Utc>>,
    phase: AuthPhase,
}

impl SessionState {
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.access_token.is_empty()
    }

    #[must_use]
    pub const fn last_auth_attempt(&self) -> Option<DateTime<Utc>> {
        self.last_auth_attempt
    }

    #[must_use]
    pub const fn last_refresh_attempt(&self) -> Option<DateTime<Utc>> {
        self.last_refresh_attempt
    }

    #[must_use]
    pub const fn phase(&self) -> AuthPhase {
        self.phase
    }

    pub(crate) fn begin_authentication(&mut self) {
        self.last_auth_attempt = Some(Utc::now());
        self.phase = AuthPhase::Authenticating;
    }

    pub(crate) fn begin_refresh(&mut self) {
        self.last_refresh_attempt = Some(Utc::now());
        self.phase = AuthPhase::RefreshingToken;
    }

    pub(crate) fn set_token(&mut self, token: String) {
        self.access_token = token;
        self.phase = AuthPhase::Authenticated;
    }

    pub(crate) fn clear_token(&mut self) {
        self.access_token.clear();
        self.phase = AuthPhase::Unauthenticated;
    }

    /// Return to the phase implied by the token after a failed attempt.
    pub(crate) fn settle(&mut self) {
        self.phase = if self.is_authenticated() {
            AuthPhase::Authenticated
        } else {
            AuthPhase::Unauthenticated
        };
    }

    pub(crate) fn lock_out(&mut self) {
        self.phase = AuthPhase::LockedOut;
    }

    /// A lock-out lasts until the next call that goes through.
    pub(crate) fn lift_lock_out(&mut self) {
        if self.phase == AuthPhase::LockedOut {
            self.settle();
        }
    }

    /// Back to the state of a freshly constructed session.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("authenticated", &self.is_authenticated())
            .field("last_auth_attempt", &self.last_auth_attempt)
            .field("last_refresh_attempt", &self.last_refresh_attempt)
            .field("phase", &self.phase)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_unauthenticated() {
        let state = SessionState::default();

        assert!(!state.is_authenticated());
        assert_eq!(state.phase(), AuthPhase::Unauthenticated);
        assert!(state.last_auth_attempt().is_none());
    }

    #[test]
    fn lifting_a_lock_out_leaves_other_phases_alone() {
        let mut state = SessionState::default();
        state.set_token("abc".to_string());
        state.lock_out();
        state.lift_lock_out();
        assert_eq!(state.phase(), AuthPhase::Authenticated);

        state.begin_refresh();
        state.lift_lock_out();
        assert_eq!(state.phase(), AuthPhase::RefreshingToken);
    }

    #[test]
    fn settle_follows_the_token() {
        let mut state = SessionState::default();
        state.begin_refresh();
        state.settle();
        assert_eq!(state.phase(), AuthPhase::Unauthenticated);

        state.set_token("abc".to_string());
        state.begin_authentication();
        state.settle();
        assert_eq!(state.phase(), AuthPhase::Authenticated);
    }

    #[test]
    fn reset_clears_token_and_timestamps() {
        let mut state = SessionState::default();
        state.begin_authentication();
        state.begin_refresh();
        state.set_token("abc".to_string());

        state.reset();

        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn debug_hides_the_token() {
        let mut state = SessionState::default();
        state.set_token("secret-token".to_string());

        assert!(!format!("{state:?}").contains("secret-token"));
    }

    #[test]
    fn phase_parses_from_text() {
        assert_eq!("Locked_Out".parse::<AuthPhase>().unwrap(), AuthPhase::LockedOut);
        assert_eq!(AuthPhase::RefreshingToken.to_string(), "refreshing_token");
    }
}
