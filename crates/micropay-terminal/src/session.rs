//! # Session
//!
//! The single logged-in customer, if any, and when they last did something.
//!
//! Only the token is kept. The account row (and its balance) is re-read from
//! the ledger every time it is needed, since it may have changed or been
//! removed since login.

use std::time::{Duration, Instant};

use micropay_core::CardToken;

/// Process-wide session state. Guarded by its own lock inside `Terminal`.
#[derive(Debug)]
pub struct Session {
    holder: Option<CardToken>,
    last_activity: Instant,
}

impl Session {
    /// A logged-out session.
    pub fn new() -> Self {
        Session {
            holder: None,
            last_activity: Instant::now(),
        }
    }

    pub fn holder(&self) -> Option<&CardToken> {
        self.holder.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.holder.is_some()
    }

    /// Starts a session for `token` at `now`.
    pub fn login(&mut self, token: CardToken, now: Instant) {
        self.holder = Some(token);
        self.last_activity = now;
    }

    /// Clears the holder. Returns the previous holder, if any.
    pub fn logout(&mut self) -> Option<CardToken> {
        self.holder.take()
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Time since the last activity as seen from `now` (zero if `now` is
    /// earlier than the last activity).
    pub fn idle_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// True when a holder exists and has been idle strictly longer than
    /// `timeout`.
    pub fn is_expired_at(&self, now: Instant, timeout: Duration) -> bool {
        self.is_active() && self.idle_at(now) > timeout
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            holder: self.holder.clone(),
            last_activity: self.last_activity,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the session for display and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub holder: Option<CardToken>,
    pub last_activity: Instant,
}

impl SessionSnapshot {
    pub fn is_logged_in(&self) -> bool {
        self.holder.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_is_strictly_greater_than_timeout() {
        let start = Instant::now();
        let timeout = Duration::from_secs(30);
        let mut session = Session::new();
        session.login(CardToken::from_hash("C1"), start);

        assert!(!session.is_expired_at(start + Duration::from_secs(30), timeout));
        assert!(session.is_expired_at(start + Duration::from_secs(31), timeout));
    }

    #[test]
    fn test_touch_postpones_expiry() {
        let start = Instant::now();
        let timeout = Duration::from_secs(30);
        let mut session = Session::new();
        session.login(CardToken::from_hash("C1"), start);

        session.touch(start + Duration::from_secs(20));
        assert!(!session.is_expired_at(start + Duration::from_secs(45), timeout));
        assert!(session.is_expired_at(start + Duration::from_secs(51), timeout));
    }

    #[test]
    fn test_logged_out_session_never_expires() {
        let start = Instant::now();
        let session = Session::new();
        assert!(!session.is_expired_at(start + Duration::from_secs(3600), Duration::from_secs(30)));
    }

    #[test]
    fn test_logout_is_idempotent() {
        let mut session = Session::new();
        session.login(CardToken::from_hash("C1"), Instant::now());
        assert!(session.logout().is_some());
        assert!(session.logout().is_none());
        assert!(!session.snapshot().is_logged_in());
    }
}
