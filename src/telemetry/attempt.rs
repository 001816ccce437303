use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire value of the suppressed attempt identifier.
pub const DO_NOT_TRACK: &str = "do-not-track";

/// A settled attempt identifier. "Not yet resolved" is expressed as `None`
/// by the accessors, never as a variant here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttemptIdentifier {
    Resolved(String),
    /// Tracking is intentionally off for this session.
    Suppressed,
}

impl AttemptIdentifier {
    pub fn as_str(&self) -> &str {
        match self {
            AttemptIdentifier::Resolved(id) => id,
            AttemptIdentifier::Suppressed => DO_NOT_TRACK,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, AttemptIdentifier::Suppressed)
    }
}

impl fmt::Display for AttemptIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-provider correlation lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    HandshakePending,
    Tracking(String),
    /// Terminal for the lifetime of the provider.
    Suppressed,
    HandshakeFailed,
}

impl SessionState {
    pub fn attempt_identifier(&self) -> Option<AttemptIdentifier> {
        match self {
            SessionState::Tracking(id) => Some(AttemptIdentifier::Resolved(id.clone())),
            SessionState::Suppressed => Some(AttemptIdentifier::Suppressed),
            _ => None,
        }
    }

    /// Flushing is only permitted while tracking with a real identifier.
    pub fn flush_target(&self) -> Option<&str> {
        match self {
            SessionState::Tracking(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SessionState::HandshakePending)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::HandshakePending => "handshake_pending",
            SessionState::Tracking(_) => "tracking",
            SessionState::Suppressed => "suppressed",
            SessionState::HandshakeFailed => "handshake_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRequest {
    /// Configuration forbids tracking.
    Suppress,
    BeginHandshake,
    HandshakeSucceeded(String),
    HandshakeFailed,
}

pub struct SessionGraph;

impl SessionGraph {
    /// (current, request) -> next. `None` means the request is ignored.
    pub fn transition(current: &SessionState, request: SessionRequest) -> Option<SessionState> {
        use SessionRequest as R;
        use SessionState as S;

        match (current, request) {
            (S::Uninitialized | S::HandshakeFailed, R::Suppress) => Some(S::Suppressed),

            (S::Uninitialized | S::HandshakeFailed, R::BeginHandshake) => Some(S::HandshakePending),

            (S::HandshakePending, R::HandshakeSucceeded(id)) => Some(S::Tracking(id)),
            (S::HandshakePending, R::HandshakeFailed) => Some(S::HandshakeFailed),

            // Suppressed is terminal, Tracking keeps its identifier, and a
            // pending handshake absorbs repeated begin requests.
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_tracking() {
        let pending = SessionGraph::transition(&SessionState::Uninitialized, SessionRequest::BeginHandshake).unwrap();
        assert_eq!(pending, SessionState::HandshakePending);

        let tracking =
            SessionGraph::transition(&pending, SessionRequest::HandshakeSucceeded("abc123".into())).unwrap();
        assert_eq!(tracking.flush_target(), Some("abc123"));
        assert_eq!(
            tracking.attempt_identifier(),
            Some(AttemptIdentifier::Resolved("abc123".into()))
        );
    }

    #[test]
    fn failure_allows_retry() {
        let failed =
            SessionGraph::transition(&SessionState::HandshakePending, SessionRequest::HandshakeFailed).unwrap();
        assert_eq!(failed, SessionState::HandshakeFailed);
        assert_eq!(failed.attempt_identifier(), None);

        let retry = SessionGraph::transition(&failed, SessionRequest::BeginHandshake);
        assert_eq!(retry, Some(SessionState::HandshakePending));
    }

    #[test]
    fn suppressed_is_terminal() {
        let suppressed = SessionGraph::transition(&SessionState::Uninitialized, SessionRequest::Suppress).unwrap();
        assert_eq!(suppressed.attempt_identifier(), Some(AttemptIdentifier::Suppressed));
        assert_eq!(suppressed.flush_target(), None);

        for request in [
            SessionRequest::BeginHandshake,
            SessionRequest::HandshakeSucceeded("late".into()),
            SessionRequest::HandshakeFailed,
            SessionRequest::Suppress,
        ] {
            assert!(SessionGraph::transition(&suppressed, request).is_none());
        }
    }

    #[test]
    fn pending_ignores_second_begin() {
        assert!(SessionGraph::transition(&SessionState::HandshakePending, SessionRequest::BeginHandshake).is_none());
    }

    #[test]
    fn stray_results_are_ignored_outside_pending() {
        assert!(
            SessionGraph::transition(&SessionState::Uninitialized, SessionRequest::HandshakeSucceeded("x".into()))
                .is_none()
        );
        assert!(SessionGraph::transition(&SessionState::Tracking("a".into()), SessionRequest::HandshakeFailed).is_none());
    }

    #[test]
    fn sentinel_renders_as_do_not_track() {
        assert_eq!(AttemptIdentifier::Suppressed.to_string(), DO_NOT_TRACK);
        assert!(AttemptIdentifier::Suppressed.is_suppressed());
    }
}
