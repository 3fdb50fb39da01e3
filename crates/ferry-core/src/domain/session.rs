//! Remote upload session and its state machine.

use serde::{Deserialize, Serialize};

use super::errors::UploadError;

/// Opaque handle the remote returns for a resumable session.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionLocator(String);

impl SessionLocator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// the locator is a bearer-like URL, keep it out of logs
impl std::fmt::Debug for SessionLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionLocator(..)")
    }
}

/// Session state.
///
/// State transitions:
/// - Opening -> Uploading -> Completed
/// - Opening -> Completed (zero-byte file, or remote already holds everything)
/// - Uploading -> Opening (session expired, re-open and resume)
/// - any non-terminal -> Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Opening,
    Uploading,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Opening, Uploading)
                | (Opening, Completed)
                | (Uploading, Uploading)
                | (Uploading, Opening)
                | (Uploading, Completed)
                | (Opening, Failed)
                | (Uploading, Failed)
        )
    }
}

/// Local view of one remote resumable session.
///
/// `acknowledged_bytes` only moves forward and never exceeds `total_bytes`;
/// [`UploadSession::acknowledge`] is the only writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub locator: SessionLocator,
    pub total_bytes: u64,
    acknowledged_bytes: u64,
    state: SessionState,
}

impl UploadSession {
    pub fn new(locator: SessionLocator, total_bytes: u64) -> Self {
        Self {
            locator,
            total_bytes,
            acknowledged_bytes: 0,
            state: SessionState::Opening,
        }
    }

    pub fn acknowledged_bytes(&self) -> u64 {
        self.acknowledged_bytes
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes - self.acknowledged_bytes
    }

    /// Move to `next`, rejecting transitions the state machine forbids.
    pub fn transition(&mut self, next: SessionState) -> Result<(), UploadError> {
        if !self.state.can_transition_to(next) {
            return Err(UploadError::ProtocolViolation(format!(
                "illegal session transition {:?} -> {:?}",
                self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Record the remote's acknowledged offset; returns how many bytes it
    /// advanced by.
    pub fn acknowledge(&mut self, acknowledged: u64) -> Result<u64, UploadError> {
        if acknowledged < self.acknowledged_bytes {
            return Err(UploadError::ProtocolViolation(format!(
                "acknowledged offset went backwards: {} -> {}",
                self.acknowledged_bytes, acknowledged
            )));
        }
        if acknowledged > self.total_bytes {
            return Err(UploadError::ProtocolViolation(format!(
                "acknowledged offset {} exceeds total {}",
                acknowledged, self.total_bytes
            )));
        }
        let advanced = acknowledged - self.acknowledged_bytes;
        self.acknowledged_bytes = acknowledged;
        Ok(advanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(total: u64) -> UploadSession {
        UploadSession::new(SessionLocator::new("https://upload/session/1"), total)
    }

    #[test]
    fn new_session_starts_opening_with_nothing_acknowledged() {
        let s = session(10);
        assert_eq!(s.state(), SessionState::Opening);
        assert_eq!(s.acknowledged_bytes(), 0);
        assert_eq!(s.remaining_bytes(), 10);
    }

    #[test]
    fn acknowledgment_is_monotonic_and_bounded() {
        let mut s = session(10);
        assert_eq!(s.acknowledge(4).unwrap(), 4);
        assert_eq!(s.acknowledge(4).unwrap(), 0);
        assert!(matches!(s.acknowledge(3), Err(UploadError::ProtocolViolation(_))));
        assert!(matches!(s.acknowledge(11), Err(UploadError::ProtocolViolation(_))));
        assert_eq!(s.acknowledged_bytes(), 4);
        assert_eq!(s.acknowledge(10).unwrap(), 6);
    }

    #[test]
    fn expired_session_goes_back_to_opening_not_failed() {
        let mut s = session(10);
        s.transition(SessionState::Uploading).unwrap();
        s.transition(SessionState::Opening).unwrap();
        s.transition(SessionState::Uploading).unwrap();
        s.transition(SessionState::Completed).unwrap();
        assert!(s.state().is_terminal());
    }

    #[test]
    fn terminal_states_accept_no_transition() {
        let mut s = session(0);
        s.transition(SessionState::Completed).unwrap();
        assert!(s.transition(SessionState::Uploading).is_err());
        assert!(s.transition(SessionState::Failed).is_err());
    }

    #[test]
    fn locator_is_not_printed() {
        let s = session(1);
        assert!(!format!("{s:?}").contains("upload/session"));
    }
}
