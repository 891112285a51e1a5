/// Per-connection message sequencing. The service stamps every frame with
/// its `serverId` and a counter that increases by exactly one per frame; a
/// hole or a different server id means frames were lost (or the service
/// restarted) and the in-memory view can no longer be trusted.
///
/// The state is an explicit value owned by the store and threaded through
/// calls, never an ambient field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SequenceState {
    #[default]
    Untracked,
    Tracking {
        server_id: String,
        last_message_no: u64,
    },
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SequenceViolation {
    #[error("no message sequence tracked yet")]
    Untracked,
    #[error("server id changed (old: {tracked}, new: {received})")]
    ServerChanged { tracked: String, received: String },
    #[error("message out of sequence (old: {tracked}, new: {received})")]
    OutOfSequence { tracked: u64, received: u64 },
}

impl SequenceState {
    /// Unconditionally adopt the message's connection identity. The
    /// triggering message counts as consumed: the caller applies it right
    /// after reseeding, so the counter starts at its `message_no`.
    pub fn initialize(&mut self, server_id: &str, message_no: u64) {
        *self = SequenceState::Tracking {
            server_id: server_id.to_string(),
            last_message_no: message_no,
        };
    }

    /// Check a message against the tracked counter without mutating state.
    pub fn validate(&self, server_id: &str, message_no: u64) -> Result<(), SequenceViolation> {
        match self {
            SequenceState::Untracked => Err(SequenceViolation::Untracked),
            SequenceState::Tracking {
                server_id: tracked_server,
                last_message_no,
            } => {
                if tracked_server != server_id {
                    return Err(SequenceViolation::ServerChanged {
                        tracked: tracked_server.clone(),
                        received: server_id.to_string(),
                    });
                }
                if message_no != last_message_no + 1 {
                    return Err(SequenceViolation::OutOfSequence {
                        tracked: *last_message_no,
                        received: message_no,
                    });
                }
                Ok(())
            }
        }
    }

    /// Record a message that passed validation.
    pub fn advance(&mut self, message_no: u64) {
        if let SequenceState::Tracking {
            last_message_no, ..
        } = self
        {
            *last_message_no = message_no;
        }
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self, SequenceState::Tracking { .. })
    }

    pub fn reset(&mut self) {
        *self = SequenceState::Untracked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_sequence_validates() {
        let mut seq = SequenceState::default();
        seq.initialize("srv-a", 5);
        assert!(seq.validate("srv-a", 6).is_ok());
        seq.advance(6);
        assert!(seq.validate("srv-a", 7).is_ok());
    }

    #[test]
    fn gap_is_rejected() {
        let mut seq = SequenceState::default();
        seq.initialize("srv-a", 5);
        assert_eq!(
            seq.validate("srv-a", 7),
            Err(SequenceViolation::OutOfSequence {
                tracked: 5,
                received: 7
            })
        );
    }

    #[test]
    fn replay_is_rejected() {
        let mut seq = SequenceState::default();
        seq.initialize("srv-a", 5);
        assert!(seq.validate("srv-a", 5).is_err());
    }

    #[test]
    fn server_change_is_rejected_regardless_of_counter() {
        let mut seq = SequenceState::default();
        seq.initialize("srv-a", 5);
        assert_eq!(
            seq.validate("srv-b", 6),
            Err(SequenceViolation::ServerChanged {
                tracked: "srv-a".to_string(),
                received: "srv-b".to_string()
            })
        );
    }

    #[test]
    fn untracked_state_never_validates() {
        let seq = SequenceState::default();
        assert_eq!(seq.validate("srv-a", 1), Err(SequenceViolation::Untracked));
    }

    #[test]
    fn validate_does_not_mutate() {
        let mut seq = SequenceState::default();
        seq.initialize("srv-a", 5);
        let before = seq.clone();
        let _ = seq.validate("srv-a", 6);
        let _ = seq.validate("srv-a", 9);
        assert_eq!(seq, before);
    }
}
