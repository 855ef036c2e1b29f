use crate::round::Phase;

/// Errors raised by the session controller and scenario pool.
///
/// None of these are retried internally. The caller decides whether to
/// re-prompt the player, ignore a stray event, or abort the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImprovError {
    /// An operation was invoked in a phase that does not permit it.
    #[error("cannot {operation} while the game is in the '{phase}' phase")]
    InvalidTransition {
        operation: &'static str,
        phase: Phase,
    },
    /// The player's name was empty or only whitespace.
    #[error("player name must not be empty")]
    EmptyInput,
    /// The scenario pool cannot cover a full game.
    #[error("scenario pool of {pool_size} cannot cover {max_rounds} rounds")]
    Configuration { pool_size: usize, max_rounds: usize },
}

impl ImprovError {
    /// True when the error is the "session complete" signal: any input
    /// arriving after the final round has been scored.
    pub fn is_session_complete(&self) -> bool {
        matches!(
            self,
            ImprovError::InvalidTransition {
                phase: Phase::Done,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ImprovError::InvalidTransition {
            operation: "end_round",
            phase: Phase::Intro,
        };
        assert_eq!(
            err.to_string(),
            "cannot end_round while the game is in the 'intro' phase"
        );
        assert_eq!(
            ImprovError::Configuration {
                pool_size: 2,
                max_rounds: 3
            }
            .to_string(),
            "scenario pool of 2 cannot cover 3 rounds"
        );
    }

    #[test]
    fn test_session_complete_signal() {
        let done = ImprovError::InvalidTransition {
            operation: "end_round",
            phase: Phase::Done,
        };
        let early = ImprovError::InvalidTransition {
            operation: "end_round",
            phase: Phase::Intro,
        };
        assert!(done.is_session_complete());
        assert!(!early.is_session_complete());
        assert!(!ImprovError::EmptyInput.is_session_complete());
    }
}
