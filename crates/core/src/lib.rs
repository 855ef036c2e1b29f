pub mod agent;
pub mod cue;
pub mod error;
pub mod llm_client;
pub mod persona;
pub mod round;
pub mod scenario;
pub mod session;

pub use error::ImprovError;
pub use round::{Phase, Round};
pub use session::{GameState, RoundOutcome, SessionController};

/// Represents commands that the core logic issues to an external runtime.
///
/// This enum is the primary API for decoupling the game's decisions from the
/// runtime that voices them (speaking text or closing the session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Command the runtime to speak the given text to the player.
    SpeakText(String),
    /// Command indicating the game is complete, with the final summary.
    SessionComplete(String),
}

impl From<RoundOutcome> for Command {
    fn from(outcome: RoundOutcome) -> Self {
        match outcome {
            RoundOutcome::NextRound { round, scenario } => {
                Command::SpeakText(format!("Round {}! Your scenario: {}", round, scenario))
            }
            RoundOutcome::Finished { summary } => Command::SessionComplete(summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_outcome_into_command() {
        let next: Command = RoundOutcome::NextRound {
            round: 2,
            scenario: "A cat and a dog share a bed.".to_string(),
        }
        .into();
        assert_eq!(
            next,
            Command::SpeakText("Round 2! Your scenario: A cat and a dog share a bed.".to_string())
        );

        let done: Command = RoundOutcome::Finished {
            summary: "That's a wrap.".to_string(),
        }
        .into();
        assert_eq!(done, Command::SessionComplete("That's a wrap.".to_string()));
    }
}
