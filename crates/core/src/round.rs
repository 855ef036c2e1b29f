use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The phase a game is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Waiting for the player's name.
    Intro,
    /// Rounds are being played.
    Playing,
    /// The final round has been scored. Terminal.
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Intro => write!(f, "intro"),
            Phase::Playing => write!(f, "playing"),
            Phase::Done => write!(f, "done"),
        }
    }
}

/// One improv round: the scenario handed to the player and the host's
/// reaction once the scene has ended.
///
/// The scenario is fixed at creation and the reaction can be written once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Round {
    scenario: String,
    reaction: Option<String>,
}

impl Round {
    /// Creates a new round that has not been reacted to yet.
    pub fn new(scenario: String) -> Self {
        Self {
            scenario,
            reaction: None,
        }
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn reaction(&self) -> Option<&str> {
        self.reaction.as_deref()
    }

    /// Checks if the host has already reacted to this round.
    pub fn is_complete(&self) -> bool {
        self.reaction.is_some()
    }

    /// Stores the host's reaction. Returns `false` and leaves the round
    /// untouched if a reaction was already recorded.
    pub(crate) fn record_reaction(&mut self, reaction: String) -> bool {
        if self.reaction.is_some() {
            return false;
        }
        self.reaction = Some(reaction);
        true
    }
}
