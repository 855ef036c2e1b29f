//! Improv Session Controller
//!
//! This module implements the state machine that walks one player through
//! the show: an intro where the player's name is captured, a fixed number of
//! scenario rounds, and a final wrap-up. The controller performs no I/O; the
//! conversation loop feeds it events one at a time and speaks whatever text
//! it hands back.
//!
//! ```text
//! intro --begin(name)--> playing --end_round--> playing --end_round (last)--> done
//! ```

use crate::{
    error::ImprovError,
    round::{Phase, Round},
    scenario::{ScenarioOrder, ScenarioPool},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{info, warn};

/// Number of rounds in a standard game.
pub const DEFAULT_MAX_ROUNDS: usize = 3;

/// One player's game: who they are, where they are, and what happened so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ImprovSession {
    player_name: Option<String>,
    current_round: usize,
    max_rounds: usize,
    rounds: Vec<Round>,
    phase: Phase,
}

impl ImprovSession {
    fn new(max_rounds: usize) -> Self {
        Self {
            player_name: None,
            current_round: 0,
            max_rounds,
            rounds: Vec::new(),
            phase: Phase::Intro,
        }
    }

    pub fn player_name(&self) -> Option<&str> {
        self.player_name.as_deref()
    }

    pub fn current_round(&self) -> usize {
        self.current_round
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

/// A read-only view of where the game stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GameState {
    pub phase: Phase,
    pub current_round: usize,
    pub max_rounds: usize,
    pub player_name: Option<String>,
    /// The scenario being played right now, if a round is in progress.
    pub scenario: Option<String>,
}

/// What the host should say after a round ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundOutcome {
    /// Another round begins with this scenario.
    NextRound { round: usize, scenario: String },
    /// The last round was scored; wrap up with this summary.
    Finished { summary: String },
}

/// Owns the game state for one player and enforces the transition rules.
///
/// Not safe for concurrent use on its own; wrap it in a lock if more than one
/// task can reach it. Each player gets their own controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionController {
    pool: ScenarioPool,
    order: ScenarioOrder,
    /// Pool indices still to be played, dealt when the game begins.
    deck: VecDeque<usize>,
    session: ImprovSession,
}

impl SessionController {
    /// Creates a controller in the intro phase. The pool has already been
    /// validated against its `max_rounds`.
    pub fn new(pool: ScenarioPool, order: ScenarioOrder) -> Self {
        let session = ImprovSession::new(pool.max_rounds());
        Self {
            pool,
            order,
            deck: VecDeque::new(),
            session,
        }
    }

    /// Validates `scenarios` and builds a controller in one step.
    ///
    /// Fails with [`ImprovError::Configuration`] before any game state exists
    /// when the pool cannot cover `max_rounds`.
    pub fn from_scenarios<I, S>(
        scenarios: I,
        max_rounds: usize,
        order: ScenarioOrder,
    ) -> Result<Self, ImprovError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::new(ScenarioPool::new(scenarios, max_rounds)?, order))
    }

    /// Records the player's name and starts round 1.
    ///
    /// Returns the first scenario to read out.
    pub fn begin(&mut self, name: &str) -> Result<String, ImprovError> {
        self.expect_phase("begin", Phase::Intro)?;

        let name = name.trim();
        if name.is_empty() {
            warn!("Rejected empty player name");
            return Err(ImprovError::EmptyInput);
        }

        self.deck = self
            .order
            .deal(self.pool.len(), self.session.max_rounds)
            .into();
        let scenario = self.draw_scenario()?;

        self.session.player_name = Some(name.to_string());
        self.session.current_round = 1;
        self.session.rounds.push(Round::new(scenario.clone()));
        self.session.phase = Phase::Playing;

        info!(player = %name, round = 1, phase = %self.session.phase, "Game started");
        Ok(scenario)
    }

    /// Stores the host's reaction to the current round and moves on.
    ///
    /// Before the last round this deals the next scenario; after it the game
    /// is over and the final summary is returned.
    pub fn end_round(&mut self, reaction: &str) -> Result<RoundOutcome, ImprovError> {
        self.expect_phase("end_round", Phase::Playing)?;

        let finished_round = self.session.current_round;
        let is_last = finished_round >= self.session.max_rounds;

        // Deal before writing anything so a failure leaves the session untouched.
        let next = if is_last {
            None
        } else {
            Some(self.draw_scenario()?)
        };

        if let Some(round) = self.session.rounds.last_mut() {
            round.record_reaction(reaction.to_string());
        }
        info!(round = finished_round, "Round scored");

        match next {
            Some(scenario) => {
                self.session.current_round += 1;
                self.session.rounds.push(Round::new(scenario.clone()));
                info!(round = self.session.current_round, "Next round dealt");
                Ok(RoundOutcome::NextRound {
                    round: self.session.current_round,
                    scenario,
                })
            }
            None => {
                self.session.phase = Phase::Done;
                info!(
                    player = self.session.player_name().unwrap_or_default(),
                    phase = %self.session.phase,
                    "Game finished"
                );
                Ok(RoundOutcome::Finished {
                    summary: self.render_summary(),
                })
            }
        }
    }

    /// A snapshot of the phase, round counter and player name.
    pub fn current_state(&self) -> GameState {
        let scenario = match self.session.phase {
            Phase::Playing => self
                .session
                .rounds
                .last()
                .map(|round| round.scenario().to_string()),
            _ => None,
        };
        GameState {
            phase: self.session.phase,
            current_round: self.session.current_round,
            max_rounds: self.session.max_rounds,
            player_name: self.session.player_name.clone(),
            scenario,
        }
    }

    /// The full session record, rounds included.
    pub fn session(&self) -> &ImprovSession {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    /// The final summary, once the game is over.
    pub fn summary(&self) -> Option<String> {
        (self.session.phase == Phase::Done).then(|| self.render_summary())
    }

    fn expect_phase(&self, operation: &'static str, expected: Phase) -> Result<(), ImprovError> {
        if self.session.phase == expected {
            return Ok(());
        }
        warn!(operation, phase = %self.session.phase, "Rejected transition");
        Err(ImprovError::InvalidTransition {
            operation,
            phase: self.session.phase,
        })
    }

    fn draw_scenario(&mut self) -> Result<String, ImprovError> {
        // A validated pool always deals `max_rounds` indices.
        self.deck
            .pop_front()
            .and_then(|index| self.pool.get(index))
            .map(str::to_string)
            .ok_or(ImprovError::Configuration {
                pool_size: self.pool.len(),
                max_rounds: self.session.max_rounds,
            })
    }

    fn render_summary(&self) -> String {
        let name = self.session.player_name().unwrap_or("contestant");
        let mut summary = format!(
            "That's a wrap on Improv Battle, {}! Here's how your {} rounds went:",
            name,
            self.session.rounds.len()
        );
        for (i, round) in self.session.rounds.iter().enumerate() {
            summary.push_str(&format!(
                "\nRound {}: {}\nHost's take: {}",
                i + 1,
                round.scenario(),
                round.reaction().unwrap_or("(no reaction recorded)")
            ));
        }
        summary.push_str(&format!("\nThanks for playing, {}!", name));
        summary
    }
}
