//! Improv Host Tool Service
//!
//! This module exposes the session controller to the language model as a set
//! of Model Context Protocol (MCP) tools. The model voices the host; the tools
//! are the only way it can move the game forward, so the rules of the show
//! are enforced here rather than in the prompt.

use crate::session::{RoundOutcome, SessionController};
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

// --- Data Structures for Tools ---

/// Arguments for capturing the player's name.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct SetPlayerNameArgs {
    /// The name the player introduced themselves with.
    #[schemars(description = "The name of the player")]
    pub name: String,
}

/// Arguments for scoring the round that just ended.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct RecordRoundReactionArgs {
    /// The feedback the host has just spoken about the player's scene.
    #[schemars(description = "Your feedback/reaction to the player's performance")]
    pub reaction: String,
}

// --- Service and Handler Implementation ---

/// The tool server for one player's game.
pub struct ImprovHostService {
    /// The player's game, shared with the conversation loop.
    pub controller: Arc<Mutex<SessionController>>,
    /// Optional channel that receives a snapshot after every change.
    pub state_tx: Option<mpsc::Sender<SessionController>>,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for ImprovHostService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl ImprovHostService {
    pub fn new(
        controller: Arc<Mutex<SessionController>>,
        state_tx: Option<mpsc::Sender<SessionController>>,
    ) -> Self {
        Self {
            controller,
            state_tx,
            tool_router: Self::tool_router(),
        }
    }

    /// Returns the whole session record as JSON.
    #[tool(
        description = "Get the current state of the game: phase, round, player name and every round played so far."
    )]
    pub async fn get_game_status(&self) -> Result<String, String> {
        info!("Executing tool 'get_game_status'");
        let controller = self.controller.lock().await;
        serde_json::to_string(controller.session())
            .map_err(|e| format!("Failed to serialize game state: {}", e))
    }

    /// Captures the player's name and deals round 1.
    #[tool(
        description = "Call this when the player tells you their name. Starts the game and returns the scenario for round 1."
    )]
    pub async fn set_player_name(
        &self,
        args: Parameters<SetPlayerNameArgs>,
    ) -> Result<String, String> {
        info!(name = %args.0.name, "Executing tool 'set_player_name'");
        let mut controller = self.controller.lock().await;
        let scenario = controller.begin(&args.0.name).map_err(|e| e.to_string())?;
        self.broadcast(&controller).await;
        Ok(format!(
            "Player name set to {}. Game started! Explain the rules, then give them the scenario for Round 1: {}",
            args.0.name.trim(),
            scenario
        ))
    }

    /// Scores the current round and advances the game.
    #[tool(
        description = "Call this AFTER you have spoken your reaction to the player's scene. Returns the next scenario, or GAME_OVER with a summary to wrap up with."
    )]
    pub async fn record_round_reaction(
        &self,
        args: Parameters<RecordRoundReactionArgs>,
    ) -> Result<String, String> {
        info!("Executing tool 'record_round_reaction'");
        let mut controller = self.controller.lock().await;
        let outcome = controller.end_round(&args.0.reaction).map_err(|e| {
            if e.is_session_complete() {
                format!("GAME_OVER. {}", e)
            } else {
                e.to_string()
            }
        })?;
        self.broadcast(&controller).await;

        Ok(match outcome {
            RoundOutcome::NextRound { round, scenario } => {
                format!("Reaction recorded. Scenario for Round {}: {}", round, scenario)
            }
            RoundOutcome::Finished { summary } => format!(
                "GAME_OVER. Give the player a final summary of their performance, thank them and say goodbye.\n{}",
                summary
            ),
        })
    }

    /// Lets the model acknowledge that the player asked to stop.
    #[tool(description = "Ends the show early when the player asks to stop or quit.")]
    pub async fn end_show(&self) -> Result<String, String> {
        info!("Executing tool 'end_show'");
        // Ending the session itself is handled by the conversation loop.
        Ok("OK. The show will be concluded.".to_string())
    }
}

impl ImprovHostService {
    async fn broadcast(&self, controller: &SessionController) {
        if let Some(tx) = &self.state_tx {
            if tx.send(controller.clone()).await.is_err() {
                warn!("Failed to broadcast state update: receiver dropped.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{round::Phase, scenario::ScenarioOrder};

    fn service(
        state_tx: Option<mpsc::Sender<SessionController>>,
    ) -> (ImprovHostService, Arc<Mutex<SessionController>>) {
        let controller = SessionController::from_scenarios(
            ["S1", "S2", "S3"],
            3,
            ScenarioOrder::Sequential,
        )
        .unwrap();
        let shared = Arc::new(Mutex::new(controller));
        (ImprovHostService::new(shared.clone(), state_tx), shared)
    }

    fn reaction(text: &str) -> Parameters<RecordRoundReactionArgs> {
        Parameters(RecordRoundReactionArgs {
            reaction: text.to_string(),
        })
    }

    #[tokio::test]
    async fn test_tools_drive_a_full_game() {
        let (tx, mut rx) = mpsc::channel(8);
        let (service, shared) = service(Some(tx));

        let started = service
            .set_player_name(Parameters(SetPlayerNameArgs {
                name: "Alex".to_string(),
            }))
            .await
            .unwrap();
        assert!(started.contains("Round 1: S1"));
        assert_eq!(rx.recv().await.unwrap().phase(), Phase::Playing);

        let next = service.record_round_reaction(reaction("r1")).await.unwrap();
        assert_eq!(next, "Reaction recorded. Scenario for Round 2: S2");
        service.record_round_reaction(reaction("r2")).await.unwrap();
        let last = service.record_round_reaction(reaction("r3")).await.unwrap();
        assert!(last.starts_with("GAME_OVER"));
        assert!(last.contains("Alex"));

        // One snapshot per mutation.
        for _ in 0..2 {
            rx.recv().await.unwrap();
        }
        assert_eq!(rx.recv().await.unwrap().phase(), Phase::Done);
        assert_eq!(shared.lock().await.phase(), Phase::Done);

        let status: serde_json::Value =
            serde_json::from_str(&service.get_game_status().await.unwrap()).unwrap();
        assert_eq!(status["phase"], "done");
        assert_eq!(status["rounds"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_tool_errors_are_reported() {
        let (service, _) = service(None);

        let err = service.record_round_reaction(reaction("early")).await.unwrap_err();
        assert!(err.contains("intro"));

        let err = service
            .set_player_name(Parameters(SetPlayerNameArgs {
                name: " ".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err, "player name must not be empty");
    }

    #[tokio::test]
    async fn test_reaction_after_game_over_signals_completion() {
        let (service, shared) = service(None);
        shared.lock().await.begin("Alex").unwrap();
        for r in ["r1", "r2", "r3"] {
            service.record_round_reaction(reaction(r)).await.unwrap();
        }

        let err = service.record_round_reaction(reaction("encore")).await.unwrap_err();
        assert!(err.starts_with("GAME_OVER"));
        assert_eq!(shared.lock().await.session().rounds().len(), 3);
    }

    #[tokio::test]
    async fn test_end_show_acknowledges() {
        let (service, _) = service(None);
        assert_eq!(
            service.end_show().await.unwrap(),
            "OK. The show will be concluded."
        );
    }
}
