//! API and Database Models
//!
//! This module defines the core data structures used for both database mapping
//! with `sqlx` and for generating OpenAPI documentation with `utoipa`.

use chrono::{DateTime, Utc};
use improv_core::{Phase, SessionController};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(sqlx::Type, Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq)]
#[sqlx(type_name = "session_status", rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

#[derive(sqlx::Type, Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq)]
#[sqlx(type_name = "message_role", rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Ai,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Ai => write!(f, "ai"),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct Session {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub user_id: String,
    #[schema(example = "Alex")]
    pub player_name: Option<String>,
    #[schema(value_type = String, example = "active")]
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct Message {
    pub id: i64,
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
    #[schema(value_type = String, example = "user")]
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct CreateSessionPayload {
    /// Starts round 1 straight away when the player's name is already known.
    #[schema(example = "Alex")]
    pub player_name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateSessionStatusPayload {
    #[schema(example = "Ended")]
    pub status: SessionStatus,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct RoundView {
    pub number: usize,
    pub scenario: String,
    pub reaction: Option<String>,
}

/// The state of a game as shown to API clients.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct GameView {
    #[schema(value_type = String, example = "playing")]
    pub phase: Phase,
    pub player_name: Option<String>,
    pub current_round: usize,
    pub max_rounds: usize,
    pub rounds: Vec<RoundView>,
    /// Present once the final round has been scored.
    pub summary: Option<String>,
}

impl From<&SessionController> for GameView {
    fn from(controller: &SessionController) -> Self {
        let session = controller.session();
        Self {
            phase: session.phase(),
            player_name: session.player_name().map(str::to_string),
            current_round: session.current_round(),
            max_rounds: session.max_rounds(),
            rounds: session
                .rounds()
                .iter()
                .enumerate()
                .map(|(i, round)| RoundView {
                    number: i + 1,
                    scenario: round.scenario().to_string(),
                    reaction: round.reaction().map(str::to_string),
                })
                .collect(),
            summary: controller.summary(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use improv_core::scenario::ScenarioOrder;

    fn session(player_name: Option<&str>, status: SessionStatus) -> Session {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        Session {
            id: Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
            user_id: "test_user_123".to_string(),
            player_name: player_name.map(str::to_string),
            status,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_session_status_serialization() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Active).unwrap(),
            "\"Active\""
        );
        let ended: SessionStatus = serde_json::from_str("\"Ended\"").unwrap();
        assert_eq!(ended, SessionStatus::Ended);
        assert!(serde_json::from_str::<SessionStatus>("\"Paused\"").is_err());
    }

    #[test]
    fn test_message_role_display() {
        assert_eq!(format!("{}", MessageRole::User), "user");
        assert_eq!(format!("{}", MessageRole::Ai), "ai");
    }

    #[test]
    fn test_session_serialization() {
        let session = session(Some("Alex"), SessionStatus::Active);

        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"player_name\":\"Alex\""));
        assert!(json.contains("test_user_123"));

        let deserialized: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.id, session.id);
        assert_eq!(deserialized.player_name, session.player_name);
        assert_eq!(deserialized.created_at, session.created_at);
    }

    #[test]
    fn test_create_session_payload_name_is_optional() {
        let payload: CreateSessionPayload = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(payload.player_name, None);

        let payload: CreateSessionPayload =
            serde_json::from_str(r#"{"player_name": "Alex"}"#).unwrap();
        assert_eq!(payload.player_name.as_deref(), Some("Alex"));
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Session not found".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"Session not found"}"#);
    }

    #[test]
    fn test_game_view_tracks_progress() {
        let mut controller =
            SessionController::from_scenarios(["S1", "S2", "S3"], 3, ScenarioOrder::Sequential)
                .unwrap();

        let view = GameView::from(&controller);
        assert_eq!(view.phase, Phase::Intro);
        assert!(view.rounds.is_empty());

        controller.begin("Alex").unwrap();
        controller.end_round("Bold choice.").unwrap();
        let view = GameView::from(&controller);
        assert_eq!(view.phase, Phase::Playing);
        assert_eq!(serde_json::to_value(&view).unwrap()["phase"], "playing");
        assert_eq!(view.current_round, 2);
        assert_eq!(
            view.rounds[0],
            RoundView {
                number: 1,
                scenario: "S1".to_string(),
                reaction: Some("Bold choice.".to_string()),
            }
        );
        assert_eq!(view.rounds[1].reaction, None);
        assert_eq!(view.summary, None);

        controller.end_round("Great.").unwrap();
        controller.end_round("Legendary.").unwrap();
        let view = GameView::from(&controller);
        assert_eq!(view.phase, Phase::Done);
        assert!(view.summary.unwrap().contains("Legendary."));
    }
}
