//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for session management.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use improv_core::{ImprovError, SessionController};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    models::{
        CreateSessionPayload, ErrorResponse, GameView, MessageRole, Session,
        UpdateSessionStatusPayload,
    },
    state::AppState,
};

/// The host's first line when the player's name is not known yet.
pub const ASK_NAME_GREETING: &str =
    "Welcome to Improv Battle! I'm your host. What's your name, contestant?";

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

fn require_user_id(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("x-user-id header is required".to_string()))
}

/// Produces the host's opening line for a new game.
///
/// A known player name starts round 1 immediately; a blank one is treated as
/// unknown so the host asks for it instead.
pub fn opening_line(
    controller: &mut SessionController,
    player_name: Option<&str>,
) -> Result<String, ImprovError> {
    let Some(name) = player_name else {
        return Ok(ASK_NAME_GREETING.to_string());
    };
    match controller.begin(name) {
        Ok(scenario) => Ok(format!(
            "Welcome to Improv Battle, {}! I'm your host. I'll give you a scenario, you act it out, and when you're done say 'End scene' and I'll judge you. Round 1: {}",
            name.trim(),
            scenario
        )),
        Err(ImprovError::EmptyInput) => Ok(ASK_NAME_GREETING.to_string()),
        Err(e) => Err(e),
    }
}

/// Create a new Improv Battle game.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionPayload,
    responses(
        (status = 201, description = "Session created successfully", body = Session),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user creating the session")
    )
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user_id(&headers)?;

    let mut controller = state.new_game().await?;
    let greeting = opening_line(&mut controller, payload.player_name.as_deref())?;

    let session = state.db.create_session(user_id, &controller).await?;
    state
        .db
        .add_message(session.id, MessageRole::Ai, &greeting)
        .await?;

    info!(session_id = %session.id, phase = %controller.phase(), "Game created");
    Ok((StatusCode::CREATED, Json(session)))
}

/// List all sessions for a user.
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "List of sessions", body = [Session]),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Session>>, ApiError> {
    let user_id = require_user_id(&headers)?;
    let sessions = state.db.list_sessions(user_id).await?;
    Ok(Json(sessions))
}

/// Get a specific session by its ID.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    responses(
        (status = 200, description = "Session details", body = Session),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user_id(&headers)?;

    let session = state
        .db
        .get_session(id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{}' not found", id)))?;

    Ok((StatusCode::OK, Json(session)))
}

/// Get the current state of a session's game.
#[utoipa::path(
    get,
    path = "/sessions/{id}/game",
    responses(
        (status = 200, description = "Game state", body = GameView),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn get_game(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<GameView>, ApiError> {
    let user_id = require_user_id(&headers)?;

    state
        .db
        .get_session(id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{}' not found", id)))?;

    let controller = state
        .db
        .get_latest_game_state(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No game state for session '{}'", id)))?;

    Ok(Json(GameView::from(&controller)))
}

/// Update the status of a session.
#[utoipa::path(
    patch,
    path = "/sessions/{id}/status",
    request_body = UpdateSessionStatusPayload,
    responses(
        (status = 200, description = "Session status updated successfully", body = Session),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        ("x-user-id" = String, Header, description = "The ID of the user")
    )
)]
pub async fn update_session_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSessionStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user_id(&headers)?;

    // First, ensure the session exists and belongs to the user.
    let _ = state
        .db
        .get_session(id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{}' not found", id)))?;

    let updated_session = state.db.update_session_status(id, payload.status).await?;

    Ok((StatusCode::OK, Json(updated_session)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use improv_core::{Phase, scenario::ScenarioOrder};

    fn controller() -> SessionController {
        SessionController::from_scenarios(["S1", "S2", "S3"], 3, ScenarioOrder::Sequential)
            .unwrap()
    }

    #[test]
    fn test_opening_line_without_name_asks_for_it() {
        let mut c = controller();
        assert_eq!(opening_line(&mut c, None).unwrap(), ASK_NAME_GREETING);
        assert_eq!(c.phase(), Phase::Intro);
    }

    #[test]
    fn test_opening_line_with_name_starts_round_one() {
        let mut c = controller();
        let line = opening_line(&mut c, Some(" Alex ")).unwrap();
        assert!(line.starts_with("Welcome to Improv Battle, Alex!"));
        assert!(line.ends_with("Round 1: S1"));
        assert_eq!(c.phase(), Phase::Playing);
    }

    #[test]
    fn test_opening_line_with_blank_name_falls_back() {
        let mut c = controller();
        assert_eq!(opening_line(&mut c, Some("  ")).unwrap(), ASK_NAME_GREETING);
        assert_eq!(c.phase(), Phase::Intro);
    }

    #[test]
    fn test_opening_line_on_started_game_is_an_error() {
        let mut c = controller();
        c.begin("Alex").unwrap();
        let err = opening_line(&mut c, Some("Jordan")).unwrap_err();
        assert!(matches!(err, ImprovError::InvalidTransition { .. }));
    }
}
