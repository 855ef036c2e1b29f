//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        CreateSessionPayload, ErrorResponse, GameView, Message, MessageRole, RoundView, Session,
        SessionStatus, UpdateSessionStatusPayload,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, patch},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_session,
        handlers::list_sessions,
        handlers::get_session,
        handlers::get_game,
        handlers::update_session_status,
    ),
    components(
        schemas(Session, Message, CreateSessionPayload, UpdateSessionStatusPayload, ErrorResponse, SessionStatus, MessageRole, GameView, RoundView)
    ),
    tags(
        (name = "Improv API", description = "Game management for the Improv Battle host agent")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route(
            "/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route("/sessions/{id}", get(handlers::get_session))
        .route("/sessions/{id}/game", get(handlers::get_game))
        .route(
            "/sessions/{id}/status",
            patch(handlers::update_session_status),
        )
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    // Swagger UI needs no state, so it is merged in after the stateful routes.
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
