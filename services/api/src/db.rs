//! Data Access Layer
//!
//! This module contains all the functions for interacting with the PostgreSQL database.
//! A session row, its conversation, and snapshots of its game controller are kept
//! only for the lifetime of that one game.

use anyhow::Result;
use improv_core::SessionController;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Message, MessageRole, Session, SessionStatus};

const SESSION_COLUMNS: &str = "id, user_id, player_name, status, created_at, updated_at";

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Creates a new session and its initial game snapshot in a single transaction.
    pub async fn create_session(
        &self,
        user_id: &str,
        initial_state: &SessionController,
    ) -> Result<Session> {
        let mut tx = self.pool.begin().await?;

        let session = sqlx::query_as::<_, Session>(&format!(
            "INSERT INTO sessions (user_id, player_name) VALUES ($1, $2) RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .bind(initial_state.session().player_name())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO game_states (session_id, state_json) VALUES ($1, $2)")
            .bind(session.id)
            .bind(serde_json::to_value(initial_state)?)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(session)
    }

    /// Retrieves a single session by its ID, scoped to a specific user.
    pub async fn get_session(&self, session_id: Uuid, user_id: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM sessions WHERE id = $1 AND user_id = $2",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    /// Looks up a session's status by ID alone, for callers that hold no user ID.
    pub async fn get_session_status(&self, session_id: Uuid) -> Result<Option<SessionStatus>> {
        let status =
            sqlx::query_scalar::<_, SessionStatus>("SELECT status FROM sessions WHERE id = $1")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(status)
    }

    /// Lists all sessions for a given user, ordered by most recent.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        let sessions = sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM sessions WHERE user_id = $1 ORDER BY created_at DESC",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    /// Adds a new message to a session's conversation history.
    pub async fn add_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (session_id, role, content)
            VALUES ($1, $2, $3)
            RETURNING id, session_id, role, content, created_at
            "#,
        )
        .bind(session_id)
        .bind(role)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }

    /// Retrieves the full message history for a session, ordered chronologically.
    pub async fn get_session_messages(&self, session_id: Uuid) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, session_id, role, content, created_at
            FROM messages
            WHERE session_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    /// Retrieves the most recent game snapshot for a session.
    pub async fn get_latest_game_state(
        &self,
        session_id: Uuid,
    ) -> Result<Option<SessionController>> {
        let record = sqlx::query(
            "SELECT state_json FROM game_states WHERE session_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        match record {
            Some(row) => {
                let state_json: serde_json::Value = row.try_get("state_json")?;
                Ok(Some(serde_json::from_value(state_json)?))
            }
            None => Ok(None),
        }
    }

    /// Persists a new game snapshot and mirrors the player's name onto the session.
    pub async fn update_game_state(
        &self,
        session_id: Uuid,
        state: &SessionController,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO game_states (session_id, state_json) VALUES ($1, $2)")
            .bind(session_id)
            .bind(serde_json::to_value(state)?)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE sessions SET player_name = COALESCE($1, player_name), updated_at = now() WHERE id = $2",
        )
        .bind(state.session().player_name())
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Updates the status of a session (e.g., from 'active' to 'ended').
    pub async fn update_session_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
    ) -> Result<Session> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "UPDATE sessions SET status = $1, updated_at = now() WHERE id = $2 RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(status)
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }
}
