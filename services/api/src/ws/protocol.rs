//! Defines the WebSocket message protocol between the voice client and the API server.

use crate::models;
use improv_core::GameState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Attaches to an existing game. This must be the first message.
    #[serde(rename = "init")]
    Init {
        /// The session created through `POST /sessions`.
        session_id: Uuid,
    },
    /// Recognized speech from the player.
    #[serde(rename = "user_message")]
    UserMessage { text: String },
}

/// Messages sent from the server to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the game was attached and provides its state and conversation so far.
    Initialized {
        session_id: Uuid,
        game: GameState,
        history: Vec<models::Message>,
    },
    /// Pushes the game state after a transition.
    StateUpdate { state: GameState },
    /// The final round has been scored.
    GameOver { summary: String },
    /// Reports an error to the client.
    Error { message: String },
    /// Signals the beginning of the host's reply.
    ResponseStart,
    /// A chunk of the host's reply, to be spoken.
    ResponseChunk { chunk: String },
    /// Signals the end of the host's reply.
    ResponseEnd,
}
