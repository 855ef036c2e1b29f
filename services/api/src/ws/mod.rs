//! WebSocket Game Sessions
//!
//! This module contains the logic for running a live Improv Battle game over a
//! WebSocket. It is structured into submodules:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the WebSocket connection lifecycle, from handshake to termination.
//! - `cycle`: Runs one host turn: the model either answers or calls the game tools.

mod cycle;
pub mod protocol;
pub mod session;

pub use session::ws_handler;
