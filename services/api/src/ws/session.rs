//! Manages the WebSocket connection lifecycle for a live game.

use super::{
    cycle::handle_host_turn,
    protocol::{ClientMessage, ServerMessage},
};
use crate::{
    models::{self, SessionStatus},
    state::AppState,
};
use anyhow::{Context, Result, anyhow};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use improv_core::{Command, Phase, SessionController, agent::ImprovHostService};
use rmcp::ServiceExt;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// The first message must attach the connection to an existing game; after
/// that the game loop runs in its own instrumented task.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let temp_id: u32 = rand::random();
    tracing::Span::current().record("session_id", temp_id.to_string());
    info!("New WebSocket connection. Awaiting initialization...");

    let (socket_tx, mut socket_rx) = socket.split();
    let socket_tx = Arc::new(Mutex::new(socket_tx));

    let init = match socket_rx.next().await {
        Some(Ok(Message::Text(text))) => initialize_session(&text, &state).await,
        Some(Ok(_)) => Err(anyhow!("First message was not a text `init` message.")),
        _ => {
            info!("Client disconnected before sending init message.");
            return;
        }
    };

    let (session_id, controller, history) = match init {
        Ok(init) => init,
        Err(e) => {
            error!("Session initialization failed: {:?}", e);
            let mut sink = socket_tx.lock().await;
            let _ = send_msg(
                &mut sink,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    if send_msg(
        &mut *socket_tx.lock().await,
        ServerMessage::Initialized {
            session_id,
            game: controller.current_state(),
            history: history.clone(),
        },
    )
    .await
    .is_err()
    {
        error!("Failed to send Initialized message to client.");
        return;
    }

    let session_span = tracing::info_span!("game_runtime", %session_id);
    tokio::spawn(
        async move {
            if let Err(e) =
                run_game_session(state, socket_tx, socket_rx, session_id, controller, history).await
            {
                error!(error = ?e, "Game session terminated with error.");
            }
            info!("Game session finished.");
        }
        .instrument(session_span),
    );
}

/// Parses the `init` message and loads the game and conversation from the database.
async fn initialize_session(
    init_text: &str,
    state: &Arc<AppState>,
) -> Result<(Uuid, SessionController, Vec<models::Message>)> {
    let session_id = match serde_json::from_str::<ClientMessage>(init_text)? {
        ClientMessage::Init { session_id } => session_id,
        _ => return Err(anyhow!("First message must be `init`")),
    };

    tracing::Span::current().record("session_id", session_id.to_string());
    info!("Attaching to game");

    let status = state.db.get_session_status(session_id).await?;
    ensure_attachable(session_id, status)?;

    let controller = state
        .db
        .get_latest_game_state(session_id)
        .await?
        .context("Game state not found")?;
    let history = state.db.get_session_messages(session_id).await?;
    Ok((session_id, controller, history))
}

/// Only active sessions can be played; an ended show stays ended.
fn ensure_attachable(session_id: Uuid, status: Option<SessionStatus>) -> Result<()> {
    match status {
        Some(SessionStatus::Active) => Ok(()),
        Some(SessionStatus::Ended) => Err(anyhow!("Session {} has already ended", session_id)),
        None => Err(anyhow!("Session {} not found", session_id)),
    }
}

/// The main event loop for an attached game.
///
/// Player utterances are handled one at a time; game snapshots emitted by the
/// host tools are persisted and pushed to the client as they arrive.
async fn run_game_session(
    state: Arc<AppState>,
    socket_tx: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    mut socket_rx: SplitStream<WebSocket>,
    session_id: Uuid,
    controller: SessionController,
    mut history: Vec<models::Message>,
) -> Result<()> {
    let controller = Arc::new(Mutex::new(controller));
    let (state_update_tx, mut state_update_rx) = mpsc::channel(16);
    let host_service = ImprovHostService::new(controller.clone(), Some(state_update_tx));
    let (server_transport, client_transport) = tokio::io::duplex(4096);

    // Spawn the host's tool server.
    let host_tool_handle = tokio::spawn(async move {
        if let Ok(service) = host_service.serve(server_transport).await {
            let _ = service.waiting().await;
        }
    });
    let mcp_client = ().serve(client_transport).await?;

    let (state_ref, socket_ref) = (&state, &socket_tx);
    let on_update = move |snapshot: SessionController| async move {
        on_game_update(state_ref, session_id, &snapshot, socket_ref).await
    };

    loop {
        tokio::select! {
            msg = socket_rx.next() => {
                let keep_going = match msg {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::UserMessage { text }) => {
                            let turn = handle_host_turn(&state, session_id, &mut history, &controller, &mcp_client, &text, &socket_tx).await?;
                            // The tools have finished; settle their snapshots before anything else.
                            drain_pending(&mut state_update_rx, &on_update).await?;
                            if turn.show_ended {
                                info!("Player quit the show.");
                                state.db.update_session_status(session_id, SessionStatus::Ended).await?;
                            }
                            !turn.show_ended
                        }
                        Ok(ClientMessage::Init { .. }) => {
                            warn!("Ignoring repeated `init` message.");
                            true
                        }
                        Err(e) => {
                            warn!(error = %e, "Ignoring malformed client message.");
                            true
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Client closed the connection. Shutting down session.");
                        false
                    }
                    Some(Ok(_)) => true,
                    Some(Err(e)) => {
                        error!("Error receiving from client WebSocket: {:?}", e);
                        false
                    }
                };
                if !keep_going {
                    break;
                }
            },
            Some(snapshot) = state_update_rx.recv() => {
                on_update(snapshot).await?;
            },
        }
    }

    // Snapshots queued by the last turn still count, even if the client is gone.
    let late = drain_pending(&mut state_update_rx, &on_update).await?;
    if late > 0 {
        info!(snapshots = late, "Persisted game updates queued at shutdown.");
    }

    host_tool_handle.abort();
    info!("WebSocket connection closed and game session terminated.");
    Ok(())
}

/// Hands every snapshot already queued on `rx` to `handle`, oldest first,
/// without waiting for new ones. Returns how many were handled.
async fn drain_pending<F, Fut>(
    rx: &mut mpsc::Receiver<SessionController>,
    mut handle: F,
) -> Result<usize>
where
    F: FnMut(SessionController) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut handled = 0;
    while let Ok(snapshot) = rx.try_recv() {
        handle(snapshot).await?;
        handled += 1;
    }
    Ok(handled)
}

/// Persists a game snapshot and tells the client about it.
async fn on_game_update(
    state: &Arc<AppState>,
    session_id: Uuid,
    snapshot: &SessionController,
    socket_tx: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
) -> Result<()> {
    state.db.update_game_state(session_id, snapshot).await?;

    let mut sink = socket_tx.lock().await;
    send_msg(
        &mut sink,
        ServerMessage::StateUpdate {
            state: snapshot.current_state(),
        },
    )
    .await?;

    if snapshot.phase() == Phase::Done {
        state
            .db
            .update_session_status(session_id, SessionStatus::Ended)
            .await?;
        if let Some(summary) = snapshot.summary() {
            send_command(&mut sink, Command::SessionComplete(summary)).await?;
        }
        info!("Game over.");
    }
    Ok(())
}

/// Translates a core command into the messages the client speaks or shows.
pub(crate) async fn send_command(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    command: Command,
) -> Result<()> {
    match command {
        Command::SpeakText(text) => {
            send_msg(socket_tx, ServerMessage::ResponseStart).await?;
            send_msg(socket_tx, ServerMessage::ResponseChunk { chunk: text }).await?;
            send_msg(socket_tx, ServerMessage::ResponseEnd).await
        }
        Command::SessionComplete(summary) => {
            send_msg(socket_tx, ServerMessage::GameOver { summary }).await
        }
    }
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use improv_core::scenario::ScenarioOrder;

    fn controller() -> SessionController {
        SessionController::from_scenarios(["S1", "S2", "S3"], 3, ScenarioOrder::Sequential)
            .unwrap()
    }

    #[test]
    fn test_only_active_sessions_can_be_attached() {
        let id = Uuid::nil();
        assert!(ensure_attachable(id, Some(SessionStatus::Active)).is_ok());

        let err = ensure_attachable(id, Some(SessionStatus::Ended)).unwrap_err();
        assert!(err.to_string().contains("has already ended"));

        let err = ensure_attachable(id, None).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_queued_snapshots_survive_the_tool_server() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut c = controller();
        c.begin("Alex").unwrap();
        tx.send(c.clone()).await.unwrap();
        for reaction in ["r1", "r2", "r3"] {
            c.end_round(reaction).unwrap();
        }
        tx.send(c.clone()).await.unwrap();
        // The game is over and the tool server has gone away.
        drop(tx);

        let mut phases = Vec::new();
        let handled = drain_pending(&mut rx, |snapshot| {
            phases.push(snapshot.phase());
            async { Ok(()) }
        })
        .await
        .unwrap();

        assert_eq!(handled, 2);
        assert_eq!(phases, vec![Phase::Playing, Phase::Done]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_drain_does_not_wait_for_new_snapshots() {
        let (_tx, mut rx) = mpsc::channel::<SessionController>(4);
        let handled = drain_pending(&mut rx, |_| async { Ok(()) }).await.unwrap();
        assert_eq!(handled, 0);
    }

    #[tokio::test]
    async fn test_drain_stops_at_the_first_failure() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(controller()).await.unwrap();
        tx.send(controller()).await.unwrap();

        let err = drain_pending(&mut rx, |_| async { Err(anyhow!("database is down")) })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "database is down");
        assert!(rx.try_recv().is_ok());
    }
}
