//! Contains the logic for one host turn of the "ReAct" (Reason and Act) cycle.

use crate::{
    models::{Message as HistoryMessage, MessageRole},
    state::AppState,
    ws::session::send_command,
};
use anyhow::{Context, Result};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionToolArgs, FunctionObjectArgs,
};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{StreamExt, stream::SplitSink};
use improv_core::{
    Command, GameState, SessionController, cue,
    llm_client::{LLMAction, LLMStreamEvent},
    persona::PersonaPrompt,
};
use rmcp::{
    model::{CallToolRequestParam, RawContent},
    service::{RoleClient, RunningService},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// What happened during a host turn.
#[derive(Debug, Default)]
pub struct HostTurn {
    /// The line the host spoke.
    pub reply: String,
    /// The host called `end_show` because the player asked to stop.
    pub show_ended: bool,
}

/// Builds the system prompt for a turn: the rendered persona, the game state,
/// and a hint when the player's words contained a cue.
pub fn build_system_prompt(
    persona: &PersonaPrompt,
    game: &GameState,
    user_text: &str,
) -> Result<String> {
    let state_json = serde_json::to_string_pretty(game)?;
    let mut prompt = format!(
        "{}\n\n# Current Context for This Turn\n\n**Game State:**\n```json\n{}\n```",
        persona.render(game),
        state_json
    );
    if let Some(cue) = cue::detect(user_text) {
        prompt.push_str(&format!("\n\n**Heads up:** {}", cue.host_hint()));
    }
    Ok(prompt)
}

/// Converts the stored conversation into chat messages after the system prompt.
fn chat_history(
    system_prompt: String,
    history: &[HistoryMessage],
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()?
            .into(),
    ];
    for msg in history {
        match msg.role {
            MessageRole::User => messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.content.clone())
                    .build()?
                    .into(),
            ),
            MessageRole::Ai => messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(msg.content.clone())
                    .build()?
                    .into(),
            ),
        };
    }
    Ok(messages)
}

/// Handles a single player utterance, driving the host through a ReAct cycle.
///
/// This involves:
/// 1.  Constructing the prompt with the latest game state and conversation.
/// 2.  Calling the LLM to decide on an action (speak or use a game tool).
/// 3.  If tools are chosen, executing them and feeding the results back to the LLM.
/// 4.  Persisting the host's line and sending it to the client to be spoken.
#[allow(clippy::too_many_arguments)]
pub async fn handle_host_turn(
    state: &Arc<AppState>,
    session_id: Uuid,
    history: &mut Vec<HistoryMessage>,
    controller: &Arc<Mutex<SessionController>>,
    mcp_client: &RunningService<RoleClient, ()>,
    user_text: &str,
    socket_tx: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
) -> Result<HostTurn> {
    let new_user_msg = state
        .db
        .add_message(session_id, MessageRole::User, user_text)
        .await?;
    history.push(new_user_msg);

    let game = controller.lock().await.current_state();
    let system_prompt = build_system_prompt(&state.persona, &game, user_text)?;
    let messages = chat_history(system_prompt, history)?;

    let tools = mcp_client
        .list_all_tools()
        .await?
        .into_iter()
        .map(|t| {
            Ok(ChatCompletionToolArgs::default()
                .function(
                    FunctionObjectArgs::default()
                        .name(t.name)
                        .description(t.description.unwrap_or_default())
                        .parameters(serde_json::to_value(&*t.input_schema)?)
                        .build()?,
                )
                .build()?)
        })
        .collect::<Result<Vec<_>>>()?;

    let action = state
        .llm_client
        .decide_action(messages.clone(), tools)
        .await?;

    let mut turn = HostTurn::default();
    match action {
        LLMAction::TextResponse(response_text) => turn.reply = response_text,
        LLMAction::ToolCall(tool_calls) => {
            let mut tool_results = vec![];
            for call in &tool_calls {
                info!(tool = %call.function.name, "Host called a game tool");
                if call.function.name == "end_show" {
                    turn.show_ended = true;
                }
                let result =
                    call_tool(mcp_client, &call.function.name, &call.function.arguments).await?;
                tool_results.push(result);
            }

            let mut history_with_tools = messages;
            history_with_tools.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(tool_calls.clone())
                    .build()?
                    .into(),
            );
            for (call, result) in tool_calls.iter().zip(tool_results) {
                history_with_tools.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(call.id.clone())
                        .content(result)
                        .build()?
                        .into(),
                );
            }

            let mut final_stream = state
                .llm_client
                .stream_after_tools(history_with_tools)
                .await?;
            while let Some(event_result) = final_stream.next().await {
                match event_result {
                    Ok(LLMStreamEvent::TextChunk(chunk)) => turn.reply.push_str(&chunk),
                    Err(e) => warn!(error = %e, "Dropped a chunk of the host's reply"),
                }
            }
        }
    }

    if !turn.reply.is_empty() {
        let new_ai_msg = state
            .db
            .add_message(session_id, MessageRole::Ai, &turn.reply)
            .await?;
        history.push(new_ai_msg);

        let mut sink = socket_tx.lock().await;
        send_command(&mut sink, Command::SpeakText(turn.reply.clone())).await?;
    }

    Ok(turn)
}

/// Runs one tool through the in-process MCP client and returns its text.
///
/// Tool failures are handed back to the model as text so it can recover
/// (e.g. by asking the player for their name again).
async fn call_tool(
    mcp_client: &RunningService<RoleClient, ()>,
    name: &str,
    arguments: &str,
) -> Result<String> {
    let arguments = if arguments.trim().is_empty() {
        None
    } else {
        Some(serde_json::from_str(arguments).context("Tool arguments were not a JSON object")?)
    };

    let result = match mcp_client
        .peer()
        .call_tool(CallToolRequestParam {
            name: name.to_string().into(),
            arguments,
        })
        .await
    {
        Ok(result) => result,
        Err(e) => {
            warn!(tool = %name, error = %e, "Game tool call failed");
            return Ok(format!("{{\"error\": \"{}\"}}", e));
        }
    };

    if result.is_error == Some(true) {
        warn!(tool = %name, "Game tool rejected the call");
    }

    let annotated_content = result
        .content
        .context("Tool call returned no content")?
        .pop()
        .context("Content list was empty")?;
    Ok(match annotated_content.raw {
        RawContent::Text(text_content) => text_content.text,
        _ => "{\"error\": \"Unexpected content type from tool\"}".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use improv_core::Phase;

    fn game(player_name: Option<&str>, current_round: usize) -> GameState {
        GameState {
            phase: if current_round == 0 {
                Phase::Intro
            } else {
                Phase::Playing
            },
            current_round,
            max_rounds: 3,
            player_name: player_name.map(str::to_string),
            scenario: None,
        }
    }

    #[test]
    fn test_system_prompt_renders_persona_and_state() {
        let persona =
            PersonaPrompt::new("Host for {player_name}, round {current_round}/{max_rounds}.");
        let prompt =
            build_system_prompt(&persona, &game(Some("Alex"), 2), "I'm a cat!").unwrap();

        assert!(prompt.starts_with("Host for Alex, round 2/3."));
        assert!(prompt.contains("\"phase\": \"playing\""));
        assert!(!prompt.contains("Heads up"));
    }

    #[test]
    fn test_system_prompt_adds_cue_hints() {
        let persona = PersonaPrompt::new("Host.");

        let prompt = build_system_prompt(&persona, &game(Some("Alex"), 1), "End scene!").unwrap();
        assert!(prompt.contains("record_round_reaction"));

        let prompt = build_system_prompt(&persona, &game(Some("Alex"), 1), "I quit").unwrap();
        assert!(prompt.contains("end_show"));
    }

    #[test]
    fn test_chat_history_keeps_roles_in_order() {
        let message = |id, role, content: &str| HistoryMessage {
            id,
            session_id: Uuid::nil(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let history = vec![
            message(1, MessageRole::Ai, "What's your name, contestant?"),
            message(2, MessageRole::User, "Alex"),
        ];

        let messages = chat_history("system".to_string(), &history).unwrap();
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::User(_)));
    }
}
