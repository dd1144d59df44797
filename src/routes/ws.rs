//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::logic::*;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "rusgram_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "rusgram_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => handle_client_ws(incoming, &state).await,
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "rusgram_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "rusgram_backend", "WebSocket disconnected");
}

/// Dispatch one client message. Kept separate from the socket loop so it can be tested directly.
#[instrument(level = "info", skip(msg, state))]
pub async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Topics => ServerWsMessage::Topics(topics(state)),

    ClientWsMessage::Prompt { topic } => ServerWsMessage::Prompt(prompt_preview(state, topic.as_deref())),

    ClientWsMessage::Generate(req) => {
      let out = generate_exercises(state, &req).await;
      debug!(target: "exercise", session_id = ?out.session_id, n = out.exercises.len(), "WS exercises served");
      ServerWsMessage::Exercises(out)
    }

    ClientWsMessage::SetAnswer(req) => match record_answer(state, req).await {
      Ok(position) => ServerWsMessage::AnswerSaved { position },
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::Check(req) => match check_answers(state, &req).await {
      Ok(out) => ServerWsMessage::Result(out),
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::GetSession { session_id } => match session_view(state, &session_id).await {
      Ok(s) => ServerWsMessage::Session(s),
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{ModelSettings, Prompts};
  use crate::domain::ExerciseRecord;

  fn state() -> AppState {
    AppState::with_parts(Prompts::default(), ModelSettings::default(), None)
  }

  async fn dispatch(st: &AppState, json: &str) -> serde_json::Value {
    let msg: ClientWsMessage = serde_json::from_str(json).unwrap();
    serde_json::to_value(handle_client_ws(msg, st).await).unwrap()
  }

  #[tokio::test]
  async fn ping_and_topics() {
    let st = state();
    assert_eq!(dispatch(&st, r#"{"type":"ping"}"#).await["type"], "pong");
    let topics = dispatch(&st, r#"{"type":"topics"}"#).await;
    assert_eq!(topics["default_topic"], "н и нн в причастиях");
  }

  #[tokio::test]
  async fn generate_without_key_returns_warning() {
    let out = dispatch(&state(), r#"{"type":"generate","topic":"Приставки"}"#).await;
    assert_eq!(out["type"], "exercises");
    assert_eq!(out["topic"], "Приставки");
    assert_eq!(out["notices"][0]["level"], "warning");
    assert!(out.get("sessionId").is_none());
  }

  #[tokio::test]
  async fn answer_and_check_round() {
    let st = state();
    let id = st.store_exercises(None, "t", vec![ExerciseRecord::new("Зелен...ый", "е")]).await;

    let saved = dispatch(&st, &format!(r#"{{"type":"set_answer","sessionId":"{id}","position":0,"answer":"Е"}}"#)).await;
    assert_eq!(saved["type"], "answer_saved");

    let result = dispatch(&st, &format!(r#"{{"type":"check","sessionId":"{id}"}}"#)).await;
    assert_eq!(result["type"], "result");
    assert_eq!(result["correct_count"], 1);
    assert_eq!(result["percentage"], 100.0);
  }

  #[tokio::test]
  async fn unknown_session_is_an_error_message() {
    let out = dispatch(&state(), r#"{"type":"get_session","sessionId":"nope"}"#).await;
    assert_eq!(out["type"], "error");
    assert_eq!(out["message"], "Unknown session: nope");
  }
}
