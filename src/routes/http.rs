//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::logic::*;
use crate::protocol::*;
use crate::state::{AppState, SessionError};

impl IntoResponse for SessionError {
  fn into_response(self) -> Response {
    let status = match self {
      SessionError::UnknownSession(_) => StatusCode::NOT_FOUND,
      SessionError::IndexOutOfRange { .. } => StatusCode::BAD_REQUEST,
    };
    (status, Json(ErrorOut { error: self.to_string() })).into_response()
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_topics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(topics(&state))
}

#[instrument(level = "info", skip(state, q), fields(topic_len = q.topic.as_deref().map_or(0, str::len)))]
pub async fn http_get_prompt(
  State(state): State<Arc<AppState>>,
  Query(q): Query<PromptQuery>,
) -> impl IntoResponse {
  Json(prompt_preview(&state, q.topic.as_deref()))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_exercises(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GenerateIn>,
) -> impl IntoResponse {
  let out = generate_exercises(&state, &body).await;
  info!(target: "exercise", session_id = ?out.session_id, n = out.exercises.len(), notices = out.notices.len(), "HTTP exercises served");
  Json(out)
}

#[instrument(level = "info", skip(state), fields(session_id = %q.session_id))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Query(q): Query<SessionQuery>,
) -> Result<Json<SessionOut>, SessionError> {
  session_view(&state, &q.session_id).await.map(Json)
}

#[instrument(level = "info", skip(state, body), fields(session_id = %body.session_id, position = body.position))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<AnswerOut>, SessionError> {
  record_answer(&state, body).await?;
  Ok(Json(AnswerOut { ok: true }))
}

#[instrument(level = "info", skip(state, body), fields(session_id = %body.session_id))]
pub async fn http_post_check(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CheckIn>,
) -> Result<Json<CheckOut>, SessionError> {
  let out = check_answers(&state, &body).await?;
  info!(target: "exercise", session_id = %body.session_id, correct = out.report.correct_count, total = out.report.total, "HTTP check evaluated");
  Ok(Json(out))
}
