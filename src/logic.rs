//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Building the generation prompt for a topic
//!   - Generating exercises (model call -> parser -> session store)
//!   - Recording answers and scoring them

use tracing::{debug, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::Notice;
use crate::parser;
use crate::protocol::{to_out, AnswerIn, CheckIn, CheckOut, GenerateIn, GenerateOut, PromptOut, SessionOut, TopicsOut};
use crate::state::{AppState, SessionError};
use crate::util::{fill_template, trunc_for_log};

/// Trimmed topic, or the configured default when blank.
pub fn resolve_topic(prompts: &Prompts, topic: Option<&str>) -> String {
  match topic.map(str::trim) {
    Some(t) if !t.is_empty() => t.to_string(),
    _ => prompts.default_topic.clone(),
  }
}

/// Full prompt: fixed instructions followed by the topic section.
pub fn build_prompt(prompts: &Prompts, topic: &str) -> String {
  let topic_part = fill_template(&prompts.topic_template, &[("theme", topic)]);
  format!("{}{}", prompts.exercise_template, topic_part)
}

pub fn topics(state: &AppState) -> TopicsOut {
  TopicsOut {
    topics: state.prompts.example_topics.clone(),
    default_topic: state.prompts.default_topic.clone(),
  }
}

pub fn prompt_preview(state: &AppState, topic: Option<&str>) -> PromptOut {
  let topic = resolve_topic(&state.prompts, topic);
  let prompt = build_prompt(&state.prompts, &topic);
  PromptOut { topic, prompt }
}

/// One generation cycle. At most one model call; never fails, problems become notices.
/// The session is only replaced when at least one exercise was parsed.
#[instrument(level = "info", skip(state, req), fields(topic_len = req.topic.as_deref().map_or(0, str::len), has_session = req.session_id.is_some(), own_key = req.api_key.is_some()))]
pub async fn generate_exercises(state: &AppState, req: &GenerateIn) -> GenerateOut {
  let mut notices = Vec::new();
  let topic = resolve_topic(&state.prompts, req.topic.as_deref());
  let keep_session = || req.session_id.clone();

  let Some(model) = state.model_for(req.api_key.as_deref(), &mut notices) else {
    return GenerateOut { session_id: keep_session(), topic, exercises: Vec::new(), notices };
  };

  let prompt = build_prompt(&state.prompts, &topic);
  let raw = model.send(&prompt, &mut notices).await;
  if raw.is_empty() {
    return GenerateOut { session_id: keep_session(), topic, exercises: Vec::new(), notices };
  }

  let outcome = parser::parse(&raw);
  debug!(target: "exercise", parsed = outcome.is_success(), n = outcome.exercises().len(), "Model output parsed");
  if !outcome.is_success() {
    notices.push(Notice::error("Ошибка при обработке ответа модели"));
  }
  let exercises = outcome.into_exercises();

  if exercises.is_empty() {
    warn!(target: "exercise", %topic, raw_len = raw.len(), "No exercises extracted from model output");
    debug!(target: "exercise", raw = %trunc_for_log(&raw, 300), "Unusable model output");
    notices.push(Notice::error("Не удалось получить упражнения в правильном формате"));
    return GenerateOut { session_id: keep_session(), topic, exercises: Vec::new(), notices };
  }

  let out = to_out(&exercises);
  let n = exercises.len();
  let session_id = state.store_exercises(req.session_id.as_deref(), &topic, exercises).await;
  info!(target: "exercise", %session_id, %topic, n, "Exercises generated");
  notices.push(Notice::success(format!("Сгенерировано {n} упражнений!")));
  GenerateOut { session_id: Some(session_id), topic, exercises: out, notices }
}

pub async fn session_view(state: &AppState, session_id: &str) -> Result<SessionOut, SessionError> {
  state
    .get_session(session_id)
    .await
    .map(|s| SessionOut::from(&s))
    .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))
}

#[instrument(level = "info", skip(state, req), fields(session_id = %req.session_id, position = req.position, answer_len = req.answer.len()))]
pub async fn record_answer(state: &AppState, req: AnswerIn) -> Result<usize, SessionError> {
  state.set_answer(&req.session_id, req.position, req.answer).await?;
  Ok(req.position)
}

#[instrument(level = "info", skip(state, req), fields(session_id = %req.session_id, supplied = req.answers.as_ref().map_or(0, Vec::len)))]
pub async fn check_answers(state: &AppState, req: &CheckIn) -> Result<CheckOut, SessionError> {
  let report = state.check(&req.session_id, req.answers.as_deref()).await?;
  info!(target: "exercise", session_id = %req.session_id, correct = report.correct_count, total = report.total, verdict = ?report.verdict, "Answers checked");
  Ok(CheckOut::from(report))
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::StatusCode;

  use crate::config::ModelSettings;
  use crate::domain::NoticeLevel;
  use crate::gemini::{mock, Gemini};

  const REPLY: &str = "Вот упражнения:\n```json\n[\n  {\"упражнение\": \"Варе...ый картофель был очень вкусным.\", \"ответ\": \"нн\"},\n  {\"упражнение\": \"Краше...ый пол блестел в лучах солнца.\", \"ответ\": \"н\"}\n]\n```\n";

  async fn state_with_reply(status: StatusCode, reply: serde_json::Value) -> AppState {
    let (base, _) = mock::spawn(status, reply).await;
    let settings = ModelSettings { base_url: base, timeout_secs: 5, ..ModelSettings::default() };
    let gemini = Gemini::new("k", settings.clone()).unwrap();
    AppState::with_parts(Prompts::default(), settings, Some(gemini))
  }

  #[test]
  fn blank_topic_falls_back_to_default() {
    let p = Prompts::default();
    assert_eq!(resolve_topic(&p, None), "н и нн в причастиях");
    assert_eq!(resolve_topic(&p, Some("  ")), "н и нн в причастиях");
    assert_eq!(resolve_topic(&p, Some(" Приставки пре- и при- ")), "Приставки пре- и при-");
  }

  #[test]
  fn prompt_ends_with_topic_section() {
    let prompt = build_prompt(&Prompts::default(), "Знаки препинания");
    assert!(prompt.starts_with("Ты - учитель русского языка."));
    assert!(prompt.contains("Создай 5 упражнений"));
    assert!(prompt.ends_with("** Тема **\nЗнаки препинания\n"));
  }

  #[tokio::test]
  async fn generation_creates_session_and_reports_success() {
    let st = state_with_reply(StatusCode::OK, mock::text_reply(REPLY)).await;
    let out = generate_exercises(&st, &GenerateIn::default()).await;

    assert_eq!(out.exercises.len(), 2);
    assert_eq!(out.exercises[0].exercise, "Варе...ый картофель был очень вкусным.");
    assert_eq!(out.notices, vec![Notice::success("Сгенерировано 2 упражнений!")]);
    let id = out.session_id.unwrap();
    let s = st.get_session(&id).await.unwrap();
    assert_eq!(s.exercises[1].answer_text, "н");
    assert_eq!(s.topic, "н и нн в причастиях");
  }

  #[tokio::test]
  async fn unparseable_reply_keeps_previous_session() {
    let st = state_with_reply(StatusCode::OK, mock::text_reply("Извините, не могу.")).await;
    let id = st.store_exercises(None, "old", vec![crate::domain::ExerciseRecord::new("a...", "b")]).await;

    let req = GenerateIn { session_id: Some(id.clone()), ..GenerateIn::default() };
    let out = generate_exercises(&st, &req).await;

    assert!(out.exercises.is_empty());
    assert_eq!(out.session_id.as_deref(), Some(id.as_str()));
    let messages: Vec<_> = out.notices.iter().map(|n| n.message.as_str()).collect();
    assert_eq!(
      messages,
      vec!["Ошибка при обработке ответа модели", "Не удалось получить упражнения в правильном формате"]
    );
    assert_eq!(st.get_session(&id).await.unwrap().topic, "old");
  }

  #[tokio::test]
  async fn api_failure_is_a_single_error_notice() {
    let reply = serde_json::json!({ "error": { "message": "quota exceeded" } });
    let st = state_with_reply(StatusCode::TOO_MANY_REQUESTS, reply).await;
    let out = generate_exercises(&st, &GenerateIn::default()).await;

    assert!(out.session_id.is_none());
    assert_eq!(out.notices.len(), 1);
    assert_eq!(out.notices[0].level, NoticeLevel::Error);
    assert!(out.notices[0].message.contains("quota exceeded"));
  }

  #[tokio::test]
  async fn check_reports_unknown_session() {
    let st = AppState::with_parts(Prompts::default(), ModelSettings::default(), None);
    let req = CheckIn { session_id: "nope".into(), answers: None };
    assert!(matches!(check_answers(&st, &req).await, Err(SessionError::UnknownSession(_))));
  }
}
