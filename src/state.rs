//! Application state: in-memory session store, prompts, model settings and the Gemini client.
//!
//! Sessions are explicit objects keyed by id. A session is created by the first
//! successful generation, replaced by the next one, and read when answers are checked.

use std::{collections::HashMap, sync::Arc};

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::{load_agent_config_from_env, ModelSettings, Prompts};
use crate::domain::{ExerciseSession, ExerciseSet, Notice, ScoreReport};
use crate::gemini::Gemini;
use crate::scoring;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Answer index {index} is out of range (session has {len} exercises)")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, ExerciseSession>>>,
    pub gemini: Option<Gemini>,
    pub model_settings: ModelSettings,
    pub prompts: Prompts,
}

impl AppState {
    /// Build state from env: load TOML config, apply GEMINI_* overrides, init Gemini.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_agent_config_from_env().unwrap_or_default();
        let settings = cfg.model.apply_env().sanitized();

        let gemini = Gemini::from_env(&settings);
        if gemini.is_some() {
            info!(target: "rusgram_backend", base_url = %settings.base_url, model = %settings.model, temperature = settings.temperature, top_p = settings.top_p, seed = ?settings.seed, "Gemini enabled.");
        } else {
            warn!(target: "rusgram_backend", "Gemini disabled (no GEMINI_API_KEY). Clients must supply their own key.");
        }

        Self::with_parts(cfg.prompts, settings, gemini)
    }

    pub fn with_parts(prompts: Prompts, model_settings: ModelSettings, gemini: Option<Gemini>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            gemini,
            model_settings,
            prompts,
        }
    }

    /// Client for this request: the caller's key if given, else the server's.
    /// Pushes a notice and returns None when neither is available.
    pub fn model_for(&self, api_key: Option<&str>, notices: &mut Vec<Notice>) -> Option<Gemini> {
        let key = api_key.map(str::trim).filter(|k| !k.is_empty());
        match (key, &self.gemini) {
            (Some(k), Some(g)) => Some(g.with_api_key(k)),
            (Some(k), None) => match Gemini::new(k, self.model_settings.clone()) {
                Ok(g) => Some(g),
                Err(e) => {
                    notices.push(Notice::error(format!("Ошибка при обращении к API: {e}")));
                    None
                }
            },
            (None, Some(g)) => Some(g.clone()),
            (None, None) => {
                notices.push(Notice::warning("Пожалуйста, введите API ключ Gemini"));
                None
            }
        }
    }

    /// Replace the exercises of an existing session, or open a new one.
    /// Returns the id of the session that now holds `exercises`.
    #[instrument(level = "debug", skip(self, exercises), fields(n = exercises.len()))]
    pub async fn store_exercises(&self, session_id: Option<&str>, topic: &str, exercises: ExerciseSet) -> String {
        let mut sessions = self.sessions.write().await;
        if let Some(s) = session_id.and_then(|id| sessions.get_mut(id)) {
            s.replace(topic.to_string(), exercises);
            info!(target: "exercise", id = %s.id, "Session exercises replaced");
            return s.id.clone();
        }
        let id = Uuid::new_v4().to_string();
        sessions.insert(id.clone(), ExerciseSession::new(id.clone(), topic.to_string(), exercises));
        info!(target: "exercise", %id, "Session created");
        id
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn get_session(&self, id: &str) -> Option<ExerciseSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Record an in-progress answer at a 0-based position.
    #[instrument(level = "debug", skip(self, answer))]
    pub async fn set_answer(&self, id: &str, index: usize, answer: String) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let s = sessions.get_mut(id).ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;
        let len = s.answers.len();
        if s.set_answer(index, answer) {
            Ok(())
        } else {
            Err(SessionError::IndexOutOfRange { index, len })
        }
    }

    /// Score the session, first overwriting its answers when `answers` is given.
    #[instrument(level = "debug", skip(self, answers), fields(supplied = answers.is_some()))]
    pub async fn check(&self, id: &str, answers: Option<&[String]>) -> Result<ScoreReport, SessionError> {
        let mut sessions = self.sessions.write().await;
        let s = sessions.get_mut(id).ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;
        if let Some(a) = answers {
            s.set_answers(a);
        }
        Ok(scoring::score(&s.exercises, &s.answers))
    }
}
