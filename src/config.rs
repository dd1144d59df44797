//! Loading service configuration (prompt templates + model settings) from TOML and env.
//!
//! See `AgentConfig`, `Prompts` and `ModelSettings` for the expected schema:
//!
//! ```toml
//! [prompts]
//! default_topic = "н и нн в причастиях"
//! example_topics = ["н и нн в причастиях", "Правописание приставок пре- и при-"]
//!
//! [model]
//! model = "gemini-2.0-flash"
//! temperature = 0.0
//! top_p = 1.0
//! seed = 42
//! ```

use serde::Deserialize;
use tracing::{error, info, warn};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TOPIC: &str = "н и нн в причастиях";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub model: ModelSettings,
}

/// Prompt templates. `{theme}` in `topic_template` is replaced with the user's topic,
/// and the result is appended to `exercise_template`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub exercise_template: String,
  pub topic_template: String,
  pub default_topic: String,
  pub example_topics: Vec<String>,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      exercise_template: r#"Ты - учитель русского языка.

** Требования **
1) Одно упражнение - одно предложение
2) В каждом предложении должен быть пропуск, обозначенный многоточием (...)
3) Пропуск должен быть на месте, где нужно вставить правильную букву или буквы
4) Создай 5 упражнений

** Формат ответа пример **
В Json
[
    {"упражнение": "Варе...ый картофель был очень вкусным.", "ответ": "нн"},
    {"упражнение": "Краше...ый пол блестел в лучах солнца.", "ответ": "н"},
    {"упражнение": "...", "ответ": "..."},
    {"упражнение": "...", "ответ": "..."},
    {"упражнение": "...", "ответ": "..."}
]
"#
      .into(),
      topic_template: "** Тема **\n{theme}\n".into(),
      default_topic: DEFAULT_TOPIC.into(),
      example_topics: vec![
        "н и нн в причастиях".into(),
        "Правописание приставок пре- и при-".into(),
        "Правописание безударных гласных в корне".into(),
        "Правописание -тся и -ться в глаголах".into(),
        "Знаки препинания в сложном предложении".into(),
      ],
    }
  }
}

/// Decoding settings for the Gemini client. Fixed once a client is built.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelSettings {
  pub model: String,
  pub base_url: String,
  pub temperature: f32,
  pub top_p: f32,
  pub seed: Option<i64>,
  pub timeout_secs: u64,
}

impl Default for ModelSettings {
  fn default() -> Self {
    Self {
      model: DEFAULT_MODEL.into(),
      base_url: DEFAULT_BASE_URL.into(),
      temperature: 0.0,
      top_p: 1.0,
      seed: Some(42),
      timeout_secs: 60,
    }
  }
}

impl ModelSettings {
  /// Apply GEMINI_* overrides on top of the current values.
  pub fn apply_env(mut self) -> Self {
    self.apply_overrides(|key| std::env::var(key).ok());
    self
  }

  fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
    if let Some(v) = get("GEMINI_MODEL") {
      self.model = v;
    }
    if let Some(v) = get("GEMINI_BASE_URL") {
      self.base_url = v;
    }
    if let Some(v) = get("GEMINI_TEMPERATURE") {
      match v.parse() {
        Ok(t) => self.temperature = t,
        Err(_) => warn!(target: "rusgram_backend", value = %v, "Ignoring unparsable GEMINI_TEMPERATURE"),
      }
    }
    if let Some(v) = get("GEMINI_TOP_P") {
      match v.parse() {
        Ok(p) => self.top_p = p,
        Err(_) => warn!(target: "rusgram_backend", value = %v, "Ignoring unparsable GEMINI_TOP_P"),
      }
    }
    if let Some(v) = get("GEMINI_SEED") {
      if v.eq_ignore_ascii_case("none") || v.is_empty() {
        self.seed = None;
      } else {
        match v.parse() {
          Ok(s) => self.seed = Some(s),
          Err(_) => warn!(target: "rusgram_backend", value = %v, "Ignoring unparsable GEMINI_SEED"),
        }
      }
    }
    if let Some(v) = get("GEMINI_TIMEOUT_SECS") {
      match v.parse() {
        Ok(s) => self.timeout_secs = s,
        Err(_) => warn!(target: "rusgram_backend", value = %v, "Ignoring unparsable GEMINI_TIMEOUT_SECS"),
      }
    }
  }

  /// Replace out-of-range sampling values with the defaults.
  /// temperature must lie in 0..=2, top_p in (0, 1].
  pub fn sanitized(mut self) -> Self {
    let defaults = Self::default();
    if !(0.0..=2.0).contains(&self.temperature) {
      warn!(target: "rusgram_backend", temperature = self.temperature, "Temperature out of range; using default");
      self.temperature = defaults.temperature;
    }
    if !(self.top_p > 0.0 && self.top_p <= 1.0) {
      warn!(target: "rusgram_backend", top_p = self.top_p, "top_p out of range; using default");
      self.top_p = defaults.top_p;
    }
    self.base_url = self.base_url.trim_end_matches('/').to_string();
    self
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "rusgram_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "rusgram_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "rusgram_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
