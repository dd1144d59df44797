//! Domain models used by the backend: exercises, sessions, notices and score reports.

use serde::Serialize;

/// One fill-in-the-blank sentence and the letters that fill its `...` gap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExerciseRecord {
  pub prompt_text: String,
  pub answer_text: String,
}

impl ExerciseRecord {
  pub fn new(prompt_text: impl Into<String>, answer_text: impl Into<String>) -> Self {
    Self { prompt_text: prompt_text.into(), answer_text: answer_text.into() }
  }
}

/// Ordered as produced by the model; shown to the user numbered 1..N.
pub type ExerciseSet = Vec<ExerciseRecord>;

/// Severity of a user-facing message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
  Error,
  Warning,
  Success,
}

/// Side-channel message for the user (API failures, unparseable output, success counts).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
  pub level: NoticeLevel,
  pub message: String,
}

impl Notice {
  pub fn error(message: impl Into<String>) -> Self {
    Self { level: NoticeLevel::Error, message: message.into() }
  }
  pub fn warning(message: impl Into<String>) -> Self {
    Self { level: NoticeLevel::Warning, message: message.into() }
  }
  pub fn success(message: impl Into<String>) -> Self {
    Self { level: NoticeLevel::Success, message: message.into() }
  }
}

/// Transient per-user state: the current exercise set and the answers typed so far.
///
/// Lifecycle:
///   - created by the first successful generation,
///   - replaced (answers reset) by the next successful generation,
///   - read when answers are checked.
#[derive(Clone, Debug)]
pub struct ExerciseSession {
  pub id: String,
  pub topic: String,
  pub exercises: ExerciseSet,
  /// Always the same length as `exercises`.
  pub answers: Vec<String>,
}

impl ExerciseSession {
  pub fn new(id: String, topic: String, exercises: ExerciseSet) -> Self {
    let answers = vec![String::new(); exercises.len()];
    Self { id, topic, exercises, answers }
  }

  /// Swap in a freshly generated set and clear the in-progress answers.
  pub fn replace(&mut self, topic: String, exercises: ExerciseSet) {
    self.answers = vec![String::new(); exercises.len()];
    self.exercises = exercises;
    self.topic = topic;
  }

  /// Store the answer for a 0-based position. Returns false when out of range.
  pub fn set_answer(&mut self, index: usize, answer: String) -> bool {
    match self.answers.get_mut(index) {
      Some(slot) => {
        *slot = answer;
        true
      }
      None => false,
    }
  }

  /// Overwrite answers from a client-supplied list; missing positions become empty.
  pub fn set_answers(&mut self, answers: &[String]) {
    for (i, slot) in self.answers.iter_mut().enumerate() {
      *slot = answers.get(i).cloned().unwrap_or_default();
    }
  }
}

/// Coarse feedback bucket derived from the percentage of correct answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
  Perfect,
  Good,
  KeepPracticing,
}

impl Verdict {
  pub fn message(self) -> &'static str {
    match self {
      Verdict::Perfect => "Отлично! Все ответы правильные!",
      Verdict::Good => "Хороший результат!",
      Verdict::KeepPracticing => "Продолжайте практиковаться!",
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ItemResult {
  /// 1-based, as displayed.
  pub number: usize,
  pub exercise: String,
  pub user_answer: String,
  pub correct_answer: String,
  pub correct: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoreReport {
  pub items: Vec<ItemResult>,
  pub correct_count: usize,
  pub total: usize,
  /// None when there is nothing to score.
  pub percentage: Option<f32>,
  pub verdict: Verdict,
}
