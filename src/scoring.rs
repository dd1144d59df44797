//! Answer checking: trimmed, case-insensitive comparison against the model's answers.

use crate::domain::{ExerciseRecord, ItemResult, ScoreReport, Verdict};
use crate::util::normalize_answer;

/// At or above this percentage a run counts as good.
const GOOD_THRESHOLD: f32 = 70.0;

pub fn is_match(user: &str, correct: &str) -> bool {
  normalize_answer(user) == normalize_answer(correct)
}

/// Score `answers` position by position. Missing answers count as empty, extras are ignored.
pub fn score(exercises: &[ExerciseRecord], answers: &[String]) -> ScoreReport {
  let items: Vec<ItemResult> = exercises
    .iter()
    .enumerate()
    .map(|(i, ex)| {
      let user_answer = answers.get(i).map(|a| a.trim().to_string()).unwrap_or_default();
      let correct_answer = ex.answer_text.trim().to_string();
      ItemResult {
        number: i + 1,
        exercise: ex.prompt_text.clone(),
        correct: is_match(&user_answer, &correct_answer),
        user_answer,
        correct_answer,
      }
    })
    .collect();

  let total = items.len();
  let correct_count = items.iter().filter(|r| r.correct).count();
  let percentage = (total > 0).then(|| correct_count as f32 / total as f32 * 100.0);
  let verdict = match percentage {
    Some(_) if correct_count == total => Verdict::Perfect,
    Some(p) if p >= GOOD_THRESHOLD => Verdict::Good,
    _ => Verdict::KeepPracticing,
  };

  ScoreReport { items, correct_count, total, percentage, verdict }
}
