//! Extraction of the exercise list from raw model output.
//!
//! Models wrap their JSON in markdown fences and are sloppy about quoting, so:
//!   1) collect every fenced block (```json ... ``` or bare ```),
//!   2) keep only multi-line blocks and join them with a blank line,
//!   3) parse as JSON; on a syntax error swap `'` for `"` and try exactly once more,
//!   4) accept only a top-level array.
//!
//! Apostrophes inside field values do not survive step 3. Known limitation.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::{ExerciseRecord, ExerciseSet};

/// Lazy body so the first closing fence ends a block.
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?s)```(?:json)?\r?\n(.*?)\r?\n```").expect("fenced block pattern is valid")
});

const EXERCISE_KEYS: &[&str] = &["exercise", "упражнение"];
const ANSWER_KEYS: &[&str] = &["answer", "ответ"];

/// Result of [`parse`]: either the extracted set or a signal that the output was not understood.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseOutcome {
  Parsed(ExerciseSet),
  Unparseable,
}

impl ParseOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, ParseOutcome::Parsed(_))
  }

  /// Records on success, empty slice on failure.
  pub fn exercises(&self) -> &[ExerciseRecord] {
    match self {
      ParseOutcome::Parsed(set) => set,
      ParseOutcome::Unparseable => &[],
    }
  }

  pub fn into_exercises(self) -> ExerciseSet {
    match self {
      ParseOutcome::Parsed(set) => set,
      ParseOutcome::Unparseable => Vec::new(),
    }
  }
}

/// Verbatim content of every fenced block, in order of appearance.
pub fn fenced_blocks(raw: &str) -> Vec<&str> {
  FENCED_BLOCK
    .captures_iter(raw)
    .filter_map(|c| c.get(1).map(|m| m.as_str()))
    .collect()
}

/// Trimmed multi-line blocks joined by a blank line. Empty when nothing qualifies.
pub fn candidate_json(raw: &str) -> String {
  fenced_blocks(raw)
    .into_iter()
    .map(str::trim)
    .filter(|block| block.contains('\n'))
    .collect::<Vec<_>>()
    .join("\n\n")
}

/// Parse raw model text into an exercise set. Pure; never panics.
pub fn parse(raw: &str) -> ParseOutcome {
  let candidate = candidate_json(raw);

  let value = match serde_json::from_str::<Value>(&candidate) {
    Ok(v) => v,
    Err(first) => {
      debug!(target: "exercise", error = %first, candidate_len = candidate.len(), "Candidate is not valid JSON; retrying with quote repair");
      let repaired = candidate.replace('\'', "\"");
      match serde_json::from_str::<Value>(&repaired) {
        Ok(v) => v,
        Err(second) => {
          warn!(target: "exercise", error = %second, "Model output could not be parsed as JSON");
          return ParseOutcome::Unparseable;
        }
      }
    }
  };

  match value {
    Value::Array(items) => ParseOutcome::Parsed(items.iter().map(to_record).collect()),
    other => {
      warn!(target: "exercise", kind = json_kind(&other), "Model output JSON is not a list");
      ParseOutcome::Unparseable
    }
  }
}

fn to_record(item: &Value) -> ExerciseRecord {
  match item {
    Value::Object(obj) => ExerciseRecord::new(field_text(obj, EXERCISE_KEYS), field_text(obj, ANSWER_KEYS)),
    _ => ExerciseRecord::new("", ""),
  }
}

fn field_text(obj: &Map<String, Value>, keys: &[&str]) -> String {
  match keys.iter().find_map(|k| obj.get(*k)) {
    Some(Value::String(s)) => s.clone(),
    Some(Value::Null) | None => String::new(),
    Some(other) => other.to_string(),
  }
}

fn json_kind(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rec(p: &str, a: &str) -> ExerciseRecord {
    ExerciseRecord::new(p, a)
  }

  #[test]
  fn parses_the_russian_example_reply() {
    let raw = "Here you go:\n```json\n[{\"exercise\": \"Зелен...ый лист упал.\", \"answer\": \"е\"},\n {\"exercise\": \"Кипяч...ая вода остыла.\", \"answer\": \"ё\"}]\n```\n";
    let out = parse(raw);
    assert!(out.is_success());
    assert_eq!(
      out.exercises(),
      &[rec("Зелен...ый лист упал.", "е"), rec("Кипяч...ая вода остыла.", "ё")]
    );
  }

  #[test]
  fn accepts_the_russian_field_names_from_the_prompt() {
    let raw = "```json\n[\n  {\"упражнение\": \"Варе...ый картофель был очень вкусным.\", \"ответ\": \"нн\"},\n  {\"упражнение\": \"Краше...ый пол блестел в лучах солнца.\", \"ответ\": \"н\"}\n]\n```";
    assert_eq!(
      parse(raw),
      ParseOutcome::Parsed(vec![
        rec("Варе...ый картофель был очень вкусным.", "нн"),
        rec("Краше...ый пол блестел в лучах солнца.", "н"),
      ])
    );
  }

  #[test]
  fn preserves_order_and_does_not_assume_five_items() {
    let raw = "```\n[\n{\"exercise\": \"a...\", \"answer\": \"1\"},\n{\"exercise\": \"b...\", \"answer\": \"2\"},\n{\"exercise\": \"a...\", \"answer\": \"1\"}\n]\n```";
    let set = parse(raw).into_exercises();
    assert_eq!(set, vec![rec("a...", "1"), rec("b...", "2"), rec("a...", "1")]);
  }

  #[test]
  fn no_fenced_block_is_a_failure() {
    let out = parse("[{\"exercise\": \"a...\", \"answer\": \"b\"}]");
    assert_eq!(out, ParseOutcome::Unparseable);
    assert!(!out.is_success());
    assert!(out.exercises().is_empty());
  }

  #[test]
  fn empty_input_is_a_failure() {
    assert_eq!(parse(""), ParseOutcome::Unparseable);
  }

  #[test]
  fn repairs_single_quoted_json() {
    let single = "```json\n[\n  {'exercise': 'Зелен...ый лист упал.', 'answer': 'е'}\n]\n```";
    let double = "```json\n[\n  {\"exercise\": \"Зелен...ый лист упал.\", \"answer\": \"е\"}\n]\n```";
    let repaired = parse(single);
    assert!(repaired.is_success());
    assert_eq!(repaired, parse(double));
  }

  #[test]
  fn repairs_mixed_quotes() {
    let raw = "```json\n[\n  {\"exercise\": 'Кипяч...ая вода.', 'answer': \"ё\"}\n]\n```";
    assert_eq!(parse(raw).into_exercises(), vec![rec("Кипяч...ая вода.", "ё")]);
  }

  #[test]
  fn unrepairable_json_is_a_failure() {
    let raw = "```json\n[\n  {\"exercise\": \"a...\", \"answer\": }\n]\n```";
    assert_eq!(parse(raw), ParseOutcome::Unparseable);
  }

  #[test]
  fn apostrophe_in_content_breaks_the_repair() {
    let raw = "```json\n[\n  {'exercise': 'It's ...', 'answer': 'a'}\n]\n```";
    assert_eq!(parse(raw), ParseOutcome::Unparseable);
  }

  #[test]
  fn single_line_block_is_ignored() {
    let raw = "Use `x` like this:\n```json\n{\"not\": \"it\"}\n```\nAnd the exercises:\n```json\n[\n  {\"exercise\": \"a...\", \"answer\": \"b\"}\n]\n```";
    assert_eq!(fenced_blocks(raw).len(), 2);
    assert_eq!(parse(raw).into_exercises(), vec![rec("a...", "b")]);
  }

  #[test]
  fn only_single_line_blocks_is_a_failure() {
    let raw = "```json\n[{\"exercise\": \"a...\", \"answer\": \"b\"}]\n```";
    assert_eq!(candidate_json(raw), "");
    assert_eq!(parse(raw), ParseOutcome::Unparseable);
  }

  #[test]
  fn first_closing_fence_ends_the_block() {
    let raw = "```\nfirst\nblock\n```\nprose\n```json\nsecond\nblock\n```";
    assert_eq!(fenced_blocks(raw), vec!["first\nblock", "second\nblock"]);
    assert_eq!(candidate_json(raw), "first\nblock\n\nsecond\nblock");
  }

  #[test]
  fn two_multiline_arrays_do_not_form_valid_json() {
    let raw = "```json\n[\n{\"exercise\": \"a\"}\n]\n```\n```json\n[\n{\"exercise\": \"b\"}\n]\n```";
    assert_eq!(parse(raw), ParseOutcome::Unparseable);
  }

  #[test]
  fn top_level_object_is_rejected() {
    let raw = "```json\n{\n  \"exercise\": \"a...\", \"answer\": \"b\"\n}\n```";
    assert_eq!(parse(raw), ParseOutcome::Unparseable);
  }

  #[test]
  fn missing_fields_default_to_empty() {
    let raw = "```json\n[\n  {\"exercise\": \"Без ответа...\"},\n  {\"answer\": \"нн\"}\n]\n```";
    assert_eq!(parse(raw).into_exercises(), vec![rec("Без ответа...", ""), rec("", "нн")]);
  }

  #[test]
  fn non_string_values_and_non_objects_are_tolerated() {
    let raw = "```json\n[\n  {\"exercise\": \"Счёт: ...\", \"answer\": 2},\n  \"stray\",\n  {\"exercise\": null, \"answer\": true}\n]\n```";
    assert_eq!(
      parse(raw).into_exercises(),
      vec![rec("Счёт: ...", "2"), rec("", ""), rec("", "true")]
    );
  }

  #[test]
  fn crlf_line_endings_are_accepted() {
    let raw = "```json\r\n[\r\n  {\"exercise\": \"a...\", \"answer\": \"b\"}\r\n]\r\n```";
    assert_eq!(parse(raw).into_exercises(), vec![rec("a...", "b")]);
  }

  #[test]
  fn empty_array_is_a_successful_parse() {
    let raw = "```json\n[\n]\n```";
    assert_eq!(parse(raw), ParseOutcome::Parsed(Vec::new()));
  }
}
