//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{ExerciseRecord, ExerciseSession, Notice, ScoreReport};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Topics,
    Prompt {
        #[serde(default)]
        topic: Option<String>,
    },
    Generate(GenerateIn),
    SetAnswer(AnswerIn),
    Check(CheckIn),
    GetSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Topics(TopicsOut),
    Prompt(PromptOut),
    Exercises(GenerateOut),
    AnswerSaved {
        position: usize,
    },
    Result(CheckOut),
    Session(SessionOut),
    Error {
        message: String,
    },
}

/// An exercise as shown before checking: the answer stays on the server.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExerciseOut {
    /// 0-based, used when submitting answers.
    pub position: usize,
    /// 1-based, for display.
    pub number: usize,
    pub exercise: String,
}

pub fn to_out(exercises: &[ExerciseRecord]) -> Vec<ExerciseOut> {
    exercises
        .iter()
        .enumerate()
        .map(|(i, e)| ExerciseOut { position: i, number: i + 1, exercise: e.prompt_text.clone() })
        .collect()
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Default, Deserialize)]
pub struct GenerateIn {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default, rename = "apiKey")]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateOut {
    /// Absent when nothing was generated and no session was given.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub topic: String,
    pub exercises: Vec<ExerciseOut>,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct SessionOut {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub topic: String,
    pub exercises: Vec<ExerciseOut>,
    pub answers: Vec<String>,
}

impl From<&ExerciseSession> for SessionOut {
    fn from(s: &ExerciseSession) -> Self {
        Self {
            session_id: s.id.clone(),
            topic: s.topic.clone(),
            exercises: to_out(&s.exercises),
            answers: s.answers.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub position: usize,
    pub answer: String,
}
#[derive(Serialize)]
pub struct AnswerOut {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct CheckIn {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(default)]
    pub answers: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct CheckOut {
    #[serde(flatten)]
    pub report: ScoreReport,
    /// "Итог: X из N правильных ответов"
    pub summary: String,
    pub message: String,
}

impl From<ScoreReport> for CheckOut {
    fn from(report: ScoreReport) -> Self {
        let summary = format!("Итог: {} из {} правильных ответов", report.correct_count, report.total);
        let message = report.verdict.message().to_string();
        Self { report, summary, message }
    }
}

#[derive(Debug, Deserialize)]
pub struct PromptQuery {
    pub topic: Option<String>,
}
#[derive(Debug, Serialize)]
pub struct PromptOut {
    pub topic: String,
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct TopicsOut {
    pub topics: Vec<String>,
    pub default_topic: String,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::score;

    #[test]
    fn exercises_out_hide_answers_and_number_from_one() {
        let out = to_out(&[ExerciseRecord::new("a...", "secret"), ExerciseRecord::new("b...", "x")]);
        assert_eq!(out[1], ExerciseOut { position: 1, number: 2, exercise: "b...".into() });
        let json = serde_json::to_string(&out).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn generate_in_accepts_camel_case_and_missing_fields() {
        let g: GenerateIn = serde_json::from_str(r#"{"sessionId": "s", "apiKey": "k"}"#).unwrap();
        assert_eq!(g.session_id.as_deref(), Some("s"));
        assert_eq!(g.api_key.as_deref(), Some("k"));
        assert!(g.topic.is_none());
    }

    #[test]
    fn ws_messages_are_tagged() {
        let m: ClientWsMessage =
            serde_json::from_str(r#"{"type": "set_answer", "sessionId": "s", "position": 0, "answer": "нн"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::SetAnswer(AnswerIn { position: 0, .. })));

        let out = serde_json::to_value(ServerWsMessage::AnswerSaved { position: 3 }).unwrap();
        assert_eq!(out["type"], "answer_saved");
        assert_eq!(out["position"], 3);
    }

    #[test]
    fn check_out_flattens_report_and_adds_summary() {
        let report = score(&[ExerciseRecord::new("a...", "н")], &["н".to_string()]);
        let v = serde_json::to_value(CheckOut::from(report)).unwrap();
        assert_eq!(v["correct_count"], 1);
        assert_eq!(v["verdict"], "perfect");
        assert_eq!(v["summary"], "Итог: 1 из 1 правильных ответов");
        assert_eq!(v["message"], "Отлично! Все ответы правильные!");
    }
}
