//! Interview answer requests and their validation boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Free-form request metadata. Ordered so evaluation is deterministic.
pub type Metadata = BTreeMap<String, Value>;

/// One candidate answer to score.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewRequest {
    #[serde(default)]
    pub question_id: Option<String>,
    pub candidate_text: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Also return the feedback as synthesized speech
    #[serde(default)]
    pub speak_feedback: Option<bool>,
}

/// Question difficulty, selecting the expected answer length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "EASY" => Some(Difficulty::Easy),
            "MEDIUM" => Some(Difficulty::Medium),
            "HARD" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Target answer length in words (inclusive).
    pub fn word_band(self) -> (usize, usize) {
        match self {
            Difficulty::Easy => (30, 150),
            Difficulty::Medium => (50, 200),
            Difficulty::Hard => (80, 260),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Size limits enforced on inbound requests.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestLimits {
    pub max_candidate_chars: usize,
    pub max_question_id_chars: usize,
    pub max_metadata_entries: usize,
    pub max_metadata_key_chars: usize,
    pub max_metadata_value_bytes: usize,
    pub max_metadata_depth: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_candidate_chars: 20_000,
            max_question_id_chars: 128,
            max_metadata_entries: 32,
            max_metadata_key_chars: 64,
            max_metadata_value_bytes: 4096,
            max_metadata_depth: 4,
        }
    }
}

/// Reasons an interview request cannot be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationError {
    EmptyAnswer,
    AnswerTooLong { len: usize, max: usize },
    InvalidQuestionId(String),
    InvalidMetadata(String),
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationError::EmptyAnswer => write!(f, "candidateText must not be empty"),
            EvaluationError::AnswerTooLong { len, max } => {
                write!(f, "candidateText is {} characters (maximum: {})", len, max)
            }
            EvaluationError::InvalidQuestionId(msg) => write!(f, "invalid questionId: {}", msg),
            EvaluationError::InvalidMetadata(msg) => write!(f, "invalid metadata: {}", msg),
        }
    }
}

impl std::error::Error for EvaluationError {}

impl InterviewRequest {
    /// Check the request against `limits` and the known metadata keys.
    pub fn validate(&self, limits: &RequestLimits) -> Result<(), EvaluationError> {
        if self.candidate_text.trim().is_empty() {
            return Err(EvaluationError::EmptyAnswer);
        }
        let len = self.candidate_text.chars().count();
        if len > limits.max_candidate_chars {
            return Err(EvaluationError::AnswerTooLong {
                len,
                max: limits.max_candidate_chars,
            });
        }

        if let Some(id) = &self.question_id {
            validate_question_id(id, limits.max_question_id_chars)?;
        }

        validate_metadata(&self.metadata, limits)
    }

    /// `metadata.difficulty`, defaulting to medium.
    pub fn difficulty(&self) -> Difficulty {
        self.metadata
            .get("difficulty")
            .and_then(Value::as_str)
            .and_then(Difficulty::parse)
            .unwrap_or(Difficulty::Medium)
    }

    /// `metadata.keywords`, lower-cased, blanks dropped.
    pub fn keywords(&self) -> Vec<String> {
        match self.metadata.get("keywords") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn question_text(&self) -> Option<&str> {
        self.metadata
            .get("questionText")
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
    }
}

fn validate_question_id(id: &str, max_chars: usize) -> Result<(), EvaluationError> {
    if id.trim().is_empty() {
        return Err(EvaluationError::InvalidQuestionId("must not be blank".to_string()));
    }
    if id.chars().count() > max_chars {
        return Err(EvaluationError::InvalidQuestionId(format!(
            "longer than {} characters",
            max_chars
        )));
    }
    if id.chars().any(char::is_control) {
        return Err(EvaluationError::InvalidQuestionId(
            "contains control characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_metadata(metadata: &Metadata, limits: &RequestLimits) -> Result<(), EvaluationError> {
    if metadata.len() > limits.max_metadata_entries {
        return Err(EvaluationError::InvalidMetadata(format!(
            "{} entries (maximum: {})",
            metadata.len(),
            limits.max_metadata_entries
        )));
    }

    for (key, value) in metadata {
        if key.is_empty() || key.chars().count() > limits.max_metadata_key_chars {
            return Err(EvaluationError::InvalidMetadata(format!(
                "keys must be 1 to {} characters",
                limits.max_metadata_key_chars
            )));
        }

        let size = serde_json::to_string(value).map(|s| s.len()).unwrap_or(usize::MAX);
        if size > limits.max_metadata_value_bytes {
            return Err(EvaluationError::InvalidMetadata(format!(
                "value of '{}' is {} bytes (maximum: {})",
                key, size, limits.max_metadata_value_bytes
            )));
        }

        if depth(value) > limits.max_metadata_depth {
            return Err(EvaluationError::InvalidMetadata(format!(
                "value of '{}' is nested deeper than {} levels",
                key, limits.max_metadata_depth
            )));
        }
    }

    if let Some(value) = metadata.get("difficulty") {
        let valid = value.as_str().and_then(Difficulty::parse).is_some();
        if !valid {
            return Err(EvaluationError::InvalidMetadata(
                "difficulty must be one of EASY, MEDIUM, HARD".to_string(),
            ));
        }
    }

    if let Some(value) = metadata.get("keywords") {
        let valid = value
            .as_array()
            .map_or(false, |items| items.iter().all(Value::is_string));
        if !valid {
            return Err(EvaluationError::InvalidMetadata(
                "keywords must be an array of strings".to_string(),
            ));
        }
    }

    if let Some(value) = metadata.get("questionText") {
        if !value.is_string() {
            return Err(EvaluationError::InvalidMetadata(
                "questionText must be a string".to_string(),
            ));
        }
    }

    Ok(())
}

/// Nesting depth of a JSON value; scalars are depth 1.
fn depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        _ => 1,
    }
}
