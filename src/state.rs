use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// State threaded through a graph run, mutated only by merging partial updates.
///
/// The engine never inspects the state itself; it only needs to merge a step's
/// returned [`Update`](GraphState::Update) into it and, for faults it contains
/// on the step's behalf, synthesize an update carrying a single diagnostic
/// message.
///
/// `apply` must be pure with respect to its inputs: same state and update
/// produce a structurally equal result, and nothing else is observable. This
/// is what makes runs replayable and the reducer unit-testable in isolation.
pub trait GraphState: Send + Sync + Sized + 'static {
    /// Partial update returned by a step. Absent fields leave the state
    /// untouched; sequence fields append rather than replace.
    type Update: Send + 'static;

    /// Merges `update` into the state and returns the result.
    #[must_use]
    fn apply(self, update: Self::Update) -> Self;

    /// Builds an update whose only effect is appending one diagnostic message
    /// to the error sequence. Used by the driver for escaped step faults and
    /// iteration exhaustion.
    fn error_update(message: impl Into<String>) -> Self::Update;
}

/// A generated question, optionally answered by a later step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub category: String,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// A derived answer to a previously generated question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub category: String,
}

/// Outcome discriminator for a per-step execution log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Error,
    Skipped,
}

/// One execution-log record contributed by a step.
///
/// Steps are expected to report anticipated failures through these records
/// (plus an error entry) instead of returning `Err`, so that routing
/// functions can inspect what happened and decide whether to continue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepLog {
    /// Name the step was registered under.
    pub step: String,
    /// Human-readable purpose, e.g. "Data Validation & Normalization".
    pub role: String,
    /// Resource cost of the step, e.g. model tokens consumed.
    pub tokens_used: u64,
    pub elapsed_ms: u64,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepLog {
    pub fn success(
        step: impl Into<String>,
        role: impl Into<String>,
        tokens_used: u64,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            step: step.into(),
            role: role.into(),
            tokens_used,
            elapsed_ms,
            status: StepStatus::Success,
            error: None,
        }
    }

    pub fn failure(
        step: impl Into<String>,
        role: impl Into<String>,
        elapsed_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            step: step.into(),
            role: role.into(),
            tokens_used: 0,
            elapsed_ms,
            status: StepStatus::Error,
            error: Some(error.into()),
        }
    }
}

/// State for the content-generation pipeline.
///
/// Field semantics under [`apply`](GraphState::apply):
/// - identity fields are write-once: they are set by [`PipelineState::new`]
///   and [`StateUpdate`] has no way to touch them
/// - nullable payload fields replace: a later step may overwrite what an
///   earlier step wrote
/// - `questions`, `answers`, `step_logs` and `errors` accumulate: updates
///   append, never shorten or reorder
/// - `memory` is a scratch map with shallow merge, update winning per key
/// - `retry_count` replaces; steps bump it by convention when they record a
///   fault, and only routing functions give it meaning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub execution_id: String,
    pub generation_id: String,
    pub subject_id: String,
    pub started_at_ms: u64,

    pub raw_subject: Option<serde_json::Value>,
    pub parsed_subject: Option<serde_json::Value>,

    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,

    pub faq_page: Option<serde_json::Value>,
    pub subject_page: Option<serde_json::Value>,
    pub comparison_page: Option<serde_json::Value>,
    pub competitor_subject: Option<serde_json::Value>,

    pub step_logs: Vec<StepLog>,
    pub errors: Vec<String>,
    pub retry_count: u32,

    pub memory: HashMap<String, serde_json::Value>,
}

impl PipelineState {
    /// Creates the initial state for one run: fresh execution id, current
    /// timestamp, all accumulating sequences empty.
    pub fn new(subject_id: impl Into<String>, raw_subject: serde_json::Value) -> Self {
        let execution_id = uuid::Uuid::new_v4().to_string();
        let started_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            generation_id: execution_id.clone(),
            execution_id,
            subject_id: subject_id.into(),
            started_at_ms,
            raw_subject: Some(raw_subject),
            parsed_subject: None,
            questions: Vec::new(),
            answers: Vec::new(),
            faq_page: None,
            subject_page: None,
            comparison_page: None,
            competitor_subject: None,
            step_logs: Vec::new(),
            errors: Vec::new(),
            retry_count: 0,
            memory: HashMap::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// True when at least one page artifact was produced.
    pub fn any_page(&self) -> bool {
        self.faq_page.is_some() || self.subject_page.is_some() || self.comparison_page.is_some()
    }
}

/// Partial update to a [`PipelineState`].
///
/// `None`/empty fields leave the state untouched. Identity fields are absent
/// on purpose: no step can rewrite them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub raw_subject: Option<serde_json::Value>,
    pub parsed_subject: Option<serde_json::Value>,
    pub faq_page: Option<serde_json::Value>,
    pub subject_page: Option<serde_json::Value>,
    pub comparison_page: Option<serde_json::Value>,
    pub competitor_subject: Option<serde_json::Value>,

    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,
    pub step_logs: Vec<StepLog>,
    pub errors: Vec<String>,

    pub retry_count: Option<u32>,
    pub memory: HashMap<String, serde_json::Value>,
}

impl StateUpdate {
    /// Update that appends a single error message and changes nothing else.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            ..Self::default()
        }
    }
}

impl GraphState for PipelineState {
    type Update = StateUpdate;

    fn apply(mut self, update: StateUpdate) -> Self {
        if let Some(v) = update.raw_subject {
            self.raw_subject = Some(v);
        }
        if let Some(v) = update.parsed_subject {
            self.parsed_subject = Some(v);
        }
        if let Some(v) = update.faq_page {
            self.faq_page = Some(v);
        }
        if let Some(v) = update.subject_page {
            self.subject_page = Some(v);
        }
        if let Some(v) = update.comparison_page {
            self.comparison_page = Some(v);
        }
        if let Some(v) = update.competitor_subject {
            self.competitor_subject = Some(v);
        }

        // Sequence fields accumulate, in contribution order, duplicates kept.
        self.questions.extend(update.questions);
        self.answers.extend(update.answers);
        self.step_logs.extend(update.step_logs);
        self.errors.extend(update.errors);

        if let Some(n) = update.retry_count {
            self.retry_count = n;
        }
        // Shallow merge, update wins per key; existing keys are never removed.
        self.memory.extend(update.memory);

        self
    }

    fn error_update(message: impl Into<String>) -> StateUpdate {
        StateUpdate::error(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> PipelineState {
        PipelineState::new("subject-1", json!({"name": "Vitamin C Serum"}))
    }

    #[test]
    fn test_initial_state_defaults() {
        let s = state();
        assert_eq!(s.generation_id, s.execution_id);
        assert_eq!(s.subject_id, "subject-1");
        assert!(s.raw_subject.is_some());
        assert!(s.parsed_subject.is_none());
        assert!(s.questions.is_empty());
        assert!(s.answers.is_empty());
        assert!(s.step_logs.is_empty());
        assert!(s.errors.is_empty());
        assert!(s.memory.is_empty());
        assert_eq!(s.retry_count, 0);
    }

    #[test]
    fn test_apply_accumulates_sequences() {
        let s = state().apply(StateUpdate {
            errors: vec!["first".into()],
            ..Default::default()
        });
        let s = s.apply(StateUpdate {
            errors: vec!["second".into(), "second".into()],
            answers: vec![Answer {
                question: "q".into(),
                answer: "a".into(),
                category: "usage".into(),
            }],
            ..Default::default()
        });

        // Order and duplicates preserved, nothing dropped.
        assert_eq!(s.errors, vec!["first", "second", "second"]);
        assert_eq!(s.answers.len(), 1);
    }

    #[test]
    fn test_apply_empty_update_is_identity() {
        let before = state();
        let after = before.clone().apply(StateUpdate::default());
        assert_eq!(before, after);
    }

    #[test]
    fn test_apply_replace_fields() {
        let s = state().apply(StateUpdate {
            parsed_subject: Some(json!({"name": "parsed"})),
            ..Default::default()
        });
        assert_eq!(s.parsed_subject, Some(json!({"name": "parsed"})));

        // A later step may overwrite an earlier value.
        let s = s.apply(StateUpdate {
            parsed_subject: Some(json!({"name": "reparsed"})),
            ..Default::default()
        });
        assert_eq!(s.parsed_subject, Some(json!({"name": "reparsed"})));

        // An absent field is left untouched.
        let s = s.apply(StateUpdate::default());
        assert_eq!(s.parsed_subject, Some(json!({"name": "reparsed"})));
        assert_eq!(s.raw_subject, Some(json!({"name": "Vitamin C Serum"})));
    }

    #[test]
    fn test_apply_memory_shallow_merge() {
        let mut first = HashMap::new();
        first.insert("validated".to_string(), json!(true));
        first.insert("attempt".to_string(), json!(1));

        let mut second = HashMap::new();
        second.insert("attempt".to_string(), json!(2));
        second.insert("cached".to_string(), json!(false));

        let s = state()
            .apply(StateUpdate {
                memory: first,
                ..Default::default()
            })
            .apply(StateUpdate {
                memory: second,
                ..Default::default()
            });

        // Update wins on conflicts, untouched keys survive.
        assert_eq!(s.memory.get("validated"), Some(&json!(true)));
        assert_eq!(s.memory.get("attempt"), Some(&json!(2)));
        assert_eq!(s.memory.get("cached"), Some(&json!(false)));
        assert_eq!(s.memory.len(), 3);
    }

    #[test]
    fn test_apply_retry_count_replaces() {
        let s = state().apply(StateUpdate {
            retry_count: Some(2),
            ..Default::default()
        });
        assert_eq!(s.retry_count, 2);

        let s = s.apply(StateUpdate::default());
        assert_eq!(s.retry_count, 2);
    }

    #[test]
    fn test_apply_is_deterministic() {
        let base = state();
        let update = StateUpdate {
            errors: vec!["boom".into()],
            parsed_subject: Some(json!({"ok": true})),
            ..Default::default()
        };
        let a = base.clone().apply(update.clone());
        let b = base.apply(update);
        assert_eq!(a, b);
    }

    #[test]
    fn test_error_update_appends_exactly_one_message() {
        let s = state().apply(PipelineState::error_update("step \"x\" failed"));
        assert_eq!(s.errors, vec!["step \"x\" failed"]);
        assert!(s.step_logs.is_empty());
        assert!(s.parsed_subject.is_none());
    }

    #[test]
    fn test_step_log_constructors() {
        let ok = StepLog::success("data_parser", "Data Validation", 420, 1200);
        assert_eq!(ok.status, StepStatus::Success);
        assert_eq!(ok.tokens_used, 420);
        assert!(ok.error.is_none());

        let bad = StepLog::failure("data_parser", "Data Validation", 30, "upstream 500");
        assert_eq!(bad.status, StepStatus::Error);
        assert_eq!(bad.tokens_used, 0);
        assert_eq!(bad.error.as_deref(), Some("upstream 500"));
    }
}
