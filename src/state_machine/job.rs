use std::fmt;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::state::{InvalidTransition, State, StateMachine};
use crate::error::{JobError, describe};

/// Characters stripped from both ends of generated text, together with whitespace.
const QUOTES: &[char] = &['"', '\'', '“', '”', '‘', '’', '「', '」', '『', '』', '`'];

/// The stage a run had reached when its report was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Startup,
    Generation,
    Publication,
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Startup => write!(f, "startup"),
            Stage::Generation => write!(f, "generation"),
            Stage::Publication => write!(f, "publication"),
            Stage::Completed => write!(f, "completed"),
        }
    }
}

/// Final classification of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    GenerationFailed,
    PublicationFailed,
    /// The run itself finished but its report could not be delivered.
    NotificationFailed,
    Success,
}

/// One generated text, cleaned and ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateText {
    text: String,
}

impl CandidateText {
    /// Clean `raw` and reject it if nothing is left.
    pub fn new(raw: impl Into<String>) -> Result<Self, JobError> {
        let raw = raw.into();
        let text = clean(&raw).to_string();
        if text.is_empty() {
            return Err(JobError::EmptyContent);
        }
        Ok(Self { text })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters, not bytes.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// The text as it goes out, with the optional footer on its own line.
    pub fn with_footer(&self, footer: Option<&str>) -> String {
        match footer.map(str::trim).filter(|f| !f.is_empty()) {
            Some(footer) => format!("{}\n{footer}", self.text),
            None => self.text.clone(),
        }
    }
}

/// Strip surrounding whitespace and quote characters until stable.
pub fn clean(raw: &str) -> &str {
    let mut current = raw;
    loop {
        let next = current.trim().trim_matches(QUOTES);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// A single run of the publication job, tracking its state transitions.
#[derive(Debug, Clone)]
pub struct JobRun {
    pub id: Uuid,
    pub state: State,
    pub state_history: Vec<State>,
    pub started_at: DateTime<Utc>,
}

impl Default for JobRun {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRun {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: State::Idle,
            state_history: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Move to `next`, recording the state being left.
    pub fn advance(&mut self, next: State) -> Result<(), InvalidTransition> {
        StateMachine::check(self.state, next)?;
        self.state_history.push(self.state);
        self.state = next;
        Ok(())
    }

    /// Every state visited so far, including the current one.
    pub fn transitions(&self) -> Vec<State> {
        let mut all = self.state_history.clone();
        all.push(self.state);
        all
    }
}

/// The single human-readable outcome of a run, sent to the operator.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub stage: Stage,
    pub is_error: bool,
    pub text: Option<String>,
    pub reference: Option<String>,
    pub detail: Option<String>,
    pub warnings: Vec<String>,
    pub state_transitions: Vec<State>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl RunReport {
    fn base(run: &JobRun, stage: Stage, is_error: bool) -> Self {
        let now = Utc::now();
        Self {
            run_id: run.id.to_string(),
            stage,
            is_error,
            text: None,
            reference: None,
            detail: None,
            warnings: Vec::new(),
            state_transitions: run.transitions(),
            started_at: run.started_at,
            completed_at: now,
            duration_ms: (now - run.started_at).num_milliseconds(),
        }
    }

    pub fn success(run: &JobRun, text: String, reference: String, warnings: Vec<String>) -> Self {
        Self {
            text: Some(text),
            reference: Some(reference),
            warnings,
            ..Self::base(run, Stage::Completed, false)
        }
    }

    pub fn failure(run: &JobRun, error: &JobError, text: Option<String>, warnings: Vec<String>) -> Self {
        Self {
            text,
            detail: Some(describe(error)),
            warnings,
            ..Self::base(run, error.stage(), true)
        }
    }

    /// Report for a process that could not start at all.
    pub fn startup_failure(detail: impl fmt::Display) -> Self {
        let run = JobRun::new();
        Self {
            detail: Some(detail.to_string()),
            state_transitions: Vec::new(),
            ..Self::base(&run, Stage::Startup, true)
        }
    }

    pub fn outcome(&self) -> JobOutcome {
        match (self.is_error, self.stage) {
            (false, _) => JobOutcome::Success,
            (true, Stage::Publication) => JobOutcome::PublicationFailed,
            (true, _) => JobOutcome::GenerationFailed,
        }
    }

    pub fn subject(&self, prefix: &str) -> String {
        if self.is_error {
            format!("{prefix} [ERROR: {}]", self.stage)
        } else {
            format!("{prefix} [OK]")
        }
    }

    /// Plaintext body for the notification message.
    pub fn body(&self) -> String {
        let mut out = String::new();
        if self.is_error {
            out.push_str("An error occurred while running the auto-post job.\n\n");
        } else {
            out.push_str("The post was published successfully.\n\n");
        }

        let _ = writeln!(out, "- Stage: {}", self.stage);
        let _ = writeln!(out, "- Error: {}", if self.is_error { "yes" } else { "no" });
        if let Some(text) = &self.text {
            let _ = writeln!(out, "- Text: {text}");
        }
        if let Some(reference) = &self.reference {
            let _ = writeln!(out, "- Link: {reference}");
        }
        if let Some(detail) = &self.detail {
            let _ = writeln!(out, "- Detail: {detail}");
        }
        if !self.warnings.is_empty() {
            out.push_str("- Warnings:\n");
            for warning in &self.warnings {
                let _ = writeln!(out, "    {warning}");
            }
        }

        out.push('\n');
        let _ = writeln!(out, "Run: {}", self.run_id);
        let _ = writeln!(
            out,
            "Started: {} ({} ms)",
            self.started_at.to_rfc3339(),
            self.duration_ms
        );
        if !self.state_transitions.is_empty() {
            let states: Vec<String> = self.state_transitions.iter().map(|s| s.to_string()).collect();
            let _ = writeln!(out, "States: {}", states.join(" → "));
        }
        out
    }
}
