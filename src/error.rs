use thiserror::Error;

use crate::gemini::GenerationError;
use crate::state_machine::Stage;
use crate::twitter::PublishError;

/// Startup configuration failures. These are the only errors allowed to
/// terminate the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error("invalid time of day `{value}` (expected HH:MM)")]
    InvalidTime { value: String },

    #[error("unknown timezone `{0}`")]
    InvalidTimezone(String),

    #[error("schedule has no times configured")]
    EmptySchedule,

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failures touching the publication history log. Neither variant fails a run.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read history log: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to append to history log: {0}")]
    Write(#[source] std::io::Error),
}

/// Errors that end a job run before anything is published.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("generated text is empty after trimming")]
    EmptyContent,

    #[error("publication failed: {0}")]
    Publication(#[from] PublishError),
}

impl JobError {
    /// The stage the run had reached when this error occurred.
    pub fn stage(&self) -> Stage {
        match self {
            JobError::Generation(_) => Stage::Generation,
            JobError::EmptyContent | JobError::Publication(_) => Stage::Publication,
        }
    }
}

/// `error` followed by each underlying cause, separated by `: `. A cause
/// whose text already appears in the outer messages is not repeated.
pub fn describe(error: &(dyn std::error::Error + 'static)) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, Error)]
    #[error("tcp connect error")]
    struct Connect(#[source] io::Error);

    #[test]
    fn missing_env_lists_every_name() {
        let err = ConfigError::MissingEnv(vec!["GEMINI_API_KEY".into(), "MAIL_ADDRESS".into()]);
        assert_eq!(
            err.to_string(),
            "missing required environment variables: GEMINI_API_KEY, MAIL_ADDRESS"
        );
    }

    #[test]
    fn job_error_maps_to_stage() {
        assert_eq!(
            JobError::Generation(GenerationError::Empty).stage(),
            Stage::Generation
        );
        assert_eq!(JobError::EmptyContent.stage(), Stage::Publication);
        assert_eq!(
            JobError::Publication(PublishError::MissingId).stage(),
            Stage::Publication
        );
    }

    #[test]
    fn describe_appends_hidden_causes() {
        let err = Connect(io::Error::new(io::ErrorKind::ConnectionRefused, "Connection refused"));
        assert_eq!(describe(&err), "tcp connect error: Connection refused");
    }

    #[test]
    fn describe_does_not_repeat_inlined_causes() {
        let err = HistoryError::Read(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(describe(&err), "failed to read history log: denied");
    }

    #[test]
    fn describe_reaches_transport_root_cause() {
        let inner = reqwest::Client::new()
            .get("http://[::1")
            .build()
            .unwrap_err();
        let mut deepest: &(dyn std::error::Error + 'static) = &inner;
        while let Some(next) = deepest.source() {
            deepest = next;
        }
        let root = deepest.to_string();

        let err = JobError::Publication(PublishError::Network(inner));
        let text = describe(&err);
        assert!(text.starts_with("publication failed: network error: "), "{text}");
        assert!(text.contains(&root), "{text}");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<JobError>();
        assert_send_sync::<ConfigError>();
    }
}
