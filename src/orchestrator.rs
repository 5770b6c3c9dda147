//! The publication job: load history, generate, publish, log, notify.
//!
//! Each stage returns a `Result`; the first failure becomes the run's
//! report. Whatever happens, one report goes to the notifier.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::{self, AppConfig};
use crate::error::JobError;
use crate::gemini::{GenerationError, TextGenerator};
use crate::history::HistoryLog;
use crate::mail::{MailSettings, Notifier, NotifyError};
use crate::prompt::PromptTemplate;
use crate::scheduler::ScheduledTask;
use crate::state_machine::{CandidateText, JobOutcome, JobRun, RunReport, State};
use crate::twitter::{PublishError, PublishedPost, Publisher};

/// Policy knobs for a job run.
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Template the generation request is rendered from.
    pub prompt: PromptTemplate,
    /// Whether generation may use web-search grounding.
    pub grounding: bool,
    /// Optional line appended to every published post.
    pub footer: Option<String>,
    /// Upper bound on one generation call.
    pub generation_timeout: Duration,
    /// Upper bound on one publication call, username lookup included.
    pub publication_timeout: Duration,
    /// Prefix of every report subject.
    pub subject: String,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            prompt: PromptTemplate::default(),
            grounding: true,
            footer: None,
            generation_timeout: Duration::from_secs(90),
            publication_timeout: Duration::from_secs(30),
            subject: "Auto-post bot report".to_string(),
        }
    }
}

impl From<&AppConfig> for JobSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            prompt: config.prompt.clone(),
            grounding: config.generation.grounding,
            footer: config.publication.footer.clone(),
            generation_timeout: Duration::from_secs(config.generation.timeout_secs),
            publication_timeout: Duration::from_secs(config.publication.timeout_secs),
            subject: config.notification.subject.clone(),
        }
    }
}

/// What a run produced: the report that was (or should have been) sent,
/// and the final outcome including notification delivery.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report: RunReport,
    /// Differs from `report.outcome()` only when the report was not delivered.
    pub outcome: JobOutcome,
}

/// Ask `generator` for one post, bounded by `limit`. Empty or
/// whitespace-only output is a generation failure.
pub async fn generate_text(
    generator: &impl TextGenerator,
    prompt: &PromptTemplate,
    history: &[String],
    grounding: bool,
    limit: Duration,
) -> Result<String, GenerationError> {
    let request = prompt.request(history, grounding);
    let raw = timeout(limit, generator.generate(&request))
        .await
        .map_err(|_| GenerationError::Timeout(limit.as_secs()))??;
    if raw.trim().is_empty() {
        return Err(GenerationError::Empty);
    }
    Ok(raw)
}

/// Early exit from a run, with whatever text had been generated so far.
struct Failed {
    error: JobError,
    text: Option<String>,
}

impl Failed {
    fn new(error: impl Into<JobError>, text: Option<String>) -> Self {
        Self {
            error: error.into(),
            text,
        }
    }
}

/// The scheduled publication job, holding every collaborator it needs.
pub struct JobRunner<G, P, N> {
    /// Produces the post text.
    generator: G,
    /// Puts the text on the network.
    publisher: P,
    /// Receives the single report of each run.
    notifier: N,
    /// Read before generating, appended after publishing.
    history: HistoryLog,
    settings: JobSettings,
}

impl<G: TextGenerator, P: Publisher, N: Notifier> JobRunner<G, P, N> {
    pub fn new(generator: G, publisher: P, notifier: N, history: HistoryLog, settings: JobSettings) -> Self {
        Self {
            generator,
            publisher,
            notifier,
            history,
            settings,
        }
    }

    /// Run generate → publish → log → notify once. Never fails; every run
    /// ends with exactly one notification attempt.
    pub async fn run_once(&self) -> RunSummary {
        let mut run = JobRun::new();
        let span = info_span!("job", run_id = %run.id);
        async {
            info!("Job started");
            let mut warnings = Vec::new();

            let report = match self.execute(&mut run, &mut warnings).await {
                Ok((text, post)) => {
                    advance(&mut run, State::NotifyingSuccess);
                    info!(post_id = %post.id, url = %post.url, "Post published");
                    RunReport::success(&run, text, post.url, warnings)
                }
                Err(failed) => {
                    advance(&mut run, State::NotifyingFailure);
                    let report = RunReport::failure(&run, &failed.error, failed.text, warnings);
                    warn!(
                        stage = %report.stage,
                        error = report.detail.as_deref().unwrap_or_default(),
                        "Job failed"
                    );
                    report
                }
            };

            let outcome = self.notify(&report).await;
            advance(&mut run, State::Idle);
            info!(outcome = ?outcome, "Job finished");
            RunSummary { report, outcome }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        run: &mut JobRun,
        warnings: &mut Vec<String>,
    ) -> Result<(String, PublishedPost), Failed> {
        // LOADING_HISTORY: best-effort
        advance(run, State::LoadingHistory);
        let history = self.history.try_read_recent().unwrap_or_else(|e| {
            warn!(error = %e, "Continuing with empty history");
            warnings.push(e.to_string());
            Vec::new()
        });

        // GENERATING
        advance(run, State::Generating);
        let raw = generate_text(
            &self.generator,
            &self.settings.prompt,
            &history,
            self.settings.grounding,
            self.settings.generation_timeout,
        )
        .await
        .map_err(|e| Failed::new(e, None))?;

        // PUBLISHING
        advance(run, State::Publishing);
        let candidate = CandidateText::new(raw.clone()).map_err(|e| Failed::new(e, Some(raw)))?;
        let text = candidate.with_footer(self.settings.footer.as_deref());
        debug!(chars = candidate.char_count(), "Publishing generated text");
        let post = self
            .publish(&text)
            .await
            .map_err(|e| Failed::new(e, Some(text.clone())))?;

        // LOGGING: the post exists now, so a write failure only warns.
        advance(run, State::Logging);
        if let Err(e) = self.history.append(candidate.as_str()) {
            error!(path = %self.history.path().display(), error = %e, "History append failed");
            warnings.push(e.to_string());
        }

        Ok((text, post))
    }

    async fn publish(&self, text: &str) -> Result<PublishedPost, PublishError> {
        let limit = self.settings.publication_timeout;
        timeout(limit, self.publisher.publish(text))
            .await
            .map_err(|_| PublishError::Timeout(limit.as_secs()))?
    }

    async fn notify(&self, report: &RunReport) -> JobOutcome {
        let subject = report.subject(&self.settings.subject);
        match self.notifier.notify(&subject, &report.body()).await {
            Ok(()) => report.outcome(),
            Err(e) => {
                // No other channel left; the log is all there is.
                error!(error = %e, subject = %subject, "Failed to send run report");
                JobOutcome::NotificationFailed
            }
        }
    }
}

impl<G: TextGenerator, P: Publisher, N: Notifier> ScheduledTask for JobRunner<G, P, N> {
    async fn fire(&self) {
        self.run_once().await;
    }
}

/// Mail a startup failure, provided the mail settings in `lookup` are
/// complete on their own. `connect` builds the notifier from them. Returns
/// whether the report was delivered.
pub async fn report_startup_failure<N, F>(
    lookup: &dyn Fn(&str) -> Option<String>,
    connect: F,
    subject_prefix: &str,
    detail: &str,
) -> bool
where
    N: Notifier,
    F: FnOnce(&MailSettings) -> Result<N, NotifyError>,
{
    let Some(settings) = config::mail_settings(lookup) else {
        warn!("Mail settings incomplete, startup failure was not reported by email");
        return false;
    };
    let notifier = match connect(&settings) {
        Ok(notifier) => notifier,
        Err(e) => {
            error!(error = %e, "Could not set up mail transport for startup report");
            return false;
        }
    };

    let report = RunReport::startup_failure(detail);
    match notifier.notify(&report.subject(subject_prefix), &report.body()).await {
        Ok(()) => {
            info!("Startup failure reported by email");
            true
        }
        Err(e) => {
            error!(error = %e, "Failed to send startup failure report");
            false
        }
    }
}

fn advance(run: &mut JobRun, next: State) {
    if let Err(e) = run.advance(next) {
        error!(error = %e, "Job state machine rejected transition");
    }
}
