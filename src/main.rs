mod cli;
mod config;
mod error;
mod gemini;
mod history;
mod mail;
mod orchestrator;
mod prompt;
mod scheduler;
mod state_machine;
mod twitter;
mod ui;

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use config::{AppConfig, Credentials, NotificationConfig};
use gemini::GeminiClient;
use history::HistoryLog;
use mail::SmtpNotifier;
use orchestrator::{JobRunner, JobSettings, generate_text};
use scheduler::{Schedule, Scheduler, SystemClock};
use state_machine::{CandidateText, JobOutcome};
use twitter::TwitterClient;
use ui::Progress;

type LiveRunner = JobRunner<GeminiClient, TwitterClient, SmtpNotifier>;

struct Startup {
    config: AppConfig,
    schedule: Schedule,
    runner: LiveRunner,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "autopost=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run => {
            let Startup { config, schedule, runner } = startup_or_report(config_path).await?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received, stopping after the current run");
                    let _ = shutdown_tx.send(true);
                }
            });

            let poll = Duration::from_secs(config.schedule.poll_interval_secs);
            Scheduler::new(schedule, SystemClock, poll).run(&runner, shutdown_rx).await;
            Ok(ExitCode::SUCCESS)
        }
        Command::Once => {
            let Startup { runner, .. } = startup_or_report(config_path).await?;
            let summary = runner.run_once().await;
            ui::print_summary(&summary);
            Ok(match summary.outcome {
                JobOutcome::Success => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            })
        }
        Command::Generate { no_history } => {
            let config = AppConfig::load(config_path).context("failed to load configuration")?;
            let api_key = config::gemini_api_key(&|name| std::env::var(name).ok())?;
            let generator = GeminiClient::new(api_key, config.generation.model.clone())?;
            let history = HistoryLog::new(&config.history.path, config.history.limit);
            let recent = if no_history { Vec::new() } else { history.read_recent() };

            let progress = Progress::start("Generating...");
            let settings = JobSettings::from(&config);
            let result = generate_text(
                &generator,
                &settings.prompt,
                &recent,
                settings.grounding,
                settings.generation_timeout,
            )
            .await;

            let candidate = result
                .map_err(anyhow::Error::from)
                .and_then(|raw| CandidateText::new(raw).map_err(Into::into));
            match candidate {
                Ok(candidate) => {
                    progress.generated(&candidate.with_footer(settings.footer.as_deref()));
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    progress.failed(&format!("{e:#}"));
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Next { count } => {
            let config = AppConfig::load(config_path).context("failed to load configuration")?;
            let schedule = Schedule::from_config(&config.schedule)?;
            ui::print_upcoming(&schedule.upcoming(Utc::now(), count));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn startup(config_path: Option<&Path>) -> anyhow::Result<Startup> {
    let config = AppConfig::load(config_path).context("failed to load configuration")?;
    let schedule = Schedule::from_config(&config.schedule)?;
    let credentials = Credentials::from_env()?;

    let generator = GeminiClient::new(credentials.gemini_api_key, config.generation.model.clone())?;
    let publisher = TwitterClient::new(credentials.twitter)?;
    let notifier = SmtpNotifier::new(&credentials.mail)?;
    let history = HistoryLog::new(&config.history.path, config.history.limit);
    let settings = JobSettings::from(&config);

    info!(
        model = %config.generation.model,
        history = %history.path().display(),
        timezone = %schedule.timezone(),
        "Configuration loaded"
    );

    let runner = JobRunner::new(generator, publisher, notifier, history, settings);
    Ok(Startup { config, schedule, runner })
}

/// Like [`startup`], but a failure is also mailed when the mail settings
/// themselves are usable.
async fn startup_or_report(config_path: Option<&Path>) -> anyhow::Result<Startup> {
    match startup(config_path) {
        Ok(startup) => Ok(startup),
        Err(e) => {
            report_startup_failure(config_path, &e).await;
            Err(e)
        }
    }
}

async fn report_startup_failure(config_path: Option<&Path>, err: &anyhow::Error) {
    // The config file may be the thing that failed; fall back to the default subject.
    let subject = AppConfig::load(config_path)
        .map(|c| c.notification.subject)
        .unwrap_or_else(|_| NotificationConfig::default().subject);
    orchestrator::report_startup_failure(
        &|name| std::env::var(name).ok(),
        SmtpNotifier::new,
        &subject,
        &format!("{err:#}"),
    )
    .await;
}
