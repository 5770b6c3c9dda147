//! Terminal output for the interactive subcommands: spinner while waiting,
//! colored result lines.

use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::orchestrator::RunSummary;
use crate::state_machine::JobOutcome;

const INTENT_URL: &str = "https://twitter.com/intent/tweet";

/// Link that opens the web composer prefilled with `text`.
pub fn intent_link(text: &str) -> String {
    format!("{INTENT_URL}?text={}", urlencoding::encode(text))
}

pub struct Progress {
    pb: ProgressBar,
    green: Style,
    red: Style,
}

impl Progress {
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    /// Stop the spinner and show a generated text ready for manual posting.
    pub fn generated(&self, text: &str) {
        self.pb.finish_and_clear();
        println!("{} Generated post:", self.green.apply_to("✓"));
        println!();
        println!("{text}");
        println!();
        println!("Post it: {}", intent_link(text));
    }

    pub fn failed(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("{} {message}", self.red.apply_to("✗"));
    }
}

/// Outcome of a full job run.
pub fn print_summary(summary: &RunSummary) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let yellow = Style::new().yellow();

    let report = &summary.report;
    match summary.outcome {
        JobOutcome::Success => {
            println!("{} Published: {}", green.apply_to("✓"), report.reference.as_deref().unwrap_or("-"));
        }
        JobOutcome::NotificationFailed => {
            println!("{} Run finished but the report email could not be sent", yellow.apply_to("!"));
        }
        JobOutcome::GenerationFailed | JobOutcome::PublicationFailed => {
            println!(
                "{} Failed at {}: {}",
                red.apply_to("✗"),
                report.stage,
                report.detail.as_deref().unwrap_or("unknown error")
            );
        }
    }
    if let Some(text) = &report.text {
        println!("  {text}");
    }
    for warning in &report.warnings {
        println!("  {} {warning}", yellow.apply_to("!"));
    }
}

pub fn print_upcoming(firings: &[DateTime<Tz>]) {
    let dim = Style::new().dim();
    for firing in firings {
        println!("{}  {}", firing.format("%Y-%m-%d %H:%M %Z"), dim.apply_to(firing.to_rfc3339()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_link_encodes_text() {
        assert_eq!(
            intent_link("hello world & more"),
            "https://twitter.com/intent/tweet?text=hello%20world%20%26%20more"
        );
    }

    #[test]
    fn intent_link_encodes_non_ascii() {
        assert_eq!(
            intent_link("麻雀"),
            "https://twitter.com/intent/tweet?text=%E9%BA%BB%E9%9B%80"
        );
    }
}
