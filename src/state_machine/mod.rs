mod job;
mod state;

pub use job::{CandidateText, JobOutcome, JobRun, RunReport, Stage};
pub use state::State;
