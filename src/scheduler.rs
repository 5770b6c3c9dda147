//! Time-of-day scheduling for the publication job.
//!
//! A [`Schedule`] is a set of local times in one timezone. The [`Scheduler`]
//! polls a [`Clock`] and fires its task whenever the next time arrives,
//! awaiting each firing to completion before looking for the next one.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::ScheduleConfig;
use crate::error::ConfigError;

/// Source of the current time and of delays.
#[allow(async_fn_in_trait)]
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Work the scheduler runs at each firing. Must not fail: anything that can
/// go wrong has to be handled inside.
#[allow(async_fn_in_trait)]
pub trait ScheduledTask {
    async fn fire(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    times: Vec<NaiveTime>,
    timezone: Tz,
}

impl Schedule {
    pub fn new(mut times: Vec<NaiveTime>, timezone: Tz) -> Result<Self, ConfigError> {
        if times.is_empty() {
            return Err(ConfigError::EmptySchedule);
        }
        times.sort();
        times.dedup();
        Ok(Self { times, timezone })
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ConfigError> {
        let timezone = Tz::from_str(config.timezone.trim())
            .map_err(|_| ConfigError::InvalidTimezone(config.timezone.clone()))?;
        let times = config
            .times
            .iter()
            .map(|raw| {
                NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| {
                    ConfigError::InvalidTime {
                        value: raw.clone(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(times, timezone)
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    /// First firing strictly after `after`. Local times that do not exist
    /// (DST gaps) are skipped; ambiguous ones resolve to the earlier instant.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local_date = after.with_timezone(&self.timezone).date_naive();
        for offset in 0..=7 {
            let date = local_date.checked_add_days(Days::new(offset))?;
            for time in &self.times {
                let Some(candidate) = date
                    .and_time(*time)
                    .and_local_timezone(self.timezone)
                    .earliest()
                else {
                    continue;
                };
                let candidate = candidate.with_timezone(&Utc);
                if candidate > after {
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// The next `count` firings after `after`, in local time.
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Tz>> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = after;
        while out.len() < count {
            let Some(next) = self.next_after(cursor) else {
                break;
            };
            out.push(next.with_timezone(&self.timezone));
            cursor = next;
        }
        out
    }
}

pub struct Scheduler<C: Clock> {
    schedule: Schedule,
    clock: C,
    poll_interval: Duration,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(schedule: Schedule, clock: C, poll_interval: Duration) -> Self {
        Self {
            schedule,
            clock,
            poll_interval: poll_interval.max(Duration::from_secs(1)),
        }
    }

    /// Fire `task` at every scheduled time until `shutdown` becomes `true`
    /// (or its sender is dropped). Returns the number of firings.
    ///
    /// Firings never overlap. Times that pass while a firing is still running
    /// are skipped rather than queued.
    pub async fn run<T: ScheduledTask>(&self, task: &T, mut shutdown: watch::Receiver<bool>) -> usize {
        let tz = self.schedule.timezone();
        let mut fired = 0;
        let mut next = self.schedule.next_after(self.clock.now());
        if let Some(due) = next {
            let times: Vec<String> = self
                .schedule
                .times()
                .iter()
                .map(|t| t.format("%H:%M").to_string())
                .collect();
            info!(
                times = %times.join(","),
                timezone = %tz,
                next_firing = %due.with_timezone(&tz),
                "Scheduler started"
            );
        }

        loop {
            if *shutdown.borrow() {
                break;
            }
            let Some(due) = next else {
                warn!("Schedule produced no further firing times, stopping");
                break;
            };

            let now = self.clock.now();
            if now >= due {
                info!(scheduled_for = %due.with_timezone(&tz), "Firing scheduled job");
                task.fire().await;
                fired += 1;
                next = self.schedule.next_after(self.clock.now());
                if let Some(n) = next {
                    info!(next_firing = %n.with_timezone(&tz), "Next firing scheduled");
                }
                continue;
            }

            let wait = (due - now)
                .to_std()
                .unwrap_or_default()
                .min(self.poll_interval);
            debug!(wait_secs = wait.as_secs(), "Waiting for next firing");
            tokio::select! {
                _ = self.clock.sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(firings = fired, "Scheduler stopped");
        fired
    }
}
