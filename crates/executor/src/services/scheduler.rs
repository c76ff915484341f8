use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, info, warn};

use common::SignalError;
use strategy::{BatchMode, SignalOrchestrator};

/// Daily wall-clock time, 24-hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TriggerTime {
    hour: u32,
    minute: u32,
}

impl FromStr for TriggerTime {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| {
            SignalError::Configuration(format!("invalid schedule time {:?}: {}", s, why))
        };

        let parts: Vec<&str> = s.trim().split(':').collect();
        let [hour, minute] = parts.as_slice() else {
            return Err(invalid("expected HH:MM"));
        };

        let hour: u32 = hour.trim().parse().map_err(|_| invalid("hour is not a number"))?;
        let minute: u32 = minute
            .trim()
            .parse()
            .map_err(|_| invalid("minute is not a number"))?;

        if hour > 23 || minute > 59 {
            return Err(invalid("out of range"));
        }

        Ok(Self { hour, minute })
    }
}

impl fmt::Display for TriggerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TriggerTime {
    /// First occurrence strictly after `now` in `tz`. Local times that do
    /// not exist on a given day (DST gaps) move on to the next day.
    pub fn next_after(&self, tz: &Tz, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
        let local_now = now.with_timezone(tz);
        let mut date = local_now.date_naive();

        for _ in 0..3 {
            let naive = date.and_hms_opt(self.hour, self.minute, 0)?;
            if let Some(at) = tz.from_local_datetime(&naive).earliest() {
                if at > local_now {
                    return Some(at);
                }
            }
            date = date.succ_opt()?;
        }
        None
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleInfo {
    pub timezone: String,
    pub configured_times: Vec<String>,
    pub active_jobs: usize,
    pub next_runs: Vec<DateTime<FixedOffset>>,
}

/// Fires a summary-only batch at each configured time of day.
pub struct TriggerScheduler {
    orchestrator: Arc<SignalOrchestrator>,
    timezone: Tz,
    configured_times: Vec<String>,
    triggers: Vec<TriggerTime>,
    jobs: Mutex<Vec<JoinHandle<()>>>,
}

impl TriggerScheduler {
    /// Malformed times are logged and dropped. An unknown timezone falls
    /// back to UTC.
    pub fn new(
        orchestrator: Arc<SignalOrchestrator>,
        times: &[String],
        timezone: &str,
    ) -> Self {
        let timezone = timezone.parse::<Tz>().unwrap_or_else(|e| {
            warn!("Unknown timezone {:?} ({}), using UTC", timezone, e);
            Tz::UTC
        });

        let mut triggers: Vec<TriggerTime> = times
            .iter()
            .filter_map(|raw| match raw.parse::<TriggerTime>() {
                Ok(t) => Some(t),
                Err(e) => {
                    error!("Skipping schedule entry: {}", e);
                    None
                }
            })
            .collect();
        triggers.sort();
        triggers.dedup();

        Self {
            orchestrator,
            timezone,
            configured_times: times.to_vec(),
            triggers,
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub async fn start(&self) {
        let mut jobs = self.jobs.lock().await;
        if !jobs.is_empty() {
            warn!("Scheduler already running");
            return;
        }

        for trigger in &self.triggers {
            jobs.push(tokio::spawn(run_trigger(
                *trigger,
                self.timezone,
                Arc::clone(&self.orchestrator),
            )));
        }

        info!(
            "Scheduler started with {} trigger(s) in {}: {}",
            jobs.len(),
            self.timezone.name(),
            self.triggers
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    /// Stops future firings. A batch that already started keeps running.
    pub async fn stop(&self) {
        let mut jobs = self.jobs.lock().await;
        for job in jobs.drain(..) {
            job.abort();
        }
        info!("Scheduler stopped");
    }

    pub async fn schedule_info(&self) -> ScheduleInfo {
        let active_jobs = self.jobs.lock().await.len();
        let now = Utc::now();

        let next_runs = if active_jobs == 0 {
            Vec::new()
        } else {
            self.triggers
                .iter()
                .filter_map(|t| t.next_after(&self.timezone, now))
                .map(|at| at.fixed_offset())
                .collect()
        };

        ScheduleInfo {
            timezone: self.timezone.name().to_string(),
            configured_times: self.configured_times.clone(),
            active_jobs,
            next_runs,
        }
    }
}

async fn run_trigger(trigger: TriggerTime, tz: Tz, orchestrator: Arc<SignalOrchestrator>) {
    // never fire the same occurrence twice, even if the clock lags the timer
    let mut last_fire = Utc::now();

    loop {
        let now = Utc::now().max(last_fire);
        let Some(next) = trigger.next_after(&tz, now) else {
            error!("No upcoming occurrence for trigger {}, stopping it", trigger);
            return;
        };
        let next = next.with_timezone(&Utc);

        let wait = (next - Utc::now()).to_std().unwrap_or_default();
        time::sleep(wait).await;
        last_fire = next;

        info!("Scheduled trigger {} fired", trigger);
        match orchestrator.spawn_batch(BatchMode::SummaryOnly) {
            Ok(ticket) => info!("[{}] Scheduled batch started", ticket.run_id),
            Err(e) => warn!("Skipping scheduled run at {}: {}", trigger, e),
        }
    }
}
