//! Periodic cycle triggering: fixed intervals or cron schedules, with an
//! optional immediate run at startup.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use tracing::{error, info, warn};

use crate::error::CycleError;
use crate::orchestrator::{CycleReport, OrchestratorStatus};

/// When the next cycle fires.
#[derive(Debug, Clone)]
pub enum Trigger {
    Interval(Duration),
    Cron(Box<Schedule>),
}

impl Trigger {
    /// Parse a cron expression. Five-field crontab expressions get a
    /// leading seconds field of `0`.
    pub fn cron(expression: &str) -> Result<Self> {
        let expression = expression.trim();
        let normalized = if expression.split_whitespace().count() == 5 {
            format!("0 {expression}")
        } else {
            expression.to_string()
        };
        let schedule = Schedule::from_str(&normalized)
            .with_context(|| format!("invalid cron expression '{expression}'"))?;
        Ok(Self::Cron(Box::new(schedule)))
    }

    /// Time to wait from `now` until the next firing. `None` when a cron
    /// schedule has no upcoming occurrence.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Self::Interval(every) => Some(*every),
            Self::Cron(schedule) => schedule
                .after(&now)
                .next()
                .map(|at| (at - now).to_std().unwrap_or_default()),
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interval(every) => write!(f, "every {}s", every.as_secs()),
            Self::Cron(schedule) => write!(f, "cron '{schedule}'"),
        }
    }
}

/// Anything the scheduler can fire.
#[allow(async_fn_in_trait)]
pub trait CycleRunner {
    async fn run_cycle(&self) -> Result<CycleReport, CycleError>;

    async fn status(&self) -> OrchestratorStatus;
}

pub struct Scheduler {
    trigger: Trigger,
    run_immediately: bool,
}

impl Scheduler {
    pub fn new(trigger: Trigger, run_immediately: bool) -> Self {
        Self {
            trigger,
            run_immediately,
        }
    }

    /// Fire cycles until `shutdown` resolves or the schedule runs out.
    ///
    /// The immediate run and the periodic loop proceed side by side; the
    /// runner is responsible for refusing overlapping cycles.
    pub async fn run<C, F>(&self, runner: &C, shutdown: F)
    where
        C: CycleRunner,
        F: Future<Output = ()>,
    {
        info!(trigger = %self.trigger, run_immediately = self.run_immediately, "scheduler started");

        let immediate = async {
            if self.run_immediately {
                fire(runner).await;
            }
        };

        let periodic = async {
            while let Some(delay) = self.trigger.next_delay(Utc::now()) {
                tokio::time::sleep(delay).await;
                fire(runner).await;
            }
            warn!("schedule has no further occurrences");
        };

        tokio::select! {
            _ = async { tokio::join!(immediate, periodic) } => {}
            _ = shutdown => info!("shutdown requested, scheduler stopping"),
        }
    }
}

/// Run one cycle, then log its outcome and the running totals. Cycle errors
/// never escape.
async fn fire<C: CycleRunner>(runner: &C) {
    match runner.run_cycle().await {
        Ok(report) => info!(
            generated = report.generated.len(),
            failed = report.failures.len(),
            "cycle finished"
        ),
        Err(CycleError::AlreadyRunning) => {
            warn!("previous cycle still running, trigger skipped");
            return;
        }
        Err(CycleError::FetchEmpty) => info!("no headlines this cycle"),
        Err(e) => error!("cycle aborted: {e}"),
    }

    let status = runner.status().await;
    info!(
        total_generated = status.total_generated,
        generated_today = status.generated_today,
        cycles_completed = status.cycles_completed,
        last_generation = ?status.last_generation,
        "scheduler status"
    );
}
