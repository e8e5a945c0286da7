//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! The scheduler only supplies ticks. Every job selects its work from
//! persisted state at the tick's `now`, so a missed or repeated tick is
//! harmless. Schedules are read on Paris time:
//!
//! ```text
//! every 5 min, office hours  ─► run_dispatch_pass(now)
//! weekdays 09:00             ─► click reminders, interest reminder, top suppliers
//! daily 09:00                ─► author survey (+ reminder), supplier survey, auto-reject
//! ```

use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::dispatch::run_dispatch_pass;
use crate::domains::followups::FollowupJob;
use crate::kernel::ServerDeps;

pub const DISPATCH_SCHEDULE: &str = "0 */5 8-19 * * Mon-Fri";
pub const WEEKDAY_FOLLOWUPS_SCHEDULE: &str = "0 0 9 * * Mon-Fri";
pub const DAILY_FOLLOWUPS_SCHEDULE: &str = "0 0 9 * * *";
pub const SCHEDULER_TIMEZONE: Tz = chrono_tz::Europe::Paris;

/// Start all scheduled tasks
pub async fn start_scheduler(deps: Arc<ServerDeps>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let dispatch_deps = deps.clone();
    let dispatch_job = Job::new_async_tz(DISPATCH_SCHEDULE, SCHEDULER_TIMEZONE, move |_uuid, _lock| {
        let deps = dispatch_deps.clone();
        Box::pin(async move {
            if let Err(e) = run_dispatch_pass(Utc::now(), &deps).await {
                tracing::error!(error = %e, "Dispatch pass failed");
            }
        })
    })?;
    scheduler.add(dispatch_job).await?;

    for job in FollowupJob::ALL {
        let schedule = if job.weekdays_only() {
            WEEKDAY_FOLLOWUPS_SCHEDULE
        } else {
            DAILY_FOLLOWUPS_SCHEDULE
        };
        let job_deps = deps.clone();
        let cron_job = Job::new_async_tz(schedule, SCHEDULER_TIMEZONE, move |_uuid, _lock| {
            let deps = job_deps.clone();
            Box::pin(async move {
                run_followup(job, &deps).await;
            })
        })?;
        scheduler.add(cron_job).await?;
    }

    scheduler.start().await?;

    tracing::info!(
        dispatch = DISPATCH_SCHEDULE,
        timezone = %SCHEDULER_TIMEZONE,
        followups = FollowupJob::ALL.len(),
        "Scheduled tasks started"
    );
    Ok(scheduler)
}

async fn run_followup(job: FollowupJob, deps: &ServerDeps) {
    tracing::info!(job = job.name(), "Running follow-up job");

    match job.run(Utc::now(), deps).await {
        Ok(summary) => tracing::info!(
            job = job.name(),
            processed = summary.processed,
            failed = summary.failed,
            deferred = summary.deferred,
            emails = summary.emails,
            "Follow-up job complete"
        ),
        Err(e) => tracing::error!(job = job.name(), error = %e, "Follow-up job failed"),
    }
}
