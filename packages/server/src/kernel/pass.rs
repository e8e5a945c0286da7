//! Worker pool and time budget shared by scheduler passes.
//!
//! A pass selects its tenders up front, then runs them through a bounded pool.
//! The budget is checked before each tender starts; a tender already running
//! always finishes, so a pass never stops halfway through one tender.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{error, warn};

use crate::common::{EngineResult, TenderId};

#[derive(Debug, Clone, Copy)]
pub struct PassBudget {
    started: Instant,
    budget: Duration,
}

impl PassBudget {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn exhausted(&self) -> bool {
        self.started.elapsed() >= self.budget
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub processed: usize,
    pub failed: usize,
    /// Tenders not started because the budget ran out.
    pub deferred: usize,
    pub emails: usize,
}

enum TenderRun {
    Done(usize),
    Failed,
    Deferred,
}

/// Run `work` for every tender, at most `concurrency` at a time.
/// `work` returns the number of emails it enqueued.
pub async fn run_tenders<F, Fut>(
    job: &'static str,
    tender_ids: Vec<TenderId>,
    concurrency: usize,
    budget: PassBudget,
    work: F,
) -> PassSummary
where
    F: Fn(TenderId) -> Fut,
    Fut: Future<Output = EngineResult<usize>>,
{
    let work = &work;
    let runs: Vec<TenderRun> = stream::iter(tender_ids)
        .map(|tender_id| async move {
            if budget.exhausted() {
                return TenderRun::Deferred;
            }
            match work(tender_id).await {
                Ok(emails) => TenderRun::Done(emails),
                Err(e) => {
                    error!(job, tender_id = %tender_id, error = %e, "Tender pass failed");
                    TenderRun::Failed
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut summary = PassSummary::default();
    for run in runs {
        match run {
            TenderRun::Done(emails) => {
                summary.processed += 1;
                summary.emails += emails;
            }
            TenderRun::Failed => summary.failed += 1,
            TenderRun::Deferred => summary.deferred += 1,
        }
    }

    if summary.deferred > 0 {
        warn!(job, deferred = summary.deferred, "Pass budget exhausted, remaining tenders left for next tick");
    }

    summary
}
