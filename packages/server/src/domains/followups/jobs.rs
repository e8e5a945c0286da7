//! The daily follow-up jobs, addressable by name from the scheduler and from
//! `run_job`.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use super::activities::{
    auto_reject_stale_drafts, send_author_survey_reminders, send_author_surveys, send_click_reminders,
    send_interest_reminders, send_supplier_surveys, send_top_suppliers,
};
use crate::common::EngineResult;
use crate::kernel::{PassSummary, ServerDeps};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowupJob {
    ClickReminder2d,
    ClickReminder3d,
    ClickReminder4d,
    InterestReminder2d,
    TopSuppliers,
    AuthorSurvey,
    AuthorSurveyReminder,
    SupplierSurvey,
    AutoReject,
}

impl FollowupJob {
    pub const ALL: [FollowupJob; 9] = [
        FollowupJob::ClickReminder2d,
        FollowupJob::ClickReminder3d,
        FollowupJob::ClickReminder4d,
        FollowupJob::InterestReminder2d,
        FollowupJob::TopSuppliers,
        FollowupJob::AuthorSurvey,
        FollowupJob::AuthorSurveyReminder,
        FollowupJob::SupplierSurvey,
        FollowupJob::AutoReject,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FollowupJob::ClickReminder2d => "click-reminder-2d",
            FollowupJob::ClickReminder3d => "click-reminder-3d",
            FollowupJob::ClickReminder4d => "click-reminder-4d",
            FollowupJob::InterestReminder2d => "interest-reminder-2d",
            FollowupJob::TopSuppliers => "top-suppliers",
            FollowupJob::AuthorSurvey => "author-survey",
            FollowupJob::AuthorSurveyReminder => "author-survey-reminder",
            FollowupJob::SupplierSurvey => "supplier-survey",
            FollowupJob::AutoReject => "auto-reject",
        }
    }

    /// Jobs with a window that skips weekends run on weekdays only.
    pub fn weekdays_only(&self) -> bool {
        matches!(
            self,
            FollowupJob::ClickReminder2d
                | FollowupJob::ClickReminder3d
                | FollowupJob::ClickReminder4d
                | FollowupJob::InterestReminder2d
                | FollowupJob::TopSuppliers
        )
    }

    pub async fn run(self, now: DateTime<Utc>, deps: &ServerDeps) -> EngineResult<PassSummary> {
        match self {
            FollowupJob::ClickReminder2d => send_click_reminders(2, now, deps).await,
            FollowupJob::ClickReminder3d => send_click_reminders(3, now, deps).await,
            FollowupJob::ClickReminder4d => send_click_reminders(4, now, deps).await,
            FollowupJob::InterestReminder2d => send_interest_reminders(now, deps).await,
            FollowupJob::TopSuppliers => send_top_suppliers(now, deps).await,
            FollowupJob::AuthorSurvey => send_author_surveys(now, deps).await,
            FollowupJob::AuthorSurveyReminder => send_author_survey_reminders(now, deps).await,
            FollowupJob::SupplierSurvey => send_supplier_surveys(now, deps).await,
            FollowupJob::AutoReject => auto_reject_stale_drafts(now, deps).await,
        }
    }
}

impl fmt::Display for FollowupJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FollowupJob {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FollowupJob::ALL
            .into_iter()
            .find(|job| job.name() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown follow-up job: {}", s))
    }
}
