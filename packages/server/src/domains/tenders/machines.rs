//! Tender lifecycle and supplier-edge stages.
//!
//! Persistence applies each transition with a conditional update on the
//! source status; these tables are what activities consult first so callers
//! get a precise error instead of a silent no-op.

use super::models::{TenderSiae, TenderSiaeSource, TenderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenderTransition {
    Submit,
    Validate,
    RequestModification,
    Dispatch,
    Reject,
    AutoReject,
}

impl TenderTransition {
    pub fn target(&self) -> TenderStatus {
        match self {
            TenderTransition::Submit => TenderStatus::Submitted,
            TenderTransition::Validate => TenderStatus::Validated,
            TenderTransition::RequestModification => TenderStatus::Draft,
            TenderTransition::Dispatch => TenderStatus::Sent,
            TenderTransition::Reject | TenderTransition::AutoReject => TenderStatus::Rejected,
        }
    }

    /// Statuses the transition may start from.
    pub fn sources(&self) -> &'static [TenderStatus] {
        use TenderStatus::*;
        match self {
            TenderTransition::Submit => &[Draft],
            TenderTransition::Validate => &[Submitted],
            TenderTransition::RequestModification => &[Submitted],
            TenderTransition::Dispatch => &[Validated, Sent],
            TenderTransition::Reject => &[Draft, Submitted, Validated, Sent],
            TenderTransition::AutoReject => &[Draft],
        }
    }

    pub fn allowed_from(&self, status: TenderStatus) -> bool {
        self.sources().contains(&status)
    }
}

/// Where a supplier stands on a tender. Later stages imply the earlier ones
/// on the email path; LINK and MANUAL edges may skip the email stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EdgeStage {
    Targeted,
    Emailed,
    LinkClicked,
    DetailViewed,
    Interested,
    NotInterested,
}

impl EdgeStage {
    pub fn of(edge: &TenderSiae) -> Self {
        if edge.detail_contact_click_date.is_some() {
            EdgeStage::Interested
        } else if edge.detail_not_interested_click_date.is_some() {
            EdgeStage::NotInterested
        } else if edge.detail_display_date.is_some() {
            EdgeStage::DetailViewed
        } else if edge.email_link_click_date.is_some() {
            EdgeStage::LinkClicked
        } else if edge.email_send_date.is_some() {
            EdgeStage::Emailed
        } else {
            EdgeStage::Targeted
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EdgeStage::Interested | EdgeStage::NotInterested)
    }
}

/// Stamp dates are ordered send ≤ click ≤ display whenever both ends are
/// set, and a display on an email-sourced edge implies it was emailed.
pub fn edge_dates_consistent(edge: &TenderSiae) -> bool {
    let ordered = |a: Option<_>, b: Option<_>| match (a, b) {
        (Some(a), Some(b)) => a <= b,
        _ => true,
    };

    let emailed_before_display = edge.detail_display_date.is_none()
        || edge.email_send_date.is_some()
        || matches!(
            edge.source,
            TenderSiaeSource::Link | TenderSiaeSource::Manual
        );

    ordered(edge.email_send_date, edge.email_link_click_date)
        && ordered(edge.email_link_click_date, edge.detail_display_date)
        && !(edge.is_interested() && edge.is_not_interested())
        && emailed_before_display
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{SiaeId, TenderId, TenderSiaeId};
    use chrono::{Duration, Utc};
    use sqlx::types::Json;

    fn edge(source: TenderSiaeSource) -> TenderSiae {
        let now = Utc::now();
        TenderSiae {
            id: TenderSiaeId::new(),
            tender_id: TenderId::new(),
            siae_id: SiaeId::new(),
            user_id: None,
            source,
            email_send_date: None,
            email_link_click_date: None,
            detail_display_date: None,
            detail_contact_click_date: None,
            detail_not_interested_click_date: None,
            detail_not_interested_feedback: None,
            survey_transactioned_answer: None,
            survey_transactioned_send_date: None,
            survey_transactioned_answer_date: None,
            transactioned: None,
            transactioned_source: None,
            logs: Json(vec![]),
            is_deleted_by_siae: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn validation_only_from_submitted() {
        assert!(TenderTransition::Validate.allowed_from(TenderStatus::Submitted));
        assert!(!TenderTransition::Validate.allowed_from(TenderStatus::Draft));
        assert!(!TenderTransition::Validate.allowed_from(TenderStatus::Sent));
    }

    #[test]
    fn rejected_is_terminal() {
        for transition in [
            TenderTransition::Submit,
            TenderTransition::Validate,
            TenderTransition::RequestModification,
            TenderTransition::Dispatch,
            TenderTransition::Reject,
            TenderTransition::AutoReject,
        ] {
            assert!(!transition.allowed_from(TenderStatus::Rejected), "{transition:?}");
        }
    }

    #[test]
    fn modification_request_goes_back_to_draft() {
        assert_eq!(TenderTransition::RequestModification.target(), TenderStatus::Draft);
        assert!(TenderTransition::Submit.allowed_from(TenderStatus::Draft));
    }

    #[test]
    fn top_up_dispatch_stays_sent() {
        assert!(TenderTransition::Dispatch.allowed_from(TenderStatus::Sent));
        assert_eq!(TenderTransition::Dispatch.target(), TenderStatus::Sent);
    }

    #[test]
    fn stage_follows_latest_stamp() {
        let mut e = edge(TenderSiaeSource::Matching);
        assert_eq!(EdgeStage::of(&e), EdgeStage::Targeted);

        let now = Utc::now();
        e.email_send_date = Some(now);
        e.email_link_click_date = Some(now + Duration::minutes(5));
        assert_eq!(EdgeStage::of(&e), EdgeStage::LinkClicked);

        e.detail_contact_click_date = Some(now + Duration::minutes(10));
        assert_eq!(EdgeStage::of(&e), EdgeStage::Interested);
        assert!(EdgeStage::of(&e).is_terminal());
    }

    #[test]
    fn link_edges_may_be_viewed_without_email() {
        let mut link = edge(TenderSiaeSource::Link);
        link.detail_display_date = Some(Utc::now());
        assert!(edge_dates_consistent(&link));

        let mut matched = edge(TenderSiaeSource::Matching);
        matched.detail_display_date = Some(Utc::now());
        assert!(!edge_dates_consistent(&matched));
    }

    #[test]
    fn both_decisions_are_inconsistent() {
        let mut e = edge(TenderSiaeSource::Link);
        e.detail_contact_click_date = Some(Utc::now());
        e.detail_not_interested_click_date = Some(Utc::now());
        assert!(!edge_dates_consistent(&e));
    }
}
