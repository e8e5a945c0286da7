//! Append-only audit log entries stored as a JSONB array on tenders and
//! tender-siae edges.
//!
//! Entries are appended with `logs = logs || $entry` inside the row's
//! transaction and never rewritten. Each entry names its `action`; selection
//! predicates use JSONB containment on that name to skip work already done.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod actions {
    pub const EMAIL_SIAES_MATCHED: &str = "email_siaes_matched";
    pub const EMAIL_SIAE_USERS_MATCHED: &str = "email_siae_users_matched";
    pub const EMAIL_PARTNERS_MATCHED: &str = "email_partners_matched";
    pub const EMAIL_AUTHOR_CONFIRMATION: &str = "email_author_confirmation";
    pub const SUBMITTED: &str = "submitted";
    pub const VALIDATED: &str = "validated";
    pub const REJECTED: &str = "rejected";
    pub const MODIFICATION_REQUEST: &str = "send tender author modification request";
    pub const AUTO_REJECTED: &str = "auto_rejected";
    pub const EMAIL_TOP_SUPPLIERS: &str = "email_top_suppliers_to_author";
    pub const EMAIL_INTERESTED_COUNT: &str = "email_interested_count_to_author";
    pub const EMAIL_SURVEY_AUTHOR: &str = "email_survey_transactioned_to_author";
    pub const EMAIL_SURVEY_AUTHOR_REMINDER: &str = "email_survey_transactioned_reminder_to_author";
    pub const SURVEY_AUTHOR_ANSWER: &str = "survey_transactioned_answer";

    // tender-siae edges
    pub const EMAIL_REMINDER_2D: &str = "email_reminder_2d";
    pub const EMAIL_REMINDER_3D: &str = "email_reminder_3d";
    pub const EMAIL_REMINDER_4D: &str = "email_reminder_4d";
    pub const EMAIL_INTERESTED_REMINDER_2D: &str = "email_interested_reminder_2d";
    pub const EMAIL_SURVEY_SIAE: &str = "email_survey_transactioned_to_siae";
    pub const INTERESTED: &str = "interested";
    pub const NOT_INTERESTED: &str = "not_interested";
    pub const SURVEY_SIAE_ANSWER: &str = "survey_transactioned_siae_answer";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub action: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, flatten)]
    pub metadata: Map<String, Value>,
}

impl LogEntry {
    pub fn new(action: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            action: action.to_string(),
            timestamp,
            metadata: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Single-element JSON array, ready for `logs || $1::jsonb`.
    pub fn as_append_payload(&self) -> Value {
        Value::Array(vec![serde_json::to_value(self).unwrap_or(Value::Null)])
    }

    /// JSONB containment pattern matching any entry with this action.
    pub fn action_pattern(action: &str) -> Value {
        serde_json::json!([{ "action": action }])
    }
}

/// Most recent entry with the given action.
pub fn last_with_action<'a>(logs: &'a [LogEntry], action: &str) -> Option<&'a LogEntry> {
    logs.iter().rev().find(|entry| entry.action == action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn metadata_is_flattened_next_to_action() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let entry = LogEntry::new(actions::EMAIL_SIAES_MATCHED, at)
            .with("count", 12)
            .with("subject", "Nouveau besoin");

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["action"], "email_siaes_matched");
        assert_eq!(json["count"], 12);

        let back: LogEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn finds_latest_entry_for_action() {
        let first = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        let logs = vec![
            LogEntry::new(actions::MODIFICATION_REQUEST, first),
            LogEntry::new(actions::SUBMITTED, first),
            LogEntry::new(actions::MODIFICATION_REQUEST, second),
        ];

        let last = last_with_action(&logs, actions::MODIFICATION_REQUEST).unwrap();
        assert_eq!(last.timestamp, second);
        assert!(last_with_action(&logs, actions::REJECTED).is_none());
    }
}
