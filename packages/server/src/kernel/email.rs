//! Outbound email events consumed by the email adapter.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::common::{TenderId, TenderSiaeId};
use crate::kernel::BaseEmailService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmailKind {
    SupplierPresentation,
    PartnerPresentation,
    AuthorConfirmation,
    SupplierReminder2d,
    SupplierReminder3d,
    SupplierReminder4d,
    InterestedSupplierReminder2d,
    AuthorTopSuppliers,
    AuthorSurvey,
    AuthorSurveyReminder,
    SupplierSurvey,
    AuthorModificationRequest,
    AuthorRejected,
}

impl EmailKind {
    /// Event name, also the key used to look up the provider template.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailKind::SupplierPresentation => "tender.presentation.to_supplier",
            EmailKind::PartnerPresentation => "tender.presentation.to_partner",
            EmailKind::AuthorConfirmation => "tender.confirmation.to_author",
            EmailKind::SupplierReminder2d => "tender.reminder.to_supplier.2d",
            EmailKind::SupplierReminder3d => "tender.reminder.to_supplier.3d",
            EmailKind::SupplierReminder4d => "tender.reminder.to_supplier.4d",
            EmailKind::InterestedSupplierReminder2d => "tender.reminder.to_interested_supplier.2d",
            EmailKind::AuthorTopSuppliers => "tender.top_suppliers.to_author",
            EmailKind::AuthorSurvey => "tender.survey.to_author.7d",
            EmailKind::AuthorSurveyReminder => "tender.survey.to_author.reminder",
            EmailKind::SupplierSurvey => "tender.survey.to_supplier.7d",
            EmailKind::AuthorModificationRequest => "tender.author.modification_request",
            EmailKind::AuthorRejected => "tender.author.rejected",
        }
    }
}

impl std::fmt::Display for EmailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailEvent {
    pub kind: EmailKind,
    pub tender_id: TenderId,
    pub tender_siae_id: Option<TenderSiaeId>,
    /// Usually one address; partner broadcasts carry the whole contact list.
    pub recipients: Vec<String>,
    pub subject: String,
    pub variables: Map<String, Value>,
}

impl EmailEvent {
    pub fn new(
        kind: EmailKind,
        tender_id: TenderId,
        recipient: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            tender_id,
            tender_siae_id: None,
            recipients: vec![recipient.into()],
            subject: subject.into(),
            variables: Map::new(),
        }
    }

    pub fn with_edge(mut self, tender_siae_id: TenderSiaeId) -> Self {
        self.tender_siae_id = Some(tender_siae_id);
        self
    }

    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn var(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.variables.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn merge(&mut self, other: DeliveryReport) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

/// Hand events to the transport in order. Failures are logged and counted,
/// never retried here: the state they describe is already committed.
pub async fn deliver_all(email: &dyn BaseEmailService, events: &[EmailEvent]) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for event in events {
        match email.send(event).await {
            Ok(()) => {
                debug!(kind = %event.kind, tender_id = %event.tender_id, "Email enqueued");
                report.sent += 1;
            }
            Err(e) => {
                warn!(
                    kind = %event.kind,
                    tender_id = %event.tender_id,
                    tender_siae_id = ?event.tender_siae_id,
                    error = %e,
                    "Email enqueue failed"
                );
                report.failed += 1;
            }
        }
    }

    report
}
