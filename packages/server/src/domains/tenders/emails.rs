//! Builds the outbound email events of the tender lifecycle.
//!
//! Every event carries the tender id, the edge id when it concerns one
//! supplier, a subject and the template variables. Deep links point at the
//! public tender page; survey links carry a signed token.

use anyhow::Result;
use chrono::Duration;
use serde_json::{json, Value};

use super::models::{Tender, TransactionAnswer};
use crate::common::{TenderSiaeId, UserId};
use crate::domains::auth::{JwtService, SurveyPurpose};
use crate::domains::reference::{PartnerShareTender, Supplier};
use crate::kernel::{EmailEvent, EmailKind, ServerDeps};

pub struct EmailComposer<'a> {
    site_url: &'a str,
    jwt: &'a JwtService,
    survey_ttl: Duration,
}

impl<'a> EmailComposer<'a> {
    pub fn new(deps: &'a ServerDeps) -> Self {
        Self {
            site_url: &deps.settings.site_url,
            jwt: &deps.jwt_service,
            survey_ttl: Duration::days(deps.settings.survey_token_ttl_days),
        }
    }

    fn event(&self, kind: EmailKind, tender: &Tender, recipient: &str, subject: String) -> EmailEvent {
        EmailEvent::new(kind, tender.id, recipient, subject)
            .var("TENDER_TITLE", tender.title.as_str())
            .var("TENDER_KIND", tender.kind.label())
            .var("TENDER_DEADLINE_DATE", tender.deadline_date.format("%d/%m/%Y").to_string())
            .var("TENDER_URL", tender.url(self.site_url))
    }

    fn edge_link(&self, tender: &Tender, edge_id: TenderSiaeId, user_id: Option<UserId>) -> String {
        let mut url = format!("{}?tender_siae_uuid={}", tender.url(self.site_url), edge_id);
        if let Some(user_id) = user_id {
            url.push_str(&format!("&user_id={}", user_id));
        }
        url
    }

    fn not_interested_link(&self, tender: &Tender, edge_id: TenderSiaeId) -> String {
        format!(
            "{}/api/tenders/{}/not-interested?tender_siae_uuid={}",
            self.site_url, tender.slug, edge_id
        )
    }

    /// Presentation emails for one supplier: its contact address, then every
    /// registered user with a different address.
    pub fn supplier_presentation(&self, tender: &Tender, edge_id: TenderSiaeId, supplier: &Supplier) -> Vec<EmailEvent> {
        let subject = format!("{} : {}", tender.kind.label(), tender.title);
        self.per_supplier_recipient(EmailKind::SupplierPresentation, tender, edge_id, supplier, &subject)
    }

    pub fn supplier_reminder(
        &self,
        kind: EmailKind,
        tender: &Tender,
        edge_id: TenderSiaeId,
        supplier: &Supplier,
    ) -> Vec<EmailEvent> {
        let subject = match kind {
            EmailKind::InterestedSupplierReminder2d => {
                format!("Avez-vous pu répondre au besoin « {} » ?", tender.title)
            }
            _ => format!("Rappel : {}", tender.title),
        };
        self.per_supplier_recipient(kind, tender, edge_id, supplier, &subject)
    }

    fn per_supplier_recipient(
        &self,
        kind: EmailKind,
        tender: &Tender,
        edge_id: TenderSiaeId,
        supplier: &Supplier,
        subject: &str,
    ) -> Vec<EmailEvent> {
        let mut recipients: Vec<(&str, Option<UserId>)> = Vec::new();
        if let Some(contact) = supplier.dispatch_email() {
            recipients.push((contact, None));
        }
        for user in supplier.extra_users() {
            recipients.push((user.email.as_str(), Some(user.id)));
        }

        recipients
            .into_iter()
            .map(|(recipient, user_id)| {
                self.event(kind, tender, recipient, subject.to_string())
                    .with_edge(edge_id)
                    .var("SIAE_NAME", supplier.name.as_str())
                    .var("TENDER_AMOUNT", tender.amount_display())
                    .var("TENDER_SIAE_URL", self.edge_link(tender, edge_id, user_id))
                    .var("NOT_INTERESTED_URL", self.not_interested_link(tender, edge_id))
            })
            .collect()
    }

    /// One email per roster, to its whole contact list.
    pub fn partner_presentation(&self, tender: &Tender, roster: &PartnerShareTender) -> Option<EmailEvent> {
        let first = roster.contact_email_list.first()?;
        let subject = format!("{} : {}", tender.kind.label(), tender.title);
        Some(
            self.event(EmailKind::PartnerPresentation, tender, first, subject)
                .with_recipients(roster.contact_email_list.clone())
                .var("PARTNER_NAME", roster.name.as_str())
                .var("TENDER_AMOUNT", tender.amount_display()),
        )
    }

    pub fn author_confirmation(&self, tender: &Tender, supplier_count: usize, partner_count: usize) -> EmailEvent {
        let subject = format!("Votre besoin « {} » a été diffusé", tender.title);
        self.event(EmailKind::AuthorConfirmation, tender, &tender.contact_email, subject)
            .var("AUTHOR_NAME", tender.contact_full_name())
            .var("SIAE_COUNT", supplier_count)
            .var("PARTNER_COUNT", partner_count)
    }

    pub fn author_top_suppliers(&self, tender: &Tender, suppliers: &[&Supplier]) -> EmailEvent {
        let subject = format!("Des prestataires inclusifs pour votre besoin « {} »", tender.title);
        let listing: Vec<Value> = suppliers
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "url": format!("{}/prestataires/{}", self.site_url, s.slug),
                })
            })
            .collect();

        self.event(EmailKind::AuthorTopSuppliers, tender, &tender.contact_email, subject)
            .var("AUTHOR_NAME", tender.contact_full_name())
            .var("reason", "top_suppliers")
            .var("SIAES", listing)
    }

    /// Interest tripwire notification.
    pub fn author_interested_count(&self, tender: &Tender, count: i64) -> EmailEvent {
        let subject = if count == 1 {
            format!("Un prestataire est intéressé par votre besoin « {} »", tender.title)
        } else {
            format!("{} prestataires sont intéressés par votre besoin « {} »", count, tender.title)
        };

        self.event(EmailKind::AuthorTopSuppliers, tender, &tender.contact_email, subject)
            .var("AUTHOR_NAME", tender.contact_full_name())
            .var("reason", "interested_count")
            .var("INTERESTED_COUNT", count)
            .var("SIAE_LIST_URL", format!("{}/siaes", tender.url(self.site_url)))
    }

    /// Transaction survey (or its reminder) with one signed link per answer.
    pub fn author_survey(&self, kind: EmailKind, tender: &Tender) -> Result<EmailEvent> {
        let token = self.jwt.create_survey_token(
            tender.author_id,
            SurveyPurpose::AuthorTransaction { tender_id: tender.id },
            self.survey_ttl,
        )?;
        let token = urlencoding::encode(&token);

        let subject = format!("Avez-vous trouvé un prestataire pour « {} » ?", tender.title);
        let mut event = self
            .event(kind, tender, &tender.contact_email, subject)
            .var("AUTHOR_NAME", tender.contact_full_name());

        for answer in TransactionAnswer::ALL {
            event = event.var(
                &format!("ANSWER_{}_URL", answer.as_str()),
                format!(
                    "{}/api/tenders/{}/author-survey?answer={}&token={}",
                    self.site_url,
                    tender.slug,
                    answer.as_str(),
                    token
                ),
            );
        }
        Ok(event)
    }

    /// "Did a transaction occur?" sent to one interested supplier, signed for
    /// `user_id`.
    pub fn supplier_survey(
        &self,
        tender: &Tender,
        edge_id: TenderSiaeId,
        supplier: &Supplier,
        user_id: UserId,
        recipient: &str,
    ) -> Result<EmailEvent> {
        let token = self.jwt.create_survey_token(
            user_id,
            SurveyPurpose::SupplierTransaction {
                tender_id: tender.id,
                siae_id: supplier.id,
            },
            self.survey_ttl,
        )?;
        let token = urlencoding::encode(&token);
        let base = format!(
            "{}/api/tenders/{}/siae/{}/survey",
            self.site_url, tender.slug, supplier.slug
        );

        let subject = format!("Avez-vous contractualisé pour « {} » ?", tender.title);
        Ok(self
            .event(EmailKind::SupplierSurvey, tender, recipient, subject)
            .with_edge(edge_id)
            .var("SIAE_NAME", supplier.name.as_str())
            .var("ANSWER_TRUE_URL", format!("{}?answer=true&token={}", base, token))
            .var("ANSWER_FALSE_URL", format!("{}?answer=false&token={}", base, token)))
    }

    pub fn author_modification_request(&self, tender: &Tender, message: &str) -> EmailEvent {
        let subject = format!("Votre besoin « {} » doit être modifié", tender.title);
        self.event(EmailKind::AuthorModificationRequest, tender, &tender.contact_email, subject)
            .var("AUTHOR_NAME", tender.contact_full_name())
            .var("MESSAGE", message)
            .var("EDIT_URL", format!("{}/modifier", tender.url(self.site_url)))
    }

    pub fn author_rejected(&self, tender: &Tender) -> EmailEvent {
        let subject = format!("Votre besoin « {} » n'a pas été publié", tender.title);
        self.event(EmailKind::AuthorRejected, tender, &tender.contact_email, subject)
            .var("AUTHOR_NAME", tender.contact_full_name())
    }
}
