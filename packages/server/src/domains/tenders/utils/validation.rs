use chrono::NaiveDate;

use crate::common::EngineError;
use crate::domains::reference::PerimeterKind;
use crate::domains::tenders::models::{ResponseKind, TenderInput, TenderSource};

/// Facts about the submitter needed to check a tender.
#[derive(Debug, Clone)]
pub struct SubmissionContext<'a> {
    pub source: TenderSource,
    pub today: NaiveDate,
    pub contact_email: &'a str,
    pub contact_phone: Option<&'a str>,
    /// Kind of the perimeter referenced by `location_id`, if it resolved.
    pub location_kind: Option<PerimeterKind>,
}

/// Check tender attributes before they are persisted.
pub fn validate_tender_input(input: &TenderInput, ctx: &SubmissionContext<'_>) -> Result<(), EngineError> {
    if input.title.trim().is_empty() {
        return Err(EngineError::validation("title is required"));
    }
    if input.description.trim().is_empty() {
        return Err(EngineError::validation("description is required"));
    }

    if input.deadline_date < ctx.today {
        return Err(EngineError::validation("deadline_date cannot be in the past"));
    }
    if let Some(start) = input.start_working_date {
        if start < input.deadline_date {
            return Err(EngineError::validation(
                "start_working_date must be on or after deadline_date",
            ));
        }
    }

    if matches!(ctx.source, TenderSource::Form | TenderSource::Tally) && input.response_kind.is_empty() {
        return Err(EngineError::validation("at least one response_kind is required"));
    }
    if matches!(
        ctx.source,
        TenderSource::Form | TenderSource::Tally | TenderSource::Api
    ) && ctx.contact_email.trim().is_empty()
    {
        return Err(EngineError::validation("contact email is required"));
    }

    if input.response_kind.contains(&ResponseKind::External)
        && input.external_link.as_deref().map_or(true, |l| l.trim().is_empty())
    {
        return Err(EngineError::validation(
            "external_link is required when responses go to an external link",
        ));
    }
    if input.response_kind.contains(&ResponseKind::Tel)
        && ctx.contact_phone.map_or(true, |p| p.trim().is_empty())
    {
        return Err(EngineError::validation(
            "contact phone is required when responses go by phone",
        ));
    }

    if let Some(distance) = input.distance_location {
        if distance <= 0 {
            return Err(EngineError::validation("distance_location must be positive"));
        }
        if input.location_id.is_none() {
            return Err(EngineError::validation("distance_location requires a location"));
        }
    }
    if input.location_id.is_some() {
        match ctx.location_kind {
            None => return Err(EngineError::validation("location does not exist")),
            Some(kind) if input.distance_location.is_some() && kind != PerimeterKind::City => {
                return Err(EngineError::validation("distance_location requires a city location"));
            }
            _ => {}
        }
    }

    if input.amount_exact.is_some_and(|a| a < 0) {
        return Err(EngineError::validation("amount_exact cannot be negative"));
    }
    if input.limit_send_to_siae_batch.is_some_and(|n| n < 1) {
        return Err(EngineError::validation("limit_send_to_siae_batch must be at least 1"));
    }
    if input.limit_nb_siae_interested.is_some_and(|n| n < 1) {
        return Err(EngineError::validation("limit_nb_siae_interested must be at least 1"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PerimeterId;
    use crate::domains::tenders::models::TenderKind;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn ctx(source: TenderSource) -> SubmissionContext<'static> {
        SubmissionContext {
            source,
            today: today(),
            contact_email: "acheteur@ville.fr",
            contact_phone: None,
            location_kind: None,
        }
    }

    fn input() -> TenderInput {
        TenderInput::builder()
            .kind(TenderKind::Quote)
            .title("Nettoyage des locaux")
            .description("Entretien hebdomadaire")
            .deadline_date(NaiveDate::from_ymd_opt(2024, 3, 20).unwrap())
            .response_kind(vec![ResponseKind::Email])
            .build()
    }

    fn message(err: EngineError) -> String {
        match err {
            EngineError::Validation(m) => m,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_a_complete_form_submission() {
        assert!(validate_tender_input(&input(), &ctx(TenderSource::Form)).is_ok());
    }

    #[test]
    fn rejects_deadline_in_the_past() {
        let mut i = input();
        i.deadline_date = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        let err = validate_tender_input(&i, &ctx(TenderSource::Form)).unwrap_err();
        assert!(message(err).contains("deadline_date"));
    }

    #[test]
    fn deadline_today_is_fine() {
        let mut i = input();
        i.deadline_date = today();
        assert!(validate_tender_input(&i, &ctx(TenderSource::Form)).is_ok());
    }

    #[test]
    fn start_must_not_precede_deadline() {
        let mut i = input();
        i.start_working_date = NaiveDate::from_ymd_opt(2024, 3, 19);
        assert!(validate_tender_input(&i, &ctx(TenderSource::Form)).is_err());

        i.start_working_date = Some(i.deadline_date);
        assert!(validate_tender_input(&i, &ctx(TenderSource::Form)).is_ok());
    }

    #[test]
    fn form_needs_a_response_kind_but_staff_does_not() {
        let mut i = input();
        i.response_kind.clear();
        assert!(validate_tender_input(&i, &ctx(TenderSource::Form)).is_err());
        assert!(validate_tender_input(&i, &ctx(TenderSource::Staff)).is_ok());
    }

    #[test]
    fn api_needs_a_contact_email() {
        let mut c = ctx(TenderSource::Api);
        c.contact_email = "";
        assert!(validate_tender_input(&input(), &c).is_err());
    }

    #[test]
    fn external_response_needs_a_link() {
        let mut i = input();
        i.response_kind = vec![ResponseKind::External];
        assert!(validate_tender_input(&i, &ctx(TenderSource::Form)).is_err());

        i.external_link = Some("https://marches.example.fr/ao/42".into());
        assert!(validate_tender_input(&i, &ctx(TenderSource::Form)).is_ok());
    }

    #[test]
    fn phone_response_needs_a_phone() {
        let mut i = input();
        i.response_kind = vec![ResponseKind::Tel];
        assert!(validate_tender_input(&i, &ctx(TenderSource::Form)).is_err());

        let mut c = ctx(TenderSource::Form);
        c.contact_phone = Some("0476000000");
        assert!(validate_tender_input(&i, &c).is_ok());
    }

    #[test]
    fn radius_needs_a_city() {
        let mut i = input();
        i.distance_location = Some(30);
        assert!(validate_tender_input(&i, &ctx(TenderSource::Form)).is_err());

        i.location_id = Some(PerimeterId::new());
        let mut c = ctx(TenderSource::Form);
        c.location_kind = Some(PerimeterKind::Department);
        assert!(validate_tender_input(&i, &c).is_err());

        c.location_kind = Some(PerimeterKind::City);
        assert!(validate_tender_input(&i, &c).is_ok());
    }
}
