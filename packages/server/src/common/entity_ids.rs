//! Typed ids for every entity the engine reads or writes.

pub use super::id::{Id, V4, V7};

pub struct Sector;
pub struct Perimeter;
pub struct User;
pub struct Siae;
pub struct SiaeActivity;
pub struct PartnerShareTender;
pub struct Tender;
pub struct TenderSiae;
pub struct TenderQuestion;
pub struct QuestionAnswer;
pub struct Note;

pub type SectorId = Id<Sector>;
pub type PerimeterId = Id<Perimeter>;
pub type UserId = Id<User>;
pub type SiaeId = Id<Siae>;
pub type SiaeActivityId = Id<SiaeActivity>;
pub type PartnerShareTenderId = Id<PartnerShareTender>;
pub type TenderId = Id<Tender>;

/// Edge ids appear in email deep links and act as an opaque credential,
/// hence random rather than time-ordered.
pub type TenderSiaeId = Id<TenderSiae, V4>;

pub type TenderQuestionId = Id<TenderQuestion>;
pub type QuestionAnswerId = Id<QuestionAnswer>;
pub type NoteId = Id<Note>;
