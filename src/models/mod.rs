pub mod client;
pub mod delivery_note;
pub mod project;
pub mod user;

pub use client::{Client, ClientPayload};
pub use delivery_note::{
    format_quantity, CreateDeliveryNoteRequest, DeliveryNote, DeliveryNoteDetail, LineItem,
    NewDeliveryNote, NoteType,
};
pub use project::{Project, ProjectPayload};
pub use user::{
    CompanyData, CompanyProfile, CompanyUpdateRequest, PersonalData, Role, User, UserStatus,
};
