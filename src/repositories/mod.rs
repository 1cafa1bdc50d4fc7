pub mod client_repository;
pub mod delivery_note_repository;
pub mod project_repository;
pub mod user_repository;

pub use client_repository::{ClientRepository, SqliteClientRepository};
pub use delivery_note_repository::{
    DeliveryNoteRepository, SignOutcome, SqliteDeliveryNoteRepository,
};
pub use project_repository::{ProjectRecord, ProjectRepository, SqliteProjectRepository};
pub use user_repository::{
    NewUser, RepositoryError, RepositoryResult, SqliteUserRepository, UserRepository,
};

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}
