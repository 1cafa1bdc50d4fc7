pub mod client_handlers;
pub mod delivery_note_handlers;
pub mod extract;
pub mod project_handlers;
pub mod user_handlers;

pub use client_handlers::*;
pub use delivery_note_handlers::*;
pub use project_handlers::*;
pub use user_handlers::*;
