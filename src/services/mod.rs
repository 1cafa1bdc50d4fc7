pub mod auth_service;
pub mod client_service;
pub mod delivery_note_service;
pub mod email_service;
pub mod pdf_renderer;
pub mod project_service;
pub mod remote_asset;
pub mod rendered_pdf;
pub mod signing_workflow;
pub mod upload_service;
pub mod user_service;

pub use auth_service::{AuthService, AuthServiceError, LoginRequest, LoginResponse};
pub use client_service::ClientService;
pub use delivery_note_service::{DeliveryNoteService, NotePdf};
pub use email_service::{create_email_service, EmailService, MockEmailService, SmtpEmailService};
pub use project_service::ProjectService;
pub use remote_asset::RemoteAssetClient;
pub use signing_workflow::SigningWorkflow;
pub use upload_service::{
    create_upload_service, LocalUploadService, PinataUploadService, UploadService, UploadedFile,
};
pub use user_service::{UserService, UserServiceError};
