pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod validation;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use std::sync::Arc;

use auth::TokenService;
use config::AppConfig;
use repositories::{
    SqliteClientRepository, SqliteDeliveryNoteRepository, SqliteProjectRepository,
    SqliteUserRepository,
};
use services::{
    AuthService, ClientService, DeliveryNoteService, EmailService, ProjectService,
    RemoteAssetClient, SigningWorkflow, UploadService, UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AuthService>,
    pub client_service: Arc<ClientService>,
    pub project_service: Arc<ProjectService>,
    pub delivery_note_service: Arc<DeliveryNoteService>,
    pub pool: sqlx::SqlitePool,
}

impl AppState {
    /// Wires repositories and services over `pool`; email and upload are injected.
    pub fn new(
        pool: sqlx::SqlitePool,
        config: AppConfig,
        email: Arc<dyn EmailService>,
        uploader: Arc<dyn UploadService>,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(&config.jwt_secret, config.token_ttl));

        let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
        let client_repository = Arc::new(SqliteClientRepository::new(pool.clone()));
        let project_repository = Arc::new(SqliteProjectRepository::new(pool.clone()));
        let note_repository = Arc::new(SqliteDeliveryNoteRepository::new(pool.clone()));

        let user_service = Arc::new(UserService::new(
            user_repository.clone(),
            tokens.clone(),
            email,
            uploader.clone(),
            config.expose_codes,
        ));
        let auth_service = Arc::new(AuthService::new(user_repository, tokens.clone()));
        let client_service = Arc::new(ClientService::new(client_repository.clone()));
        let project_service = Arc::new(ProjectService::new(
            project_repository.clone(),
            client_repository.clone(),
        ));

        let signing = SigningWorkflow::new(
            note_repository.clone(),
            uploader,
            config.temp_dir.clone(),
        );
        let delivery_note_service = Arc::new(DeliveryNoteService::new(
            note_repository,
            project_repository,
            client_repository,
            signing,
            RemoteAssetClient::new(config.outbound_timeout, config.max_upload_bytes),
            config.temp_dir.clone(),
        ));

        Self {
            config: Arc::new(config),
            tokens,
            user_service,
            auth_service,
            client_service,
            project_service,
            delivery_note_service,
            pool,
        }
    }
}
