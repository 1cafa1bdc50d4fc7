use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;

use super::pdf_renderer::{render_delivery_note, SignatureImage};
use super::remote_asset::RemoteAssetClient;
use super::rendered_pdf::RenderedPdf;
use super::signing_workflow::SigningWorkflow;
use crate::auth::{AccessFilter, CallerContext};
use crate::error::{AppError, Result};
use crate::models::{CreateDeliveryNoteRequest, DeliveryNote, DeliveryNoteDetail};
use crate::repositories::{ClientRepository, DeliveryNoteRepository, ProjectRepository};

/// What `GET /deliverynote/pdf/{id}` answers with.
#[derive(Debug)]
pub enum NotePdf {
    /// The note already has a stored PDF.
    Stored { url: String },
    Rendered { file_name: String, bytes: Vec<u8> },
}

pub struct DeliveryNoteService {
    notes: Arc<dyn DeliveryNoteRepository>,
    projects: Arc<dyn ProjectRepository>,
    clients: Arc<dyn ClientRepository>,
    signing: SigningWorkflow,
    assets: RemoteAssetClient,
    temp_dir: PathBuf,
}

impl DeliveryNoteService {
    pub fn new(
        notes: Arc<dyn DeliveryNoteRepository>,
        projects: Arc<dyn ProjectRepository>,
        clients: Arc<dyn ClientRepository>,
        signing: SigningWorkflow,
        assets: RemoteAssetClient,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            notes,
            projects,
            clients,
            signing,
            assets,
            temp_dir,
        }
    }

    pub async fn create(
        &self,
        caller: &CallerContext,
        request: CreateDeliveryNoteRequest,
    ) -> Result<DeliveryNote> {
        let new_note = request.validate()?;
        let visible = AccessFilter::lookup(caller);

        if self.projects.find(new_note.project_id, &visible).await?.is_none() {
            return Err(AppError::NotFound("Project not found".to_string()));
        }
        if self.clients.find(new_note.client_id, &visible).await?.is_none() {
            return Err(AppError::NotFound("Client not found".to_string()));
        }

        let note = self.notes.create(caller, &new_note).await?;
        tracing::info!(note_id = note.id, user_id = caller.user_id, "Created delivery note");
        Ok(note)
    }

    pub async fn list(&self, caller: &CallerContext) -> Result<Vec<DeliveryNote>> {
        self.notes.list(&AccessFilter::lookup(caller)).await
    }

    pub async fn get(&self, caller: &CallerContext, id: i64) -> Result<DeliveryNoteDetail> {
        self.notes
            .find_detail(id, &AccessFilter::lookup(caller))
            .await?
            .ok_or_else(|| AppError::NotFound("Delivery note not found".to_string()))
    }

    /// Returns the stored PDF location, or renders the note on the fly.
    ///
    /// Never modifies the note.
    pub async fn pdf(&self, caller: &CallerContext, id: i64) -> Result<NotePdf> {
        let detail = self.get(caller, id).await?;

        if let Some(url) = detail.note.pdf_url.clone() {
            return Ok(NotePdf::Stored { url });
        }

        let signature = match (&detail.note.signed, &detail.note.signature_url) {
            (true, Some(url)) => self.load_signature(id, url).await,
            _ => None,
        };

        let rendered = RenderedPdf::render(&self.temp_dir, move |out| {
            render_delivery_note(&detail, signature.as_ref(), out)
        })
        .await?;

        Ok(NotePdf::Rendered {
            file_name: format!("delivery-note-{}.pdf", id),
            bytes: rendered.bytes().to_vec(),
        })
    }

    /// Fetches and decodes a stored signature; failures only drop the signature page.
    async fn load_signature(&self, id: i64, url: &str) -> Option<SignatureImage> {
        let bytes = match self.assets.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(note_id = id, url, error = %e, "Could not fetch signature");
                return None;
            }
        };

        match SignatureImage::decode(&bytes) {
            Ok(image) => Some(image),
            Err(e) => {
                tracing::warn!(note_id = id, url, error = %e, "Stored signature is not an image");
                None
            }
        }
    }

    pub async fn sign(
        &self,
        caller: &CallerContext,
        id: i64,
        signature: Option<Vec<u8>>,
        signed_on: DateTime<Utc>,
    ) -> Result<DeliveryNote> {
        self.signing.sign(caller, id, signature, signed_on).await
    }

    pub async fn delete(&self, caller: &CallerContext, id: i64) -> Result<()> {
        let note = self
            .notes
            .find(id, &AccessFilter::lookup(caller))
            .await?
            .ok_or_else(|| AppError::NotFound("Delivery note not found".to_string()))?;

        if note.signed {
            return Err(AppError::SignedNoteLocked);
        }

        // Signed between the check and the delete
        if !self.notes.delete_unsigned(id).await? {
            return Err(AppError::SignedNoteLocked);
        }

        tracing::info!(note_id = id, user_id = caller.user_id, "Deleted delivery note");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NoteType;
    use crate::repositories::client_repository::MockClientRepository;
    use crate::repositories::delivery_note_repository::MockDeliveryNoteRepository;
    use crate::repositories::project_repository::MockProjectRepository;
    use crate::services::upload_service::MockUploadService;
    use crate::test_utils::{caller, sample_note};
    use std::time::Duration;

    fn service(
        notes: MockDeliveryNoteRepository,
        projects: MockProjectRepository,
        clients: MockClientRepository,
        temp_dir: &std::path::Path,
    ) -> DeliveryNoteService {
        let notes: Arc<dyn DeliveryNoteRepository> = Arc::new(notes);
        let signing = SigningWorkflow::new(
            notes.clone(),
            Arc::new(MockUploadService::new()),
            temp_dir.to_path_buf(),
        );

        DeliveryNoteService::new(
            notes,
            Arc::new(projects),
            Arc::new(clients),
            signing,
            RemoteAssetClient::new(Duration::from_secs(1), 1024 * 1024),
            temp_dir.to_path_buf(),
        )
    }

    fn notes_returning(note: DeliveryNote) -> MockDeliveryNoteRepository {
        let mut notes = MockDeliveryNoteRepository::new();
        notes.expect_find_detail().returning(move |_, _| {
            let detail = DeliveryNoteDetail {
                note: note.clone(),
                project_name: Some("Bridge".to_string()),
                client_name: Some("Acme".to_string()),
                created_by_email: Some("owner@example.com".to_string()),
            };
            Box::pin(async move { Ok(Some(detail)) })
        });
        notes
    }

    #[tokio::test]
    async fn test_stored_pdf_is_returned_without_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let mut note = sample_note(3, 1);
        note.signed = true;
        note.pdf_url = Some("https://gateway.test/ipfs/QmPdf".to_string());

        let service = service(
            notes_returning(note),
            MockProjectRepository::new(),
            MockClientRepository::new(),
            dir.path(),
        );

        let pdf = service.pdf(&caller(1, None), 3).await.unwrap();
        assert!(matches!(pdf, NotePdf::Stored { url } if url == "https://gateway.test/ipfs/QmPdf"));
        assert!(!dir.path().exists() || std::fs::read_dir(dir.path()).unwrap().count() == 0);
    }

    #[tokio::test]
    async fn test_unsigned_note_is_rendered_and_temp_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(
            notes_returning(sample_note(3, 1)),
            MockProjectRepository::new(),
            MockClientRepository::new(),
            dir.path(),
        );

        let pdf = service.pdf(&caller(1, None), 3).await.unwrap();
        match pdf {
            NotePdf::Rendered { file_name, bytes } => {
                assert_eq!(file_name, "delivery-note-3.pdf");
                assert!(bytes.starts_with(b"%PDF"));
            }
            other => panic!("expected a rendered PDF, got {:?}", other),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_create_requires_a_visible_project() {
        let dir = tempfile::tempdir().unwrap();
        let mut notes = MockDeliveryNoteRepository::new();
        notes.expect_create().never();

        let mut projects = MockProjectRepository::new();
        projects
            .expect_find()
            .returning(|_, _| Box::pin(async move { Ok(None) }));

        let mut clients = MockClientRepository::new();
        clients.expect_find().never();

        let request = CreateDeliveryNoteRequest {
            project: Some(10),
            client: Some(20),
            note_type: Some(NoteType::Simple.as_str().to_string()),
            ..Default::default()
        };

        let result = service(notes, projects, clients, dir.path())
            .create(&caller(2, None), request)
            .await;
        assert!(matches!(result, Err(AppError::NotFound(msg)) if msg == "Project not found"));
    }

    #[tokio::test]
    async fn test_signed_note_cannot_be_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let mut note = sample_note(4, 1);
        note.signed = true;

        let mut notes = MockDeliveryNoteRepository::new();
        notes.expect_find().returning(move |_, _| {
            let note = note.clone();
            Box::pin(async move { Ok(Some(note)) })
        });
        notes.expect_delete_unsigned().never();

        let result = service(
            notes,
            MockProjectRepository::new(),
            MockClientRepository::new(),
            dir.path(),
        )
        .delete(&caller(1, None), 4)
        .await;
        assert!(matches!(result, Err(AppError::SignedNoteLocked)));
    }
}
