//! Delivery note signing.
//!
//! A note moves from unsigned to signed exactly once. The signing sheet is
//! rendered to a temporary file, uploaded to immutable storage and only then
//! committed with a conditional update, so a concurrent signer that loses
//! the race observes `AlreadySigned` and the stored URLs never change.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;

use super::pdf_renderer::{render_signing_sheet, SignatureImage};
use super::rendered_pdf::RenderedPdf;
use super::upload_service::UploadService;
use crate::auth::{AccessFilter, CallerContext};
use crate::error::{AppError, Result};
use crate::models::DeliveryNote;
use crate::repositories::{DeliveryNoteRepository, SignOutcome};

pub struct SigningWorkflow {
    notes: Arc<dyn DeliveryNoteRepository>,
    uploader: Arc<dyn UploadService>,
    temp_dir: PathBuf,
}

impl SigningWorkflow {
    pub fn new(
        notes: Arc<dyn DeliveryNoteRepository>,
        uploader: Arc<dyn UploadService>,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            notes,
            uploader,
            temp_dir,
        }
    }

    /// Signs note `id` with the uploaded `signature` image.
    ///
    /// Checks run in order: visibility (`NotFound`), current state
    /// (`AlreadySigned`), then payload (`MissingSignature`).
    pub async fn sign(
        &self,
        caller: &CallerContext,
        id: i64,
        signature: Option<Vec<u8>>,
        signed_on: DateTime<Utc>,
    ) -> Result<DeliveryNote> {
        let detail = self
            .notes
            .find_detail(id, &AccessFilter::lookup(caller))
            .await?
            .ok_or_else(|| AppError::NotFound("Delivery note not found".to_string()))?;
        let note = detail.note;

        if note.signed {
            return Err(AppError::AlreadySigned);
        }

        let signature = match signature {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Err(AppError::MissingSignature),
        };

        tracing::info!(note_id = id, user_id = caller.user_id, "Signing delivery note");

        let sheet_note = note.clone();
        let rendered = RenderedPdf::render(&self.temp_dir, move |out| {
            let image = SignatureImage::decode(&signature)?;
            render_signing_sheet(&sheet_note, signed_on, &image, out)
        })
        .await?;

        let uploaded = self
            .uploader
            .upload(rendered.bytes().to_vec(), &format!("{}.pdf", id))
            .await
            .map_err(|e| {
                tracing::error!(note_id = id, error = %e, "Signed PDF upload failed");
                AppError::from(e)
            })?;

        match self
            .notes
            .mark_signed(id, &uploaded.url, &uploaded.url)
            .await?
        {
            SignOutcome::Committed => {
                tracing::info!(note_id = id, url = %uploaded.url, "Delivery note signed");
            }
            SignOutcome::AlreadySigned => {
                tracing::warn!(note_id = id, "Delivery note was signed concurrently");
                return Err(AppError::AlreadySigned);
            }
        }
        drop(rendered);

        self.notes
            .find(id, &AccessFilter::lookup(caller))
            .await?
            .ok_or_else(|| AppError::NotFound("Delivery note not found".to_string()))
    }
}
