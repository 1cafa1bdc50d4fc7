use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::pdf_renderer::RenderError;
use crate::error::{AppError, Result};

/// A rendered PDF held in a temporary file.
///
/// The file is removed when the value is dropped, on success and error
/// paths alike.
pub struct RenderedPdf {
    file: NamedTempFile,
    bytes: Vec<u8>,
}

impl RenderedPdf {
    /// Runs `render` on the blocking pool, writing into a fresh file under `temp_dir`.
    pub async fn render<F>(temp_dir: &Path, render: F) -> Result<Self>
    where
        F: FnOnce(&mut BufWriter<File>) -> std::result::Result<(), RenderError> + Send + 'static,
    {
        let temp_dir: PathBuf = temp_dir.to_path_buf();

        let rendered = tokio::task::spawn_blocking(move || -> std::result::Result<Self, RenderError> {
            std::fs::create_dir_all(&temp_dir)?;
            let file = tempfile::Builder::new()
                .prefix("delivery-note-")
                .suffix(".pdf")
                .tempfile_in(&temp_dir)?;

            let mut writer = BufWriter::new(file.reopen()?);
            render(&mut writer)?;
            drop(writer);

            let bytes = std::fs::read(file.path())?;
            Ok(Self { file, bytes })
        })
        .await
        .map_err(|e| AppError::Internal(format!("PDF rendering task failed: {}", e)))??;

        tracing::debug!(
            path = %rendered.file.path().display(),
            size = rendered.bytes.len(),
            "Rendered PDF"
        );
        Ok(rendered)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Drop for RenderedPdf {
    fn drop(&mut self) {
        tracing::debug!(path = %self.file.path().display(), "Removing temporary PDF");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_temp_file_lives_as_long_as_the_value() {
        let dir = tempfile::tempdir().unwrap();

        let rendered = RenderedPdf::render(dir.path(), |out| {
            out.write_all(b"%PDF-1.5\n%%EOF")?;
            Ok(())
        })
        .await
        .unwrap();

        let path = rendered.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(rendered.bytes(), b"%PDF-1.5\n%%EOF");

        drop(rendered);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_failed_render_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();

        let result = RenderedPdf::render(dir.path(), |out| {
            out.write_all(b"%PDF-1.5 partial")?;
            Err(RenderError::Pdf("boom".to_string()))
        })
        .await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
