use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{error, info};

use crate::models::{ExportRow, ReportKind};
use crate::render::{renderer_for, resolve_filename, DocumentRenderer, ExportFormat, RenderError, RenderOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Exporting,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export for the selected filters")]
    EmptyInput,

    #[error("{format} export failed: {reason}")]
    RenderFailed { format: &'static str, reason: String },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// Message suitable for showing to the person who triggered the export.
    pub fn user_notice(&self) -> &'static str {
        match self {
            ExportError::EmptyInput => "There is no data to export for the selected filters.",
            ExportError::RenderFailed { .. } | ExportError::Io { .. } => {
                "Export failed, please try again."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub path: PathBuf,
    pub format: ExportFormat,
    pub mime_type: &'static str,
    pub bytes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    /// Caller-supplied name; the format's extension is always enforced.
    pub filename: Option<String>,
    pub options: Option<RenderOptions>,
}

/// Shared view of a dialog's state, readable while an export is running.
#[derive(Debug, Clone, Default)]
pub struct ExportStatus {
    exporting: Arc<AtomicBool>,
}

impl ExportStatus {
    pub fn state(&self) -> ExportState {
        if self.exporting.load(Ordering::Acquire) {
            ExportState::Exporting
        } else {
            ExportState::Idle
        }
    }

    fn begin(&self) -> InFlight<'_> {
        self.exporting.store(true, Ordering::Release);
        InFlight(self)
    }
}

// Back to Idle on success, failure, or a dropped export future.
struct InFlight<'a>(&'a ExportStatus);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.exporting.store(false, Ordering::Release);
    }
}

pub struct ExportDialog {
    kind: ReportKind,
    rows: Arc<Vec<ExportRow>>,
    out_dir: PathBuf,
    status: ExportStatus,
}

impl ExportDialog {
    pub fn open(kind: ReportKind, rows: Vec<ExportRow>, out_dir: impl AsRef<Path>) -> Self {
        Self {
            kind,
            rows: Arc::new(rows),
            out_dir: out_dir.as_ref().to_path_buf(),
            status: ExportStatus::default(),
        }
    }

    pub fn state(&self) -> ExportState {
        self.status.state()
    }

    pub fn status(&self) -> ExportStatus {
        self.status.clone()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether the export trigger should be enabled.
    pub fn can_export(&self) -> bool {
        self.state() == ExportState::Idle && !self.rows.is_empty()
    }

    pub async fn export(
        &mut self,
        format: ExportFormat,
        request: ExportRequest,
    ) -> Result<ExportArtifact, ExportError> {
        self.export_with(Arc::from(renderer_for(format)), request).await
    }

    pub async fn export_with(
        &mut self,
        renderer: Arc<dyn DocumentRenderer>,
        request: ExportRequest,
    ) -> Result<ExportArtifact, ExportError> {
        if self.rows.is_empty() {
            return Err(ExportError::EmptyInput);
        }

        let in_flight = self.status.begin();
        let result = self.run(renderer, request).await;
        drop(in_flight);

        if let Err(err) = &result {
            error!(kind = self.kind.slug(), error = %err, "export failed");
        }
        result
    }

    async fn run(
        &self,
        renderer: Arc<dyn DocumentRenderer>,
        request: ExportRequest,
    ) -> Result<ExportArtifact, ExportError> {
        let format = renderer.format();
        let options = request.options.unwrap_or_else(|| {
            RenderOptions::new(self.kind.title(), chrono::Utc::now().date_naive())
        });
        let filename = resolve_filename(
            request.filename.as_deref(),
            self.kind,
            options.generated_on,
            format,
        );

        let started = Instant::now();
        let rows = Arc::clone(&self.rows);
        let rendered = tokio::task::spawn_blocking(move || renderer.render(&rows, &options)).await;

        let bytes = match rendered {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(err)) => return Err(render_failure(format, &err)),
            Err(join_err) => {
                return Err(ExportError::RenderFailed {
                    format: format.label(),
                    reason: if join_err.is_panic() {
                        "renderer panicked".to_string()
                    } else {
                        join_err.to_string()
                    },
                })
            }
        };

        let path = self.out_dir.join(&filename);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| ExportError::Io {
                path: path.clone(),
                source,
            })?;

        info!(
            kind = self.kind.slug(),
            format = format.label(),
            rows = self.rows.len(),
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "export written to {}",
            path.display()
        );

        Ok(ExportArtifact {
            filename,
            path,
            format,
            mime_type: format.mime_type(),
            bytes: bytes.len(),
        })
    }
}

fn render_failure(format: ExportFormat, err: &RenderError) -> ExportError {
    ExportError::RenderFailed {
        format: format.label(),
        reason: err.to_string(),
    }
}
