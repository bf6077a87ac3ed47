use std::path::Path;

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{ExportRow, ReportKind};

pub mod csv;
pub mod excel;
pub mod pdf;

pub use self::csv::CsvRenderer;
pub use self::excel::ExcelRenderer;
pub use self::pdf::PdfRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Pdf,
    Excel,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Excel => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Csv => "text/csv",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "PDF",
            ExportFormat::Excel => "Excel",
            ExportFormat::Csv => "CSV",
        }
    }
}

/// Page orientation; only the PDF backend reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub title: String,
    pub orientation: Orientation,
    pub include_metadata: bool,
    /// Header block lines embedded when `include_metadata` is set.
    pub metadata: Vec<(String, String)>,
    pub generated_on: NaiveDate,
}

impl RenderOptions {
    pub fn new(title: impl Into<String>, generated_on: NaiveDate) -> Self {
        Self {
            title: title.into(),
            orientation: Orientation::default(),
            include_metadata: true,
            metadata: Vec::new(),
            generated_on,
        }
    }

    pub fn metadata_lines(&self) -> Vec<(String, String)> {
        if !self.include_metadata {
            return Vec::new();
        }

        let mut lines = vec![
            ("Report".to_string(), self.title.clone()),
            (
                "Generated".to_string(),
                self.generated_on.format("%Y-%m-%d").to_string(),
            ),
        ];
        lines.extend(self.metadata.iter().cloned());
        lines
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no rows to render")]
    NoRows,

    #[error("row {row} is missing required field `{key}`")]
    MissingField { row: usize, key: &'static str },

    #[error("csv output failed: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("spreadsheet output failed: {0}")]
    Spreadsheet(String),

    #[error("pdf output failed: {0}")]
    Pdf(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait DocumentRenderer: Send + Sync {
    fn format(&self) -> ExportFormat;

    fn render(&self, rows: &[ExportRow], options: &RenderOptions) -> Result<Vec<u8>, RenderError>;
}

pub fn renderer_for(format: ExportFormat) -> Box<dyn DocumentRenderer> {
    match format {
        ExportFormat::Pdf => Box::new(PdfRenderer),
        ExportFormat::Excel => Box::new(ExcelRenderer),
        ExportFormat::Csv => Box::new(CsvRenderer::default()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub key: &'static str,
    pub label: &'static str,
}

/// Columns come from the first row; every row must carry all of them.
pub fn columns(rows: &[ExportRow]) -> Result<Vec<Column>, RenderError> {
    let first = rows.first().ok_or(RenderError::NoRows)?;
    let columns: Vec<Column> = first
        .cells()
        .iter()
        .map(|cell| Column {
            key: cell.key,
            label: cell.label,
        })
        .collect();

    for (index, row) in rows.iter().enumerate() {
        if let Some(missing) = columns.iter().find(|column| row.get(column.key).is_none()) {
            return Err(RenderError::MissingField {
                row: index,
                key: missing.key,
            });
        }
    }

    Ok(columns)
}

pub fn default_filename(kind: ReportKind, date: NaiveDate, format: ExportFormat) -> String {
    format!(
        "{}-report-{}.{}",
        kind.slug(),
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Uses the final component of the caller's name when given, always ending in
/// the format's extension. Directory parts are dropped so the file stays in the
/// output directory.
pub fn resolve_filename(
    requested: Option<&str>,
    kind: ReportKind,
    date: NaiveDate,
    format: ExportFormat,
) -> String {
    let requested = requested
        .map(str::trim)
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .map(|name| name.trim().trim_end_matches('.'))
        .filter(|name| !name.is_empty());
    let Some(name) = requested else {
        return default_filename(kind, date, format);
    };

    let known = ["pdf", "xlsx", "xls", "csv"];
    let stem = match Path::new(name).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if known.contains(&ext.to_ascii_lowercase().as_str()) => {
            &name[..name.len() - ext.len() - 1]
        }
        _ => name,
    };

    format!("{}.{}", stem, format.extension())
}
