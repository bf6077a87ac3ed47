use ::csv::WriterBuilder;

use super::{columns, DocumentRenderer, ExportFormat, RenderError, RenderOptions};
use crate::models::ExportRow;

#[derive(Debug, Clone)]
pub struct CsvRenderer {
    pub delimiter: u8,
    /// Prefix a UTF-8 BOM so spreadsheet apps detect the encoding.
    pub bom: bool,
}

impl Default for CsvRenderer {
    fn default() -> Self {
        Self {
            delimiter: b',',
            bom: true,
        }
    }
}

impl DocumentRenderer for CsvRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }

    fn render(&self, rows: &[ExportRow], options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        let columns = columns(rows)?;

        let mut buffer = Vec::new();
        if self.bom {
            buffer.extend_from_slice(b"\xEF\xBB\xBF");
        }

        {
            let mut wtr = WriterBuilder::new()
                .delimiter(self.delimiter)
                .flexible(true)
                .from_writer(&mut buffer);

            for (key, value) in options.metadata_lines() {
                wtr.write_record([key.as_str(), value.as_str()])?;
            }

            wtr.write_record(columns.iter().map(|column| column.label))?;

            for row in rows {
                let record: Vec<String> = columns
                    .iter()
                    .map(|column| row.get(column.key).map(|v| v.display()).unwrap_or_default())
                    .collect();
                wtr.write_record(&record)?;
            }

            wtr.flush()?;
        }

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;
    use chrono::NaiveDate;

    fn rows() -> Vec<ExportRow> {
        vec![
            ExportRow::new()
                .with("name", "Name", CellValue::Text("Lee, Avery".to_string()))
                .with("attendance_rate", "Attendance Rate (%)", CellValue::Percent(200.0 / 3.0)),
            ExportRow::new()
                .with("name", "Name", CellValue::Text("Jules Moreno".to_string()))
                .with("attendance_rate", "Attendance Rate (%)", CellValue::Percent(0.0)),
        ]
    }

    fn options(include_metadata: bool) -> RenderOptions {
        let mut options =
            RenderOptions::new("Student Report", NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        options.include_metadata = include_metadata;
        options
    }

    #[test]
    fn writes_header_and_rounded_rows() {
        let renderer = CsvRenderer {
            bom: false,
            ..CsvRenderer::default()
        };
        let bytes = renderer.render(&rows(), &options(false)).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert_eq!(
            text,
            "Name,Attendance Rate (%)\n\"Lee, Avery\",66.7\nJules Moreno,0.0\n"
        );
    }

    #[test]
    fn metadata_lines_precede_the_table() {
        let bytes = CsvRenderer::default().render(&rows(), &options(true)).unwrap();
        assert!(bytes.starts_with(b"\xEF\xBB\xBF"));

        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Report,Student Report"));
        assert_eq!(lines.next(), Some("Generated,2026-10-19"));
        assert_eq!(lines.next(), Some("Name,Attendance Rate (%)"));
    }
}
