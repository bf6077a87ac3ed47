use std::fmt::Write as _;
use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{columns, DocumentRenderer, ExportFormat, RenderError, RenderOptions};
use crate::models::{CellValue, ExportRow};

const STYLE_PERCENT: u8 = 1;
const STYLE_HEADER: u8 = 2;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="0.0"/></numFmts><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="164" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExcelRenderer;

pub(crate) fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            // XML 1.0 forbids most control characters
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => escaped.push(c),
        }
    }
    escaped
}

fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "Report".to_string()
    } else {
        cleaned
    }
}

fn text_cell(out: &mut String, reference: &str, value: &str, style: Option<u8>) {
    let style = style.map(|s| format!(" s=\"{s}\"")).unwrap_or_default();
    let _ = write!(
        out,
        "<c r=\"{reference}\" t=\"inlineStr\"{style}><is><t xml:space=\"preserve\">{}</t></is></c>",
        escape_xml(value)
    );
}

fn number_cell(out: &mut String, reference: &str, value: f64, style: Option<u8>) {
    let style = style.map(|s| format!(" s=\"{s}\"")).unwrap_or_default();
    let value = if value.is_finite() { value } else { 0.0 };
    let _ = write!(out, "<c r=\"{reference}\"{style}><v>{value}</v></c>");
}

fn worksheet_xml(rows: &[ExportRow], options: &RenderOptions) -> Result<String, RenderError> {
    let columns = columns(rows)?;
    let mut data = String::new();
    let mut row_number = 0usize;

    let metadata = options.metadata_lines();
    for (key, value) in metadata.iter() {
        row_number += 1;
        let _ = write!(data, "<row r=\"{row_number}\">");
        text_cell(&mut data, &format!("A{row_number}"), key, Some(STYLE_HEADER));
        text_cell(&mut data, &format!("B{row_number}"), value, None);
        data.push_str("</row>");
    }
    if !metadata.is_empty() {
        row_number += 1;
    }

    row_number += 1;
    let _ = write!(data, "<row r=\"{row_number}\">");
    for (index, column) in columns.iter().enumerate() {
        let reference = format!("{}{row_number}", column_name(index));
        text_cell(&mut data, &reference, column.label, Some(STYLE_HEADER));
    }
    data.push_str("</row>");
    let header_row = row_number;

    for row in rows {
        row_number += 1;
        let _ = write!(data, "<row r=\"{row_number}\">");
        for (index, column) in columns.iter().enumerate() {
            let reference = format!("{}{row_number}", column_name(index));
            match row.get(column.key) {
                Some(CellValue::Integer(value)) => number_cell(&mut data, &reference, *value as f64, None),
                Some(CellValue::Number(value)) => number_cell(&mut data, &reference, *value, None),
                Some(CellValue::Percent(value)) => {
                    number_cell(&mut data, &reference, *value, Some(STYLE_PERCENT))
                }
                Some(other) => text_cell(&mut data, &reference, &other.display(), None),
                None => {}
            }
        }
        data.push_str("</row>");
    }

    let pane = format!(
        "<sheetViews><sheetView workbookViewId=\"0\"><pane ySplit=\"{header_row}\" topLeftCell=\"A{}\" activePane=\"bottomLeft\" state=\"frozen\"/></sheetView></sheetViews>",
        header_row + 1
    );

    Ok(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">{pane}<sheetData>{data}</sheetData></worksheet>"
    ))
}

fn workbook_xml(options: &RenderOptions) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\"><sheets><sheet name=\"{}\" sheetId=\"1\" r:id=\"rId1\"/></sheets></workbook>",
        escape_xml(&sheet_name(&options.title))
    )
}

impl DocumentRenderer for ExcelRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Excel
    }

    fn render(&self, rows: &[ExportRow], options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        let sheet = worksheet_xml(rows, options)?;
        let workbook = workbook_xml(options);

        let parts: [(&str, &str); 6] = [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", ROOT_RELS),
            ("xl/workbook.xml", workbook.as_str()),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/styles.xml", STYLES),
            ("xl/worksheets/sheet1.xml", sheet.as_str()),
        ];

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, content) in parts {
            zip.start_file(name, opts)
                .map_err(|e| RenderError::Spreadsheet(e.to_string()))?;
            zip.write_all(content.as_bytes())?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| RenderError::Spreadsheet(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}
