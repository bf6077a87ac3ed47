use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use super::{columns, Column, DocumentRenderer, ExportFormat, Orientation, RenderError, RenderOptions};
use crate::models::ExportRow;

// A4 in points
const SHORT_EDGE: i64 = 595;
const LONG_EDGE: i64 = 842;
const MARGIN: i64 = 40;
const FONT_SIZE: i64 = 9;
const TITLE_SIZE: i64 = 14;
const LEADING: i64 = 12;
/// Courier advance is 600/1000 em.
const CHAR_WIDTH: f64 = FONT_SIZE as f64 * 0.6;
const MAX_COLUMN_CHARS: usize = 28;
const MIN_COLUMN_CHARS: usize = 4;
const GAP: &str = "  ";
const COLUMN_GAP: usize = GAP.len();

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfRenderer;

struct PageGeometry {
    width: i64,
    height: i64,
}

impl PageGeometry {
    fn for_orientation(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Portrait => Self {
                width: SHORT_EDGE,
                height: LONG_EDGE,
            },
            Orientation::Landscape => Self {
                width: LONG_EDGE,
                height: SHORT_EDGE,
            },
        }
    }

    fn chars_per_line(&self) -> usize {
        ((self.width - 2 * MARGIN) as f64 / CHAR_WIDTH).floor() as usize
    }

    fn lines_per_page(&self) -> usize {
        ((self.height - 2 * MARGIN - LEADING) / LEADING).max(1) as usize
    }
}

/// Base-14 Courier only covers Latin-1 reliably; anything else becomes `?`.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

fn fit(text: &str, width: usize) -> String {
    let clean = sanitize(text);
    if clean.chars().count() <= width {
        format!("{clean:<width$}")
    } else if width <= 1 {
        clean.chars().take(width).collect()
    } else {
        let mut cut: String = clean.chars().take(width - 1).collect();
        cut.push('~');
        cut
    }
}

fn column_widths(columns: &[Column], rows: &[ExportRow], available: usize) -> Vec<usize> {
    let mut widths: Vec<usize> = columns
        .iter()
        .map(|column| {
            rows.iter()
                .filter_map(|row| row.get(column.key))
                .map(|value| value.display().chars().count())
                .chain(std::iter::once(column.label.chars().count()))
                .max()
                .unwrap_or(MIN_COLUMN_CHARS)
                .clamp(MIN_COLUMN_CHARS, MAX_COLUMN_CHARS)
        })
        .collect();

    let gaps = COLUMN_GAP * columns.len().saturating_sub(1);
    let budget = available.saturating_sub(gaps);
    let total: usize = widths.iter().sum();
    if total > budget && total > 0 {
        for width in widths.iter_mut() {
            *width = (*width * budget / total).max(MIN_COLUMN_CHARS);
        }
    }
    widths
}

fn table_line(cells: impl Iterator<Item = String>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(text, width)| fit(&text, *width))
        .collect::<Vec<_>>()
        .join(GAP)
        .trim_end()
        .to_string()
}

struct Line {
    text: String,
    bold: bool,
}

fn page_content(title: &str, lines: &[Line], geometry: &PageGeometry, footer: &str) -> Content {
    let top = geometry.height - MARGIN - TITLE_SIZE;
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F2".into(), TITLE_SIZE.into()]),
        Operation::new("Td", vec![MARGIN.into(), top.into()]),
        Operation::new("Tj", vec![Object::string_literal(sanitize(title))]),
        Operation::new("TL", vec![LEADING.into()]),
        Operation::new("T*", vec![]),
        Operation::new("T*", vec![]),
    ];

    let mut bold = None;
    for line in lines {
        if bold != Some(line.bold) {
            let font = if line.bold { "F2" } else { "F1" };
            operations.push(Operation::new("Tf", vec![font.into(), FONT_SIZE.into()]));
            bold = Some(line.bold);
        }
        operations.push(Operation::new("Tj", vec![Object::string_literal(line.text.clone())]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));

    operations.extend([
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
        Operation::new("Td", vec![MARGIN.into(), (MARGIN / 2).into()]),
        Operation::new("Tj", vec![Object::string_literal(footer.to_string())]),
        Operation::new("ET", vec![]),
    ]);

    Content { operations }
}

impl DocumentRenderer for PdfRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Pdf
    }

    fn render(&self, rows: &[ExportRow], options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        let columns = columns(rows)?;
        let geometry = PageGeometry::for_orientation(options.orientation);
        let widths = column_widths(&columns, rows, geometry.chars_per_line());

        let header = Line {
            text: table_line(columns.iter().map(|c| c.label.to_string()), &widths),
            bold: true,
        };
        let rule_width = widths.iter().sum::<usize>() + COLUMN_GAP * widths.len().saturating_sub(1);
        let rule = "-".repeat(rule_width.min(geometry.chars_per_line()));

        let mut preamble: Vec<Line> = options
            .metadata_lines()
            .into_iter()
            .map(|(key, value)| Line {
                text: sanitize(&format!("{key}: {value}")),
                bold: false,
            })
            .collect();
        if !preamble.is_empty() {
            preamble.push(Line {
                text: String::new(),
                bold: false,
            });
        }

        let body: Vec<Line> = rows
            .iter()
            .map(|row| Line {
                text: table_line(
                    columns
                        .iter()
                        .map(|c| row.get(c.key).map(|v| v.display()).unwrap_or_default()),
                    &widths,
                ),
                bold: false,
            })
            .collect();

        // title takes two lines, header + rule two more
        let capacity = geometry.lines_per_page().saturating_sub(4).max(1);
        let mut pages: Vec<Vec<Line>> = Vec::new();
        let mut current: Vec<Line> = preamble;
        let mut budget = capacity.saturating_sub(current.len()).max(1);
        let mut body = body.into_iter().peekable();

        while body.peek().is_some() {
            current.push(Line {
                text: header.text.clone(),
                bold: true,
            });
            current.push(Line {
                text: rule.clone(),
                bold: false,
            });
            current.extend(body.by_ref().take(budget));
            pages.push(std::mem::take(&mut current));
            budget = capacity;
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier-Bold",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular_id,
                "F2" => bold_id,
            },
        });

        let page_count = pages.len();
        let mut kids: Vec<Object> = Vec::with_capacity(page_count);
        for (index, lines) in pages.iter().enumerate() {
            let footer = format!("Page {} of {}", index + 1, page_count);
            let content = page_content(&options.title, lines, &geometry, &footer);
            let encoded = content
                .encode()
                .map_err(|e| RenderError::Pdf(e.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id: ObjectId = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), geometry.width.into(), geometry.height.into()],
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
                "Resources" => resources_id,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(sanitize(&options.title)),
            "Producer" => Object::string_literal("school-report-export"),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;
    use chrono::NaiveDate;

    fn rows(count: usize) -> Vec<ExportRow> {
        (0..count)
            .map(|i| {
                ExportRow::new()
                    .with("name", "Name", CellValue::Text(format!("Student {i}")))
                    .with("rate", "Rate (%)", CellValue::Percent(100.0 / 3.0))
            })
            .collect()
    }

    fn options(orientation: Orientation) -> RenderOptions {
        let mut options =
            RenderOptions::new("Student Report", NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        options.orientation = orientation;
        options
    }

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|window| window == needle.as_bytes())
    }

    #[test]
    fn renders_a_loadable_single_page() {
        let bytes = PdfRenderer.render(&rows(3), &options(Orientation::Portrait)).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert!(contains(&bytes, "Student 2"));
        assert!(contains(&bytes, "33.3"));
        assert!(!contains(&bytes, "33.33"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn landscape_swaps_the_media_box_and_needs_more_pages() {
        let portrait = PdfRenderer.render(&rows(150), &options(Orientation::Portrait)).unwrap();
        let landscape = PdfRenderer.render(&rows(150), &options(Orientation::Landscape)).unwrap();

        let portrait = Document::load_mem(&portrait).unwrap();
        let landscape = Document::load_mem(&landscape).unwrap();
        assert!(landscape.get_pages().len() > portrait.get_pages().len());
        assert!(portrait.get_pages().len() >= 3);

        let (_, first) = landscape.get_pages().into_iter().next().unwrap();
        let media_box: Vec<i64> = landscape
            .get_dictionary(first)
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|value| value.as_i64().unwrap())
            .collect();
        assert_eq!(media_box, vec![0, 0, LONG_EDGE, SHORT_EDGE]);
    }

    #[test]
    fn non_ascii_text_is_replaced_not_rejected() {
        assert_eq!(sanitize("Zoë Ng"), "Zo? Ng");
        assert_eq!(fit("abcdefgh", 5), "abcd~");
        assert_eq!(fit("ab", 4), "ab  ");
    }
}
