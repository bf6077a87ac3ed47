use std::fmt::Write;

use crate::aggregate::{cohort_summary, student_rows};
use crate::filter::FilteredRecords;
use crate::models::{CellValue, DateRange, ExportRow, ReportFilters, ReportKind};

pub fn describe_range(range: &DateRange) -> String {
    match (range.from, range.to) {
        (None, None) => "all dates".to_string(),
        (Some(from), None) => format!("from {from}"),
        (None, Some(to)) => format!("through {to}"),
        (Some(from), Some(to)) => format!("{from} to {to}"),
    }
}

/// Header block lines for a rendered document, beyond title and date.
pub fn metadata_lines(
    kind: ReportKind,
    filters: &ReportFilters,
    filtered: &FilteredRecords,
    rows: &[ExportRow],
) -> Vec<(String, String)> {
    let mut lines = vec![
        ("Report type".to_string(), filters.report_type.as_str().to_string()),
        ("Class".to_string(), filters.class.label().to_string()),
        ("Subject".to_string(), filters.subject.label().to_string()),
        ("Period".to_string(), describe_range(&filters.date_range)),
        ("Records".to_string(), rows.len().to_string()),
    ];

    if kind == ReportKind::Students {
        let summary = cohort_summary(rows);
        lines.push((
            "Mean attendance rate".to_string(),
            format!("{:.1}%", summary.mean_attendance_rate),
        ));
        lines.push((
            "Mean average grade".to_string(),
            format!("{:.1}%", summary.mean_average_grade),
        ));
    }

    let suppressed = filtered.suppressed.total();
    if suppressed > 0 {
        lines.push((
            "Excluded (invalid date)".to_string(),
            suppressed.to_string(),
        ));
    }

    lines
}

fn percent_of(row: &ExportRow, key: &str) -> f64 {
    match row.get(key) {
        Some(CellValue::Percent(value)) => *value,
        _ => 0.0,
    }
}

fn text_of(row: &ExportRow, key: &str) -> String {
    row.get(key).map(|value| value.display()).unwrap_or_default()
}

pub fn build_summary(filters: &ReportFilters, filtered: &FilteredRecords, limit: usize) -> String {
    let rows = student_rows(filtered);
    let summary = cohort_summary(&rows);
    let mut output = String::new();

    let _ = writeln!(output, "# Class Report Summary");
    let _ = writeln!(
        output,
        "Generated for {} / {} ({})",
        filters.class.label(),
        filters.subject.label(),
        describe_range(&filters.date_range)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Totals");
    let _ = writeln!(output, "- Students: {}", summary.student_count);
    let _ = writeln!(output, "- Attendance records: {}", filtered.attendance.len());
    let _ = writeln!(output, "- Grade records: {}", filtered.grades.len());
    let _ = writeln!(
        output,
        "- Mean attendance rate: {:.1}%",
        summary.mean_attendance_rate
    );
    let _ = writeln!(output, "- Mean average grade: {:.1}%", summary.mean_average_grade);

    if filtered.suppressed.total() > 0 {
        let _ = writeln!(
            output,
            "- Excluded for invalid dates: {} attendance, {} grades",
            filtered.suppressed.attendance, filtered.suppressed.grades
        );
    }

    let mut lowest = rows.clone();
    lowest.sort_by(|a, b| {
        percent_of(a, "attendance_rate")
            .partial_cmp(&percent_of(b, "attendance_rate"))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Lowest Attendance");

    if lowest.is_empty() {
        let _ = writeln!(output, "No students match these filters.");
    } else {
        for row in lowest.iter().take(limit) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) attendance {:.1}% average grade {:.1}%",
                text_of(row, "name"),
                text_of(row, "student_id"),
                text_of(row, "class"),
                percent_of(row, "attendance_rate"),
                percent_of(row, "average_grade")
            );
        }
    }

    output
}
