use chrono::{DateTime, NaiveDate};
use tracing::{debug, warn};

use crate::models::{AttendanceRecord, DateRange, GradeRecord, ReportFilters, Snapshot, StudentRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuppressedRows {
    pub attendance: usize,
    pub grades: usize,
}

impl SuppressedRows {
    pub fn total(&self) -> usize {
        self.attendance + self.grades
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredRecords {
    pub students: Vec<StudentRecord>,
    pub attendance: Vec<AttendanceRecord>,
    pub grades: Vec<GradeRecord>,
    /// Rows dropped because their date could not be parsed against a bounded range.
    pub suppressed: SuppressedRows,
}

impl FilteredRecords {
    pub fn is_empty(&self) -> bool {
        self.students.is_empty() && self.attendance.is_empty() && self.grades.is_empty()
    }
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(trimmed).ok().map(|dt| dt.date_naive()))
}

enum DateMatch {
    Inside,
    Outside,
    Malformed,
}

fn match_date(range: &DateRange, raw: &str) -> DateMatch {
    if range.is_unbounded() {
        return DateMatch::Inside;
    }

    match parse_record_date(raw) {
        Some(date) if range.contains(date) => DateMatch::Inside,
        Some(_) => DateMatch::Outside,
        None => DateMatch::Malformed,
    }
}

pub fn apply_filters(snapshot: &Snapshot, filters: &ReportFilters) -> FilteredRecords {
    let mut suppressed = SuppressedRows::default();

    let students: Vec<StudentRecord> = snapshot
        .students
        .iter()
        .filter(|student| filters.class.matches(Some(&student.class_id)))
        .cloned()
        .collect();

    let mut attendance = Vec::new();
    for record in snapshot.attendance.iter() {
        if !filters.class.matches(record.class_id.as_deref())
            || !filters.subject.matches(record.subject.as_deref())
        {
            continue;
        }

        match match_date(&filters.date_range, &record.date) {
            DateMatch::Inside => attendance.push(record.clone()),
            DateMatch::Outside => {}
            DateMatch::Malformed => suppressed.attendance += 1,
        }
    }

    let mut grades = Vec::new();
    for record in snapshot.grades.iter() {
        if !filters.class.matches(record.class_id.as_deref())
            || !filters.subject.matches(Some(&record.subject))
        {
            continue;
        }

        match match_date(&filters.date_range, &record.date) {
            DateMatch::Inside => grades.push(record.clone()),
            DateMatch::Outside => {}
            DateMatch::Malformed => suppressed.grades += 1,
        }
    }

    if suppressed.total() > 0 {
        warn!(
            attendance = suppressed.attendance,
            grades = suppressed.grades,
            "excluded records with unparseable dates"
        );
    }

    debug!(
        students = students.len(),
        attendance = attendance.len(),
        grades = grades.len(),
        class = filters.class.label(),
        subject = filters.subject.label(),
        "filters applied"
    );

    FilteredRecords {
        students,
        attendance,
        grades,
        suppressed,
    }
}
