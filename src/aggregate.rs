use std::collections::HashMap;

use crate::filter::{parse_record_date, FilteredRecords};
use crate::models::{AttendanceStatus, CellValue, ExportRow, ReportKind, StudentRecord};

pub const UNKNOWN_STUDENT: &str = "Unknown";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Tally {
    present: usize,
    total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct GradeTally {
    percentage_sum: f64,
    count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CohortSummary {
    pub student_count: usize,
    pub mean_attendance_rate: f64,
    pub mean_average_grade: f64,
}

pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 || !whole.is_finite() || !part.is_finite() {
        0.0
    } else {
        part / whole * 100.0
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn name_lookup(students: &[StudentRecord]) -> HashMap<&str, &str> {
    students
        .iter()
        .map(|student| (student.student_id.as_str(), student.name.as_str()))
        .collect()
}

fn date_cell(raw: &str) -> CellValue {
    match parse_record_date(raw) {
        Some(date) => CellValue::Date(date),
        None => CellValue::Text(raw.to_string()),
    }
}

pub fn student_rows(filtered: &FilteredRecords) -> Vec<ExportRow> {
    let mut attendance: HashMap<&str, Tally> = HashMap::new();
    for record in filtered.attendance.iter() {
        let entry = attendance.entry(record.student_id.as_str()).or_default();
        entry.total += 1;
        if record.status == AttendanceStatus::Present {
            entry.present += 1;
        }
    }

    let mut grades: HashMap<&str, GradeTally> = HashMap::new();
    for record in filtered.grades.iter() {
        let entry = grades.entry(record.student_id.as_str()).or_default();
        entry.percentage_sum += percentage(record.score, record.max_score);
        entry.count += 1;
    }

    filtered
        .students
        .iter()
        .map(|student| {
            let tally = attendance
                .get(student.student_id.as_str())
                .copied()
                .unwrap_or_default();
            let grade = grades
                .get(student.student_id.as_str())
                .copied()
                .unwrap_or_default();

            ExportRow::new()
                .with("student_id", "Student ID", CellValue::Text(student.student_id.clone()))
                .with("name", "Name", CellValue::Text(student.name.clone()))
                .with("class", "Class", CellValue::Text(student.class_id.clone()))
                .with("grade", "Grade", CellValue::Text(student.grade.clone()))
                .with("status", "Status", CellValue::Text(student.status.as_str().to_string()))
                .with(
                    "days_recorded",
                    "Days Recorded",
                    CellValue::Integer(tally.total as i64),
                )
                .with(
                    "attendance_rate",
                    "Attendance Rate (%)",
                    CellValue::Percent(percentage(tally.present as f64, tally.total as f64)),
                )
                .with(
                    "average_grade",
                    "Average Grade (%)",
                    CellValue::Percent(mean(grade.percentage_sum, grade.count)),
                )
        })
        .collect()
}

pub fn attendance_rows(filtered: &FilteredRecords) -> Vec<ExportRow> {
    let names = name_lookup(&filtered.students);

    filtered
        .attendance
        .iter()
        .map(|record| {
            let name = names
                .get(record.student_id.as_str())
                .copied()
                .unwrap_or(UNKNOWN_STUDENT);

            ExportRow::new()
                .with("date", "Date", date_cell(&record.date))
                .with("student_id", "Student ID", CellValue::Text(record.student_id.clone()))
                .with("student_name", "Student Name", CellValue::Text(name.to_string()))
                .with(
                    "class",
                    "Class",
                    CellValue::Text(record.class_id.clone().unwrap_or_default()),
                )
                .with(
                    "subject",
                    "Subject",
                    CellValue::Text(record.subject.clone().unwrap_or_default()),
                )
                .with("status", "Status", CellValue::Text(record.status.as_str().to_string()))
        })
        .collect()
}

pub fn grade_rows(filtered: &FilteredRecords) -> Vec<ExportRow> {
    let names = name_lookup(&filtered.students);

    filtered
        .grades
        .iter()
        .map(|record| {
            let name = names
                .get(record.student_id.as_str())
                .copied()
                .unwrap_or(UNKNOWN_STUDENT);

            ExportRow::new()
                .with("date", "Date", date_cell(&record.date))
                .with("student_id", "Student ID", CellValue::Text(record.student_id.clone()))
                .with("student_name", "Student Name", CellValue::Text(name.to_string()))
                .with("subject", "Subject", CellValue::Text(record.subject.clone()))
                .with("assignment", "Assignment", CellValue::Text(record.assignment.clone()))
                .with("score", "Score", CellValue::Number(record.score))
                .with("max_score", "Max Score", CellValue::Number(record.max_score))
                .with(
                    "percentage",
                    "Percentage (%)",
                    CellValue::Percent(percentage(record.score, record.max_score)),
                )
        })
        .collect()
}

pub fn rows_for(kind: ReportKind, filtered: &FilteredRecords) -> Vec<ExportRow> {
    match kind {
        ReportKind::Students => student_rows(filtered),
        ReportKind::Attendance => attendance_rows(filtered),
        ReportKind::Grades => grade_rows(filtered),
    }
}

pub fn cohort_summary(student_rows: &[ExportRow]) -> CohortSummary {
    let mut attendance_sum = 0.0;
    let mut grade_sum = 0.0;

    for row in student_rows {
        if let Some(CellValue::Percent(rate)) = row.get("attendance_rate") {
            attendance_sum += rate;
        }
        if let Some(CellValue::Percent(avg)) = row.get("average_grade") {
            grade_sum += avg;
        }
    }

    CohortSummary {
        student_count: student_rows.len(),
        mean_attendance_rate: mean(attendance_sum, student_rows.len()),
        mean_average_grade: mean(grade_sum, student_rows.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::apply_filters;
    use crate::models::{
        AttendanceRecord, GradeRecord, ReportFilters, Snapshot, StudentStatus,
    };

    fn student(student_id: &str, name: &str) -> StudentRecord {
        StudentRecord {
            id: format!("id-{student_id}"),
            student_id: student_id.to_string(),
            name: name.to_string(),
            class_id: "4B".to_string(),
            grade: "4".to_string(),
            status: StudentStatus::Active,
        }
    }

    fn attendance(student_id: &str, day: u32, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: format!("att-{student_id}-{day}"),
            student_id: student_id.to_string(),
            date: format!("2026-03-{day:02}"),
            status,
            subject: None,
            class_id: Some("4B".to_string()),
        }
    }

    fn grade(student_id: &str, score: f64, max_score: f64) -> GradeRecord {
        GradeRecord {
            id: format!("grd-{student_id}-{score}"),
            student_id: student_id.to_string(),
            subject: "Math".to_string(),
            assignment: "Unit test".to_string(),
            score,
            max_score,
            date: "2026-03-05".to_string(),
            class_id: Some("4B".to_string()),
        }
    }

    fn fixture() -> FilteredRecords {
        use AttendanceStatus::*;
        let statuses = [Present, Present, Absent, Present, Present];
        let other = [Present, Late, Absent, Present, Excused];

        let mut records = Vec::new();
        for (i, status) in statuses.iter().enumerate() {
            records.push(attendance("S1", i as u32 + 1, *status));
        }
        for (i, status) in other.iter().enumerate() {
            records.push(attendance("S2", i as u32 + 1, *status));
        }

        let snapshot = Snapshot {
            synced_at: None,
            students: vec![student("S1", "Avery Lee"), student("S2", "Jules Moreno")],
            attendance: records,
            grades: vec![
                grade("S1", 18.0, 20.0),
                grade("S1", 7.0, 10.0),
                grade("S2", 45.0, 50.0),
                grade("S2", 3.0, 4.0),
                grade("S2", 0.0, 0.0),
            ],
        };
        apply_filters(&snapshot, &ReportFilters::default())
    }

    fn percent(row: &ExportRow, key: &str) -> f64 {
        match row.get(key) {
            Some(CellValue::Percent(value)) => *value,
            other => panic!("expected percent for {key}, got {other:?}"),
        }
    }

    #[test]
    fn attendance_rate_uses_each_students_own_rows() {
        let rows = student_rows(&fixture());
        assert_eq!(rows.len(), 2);
        assert!((percent(&rows[0], "attendance_rate") - 80.0).abs() < 1e-9);
        assert!((percent(&rows[1], "attendance_rate") - 40.0).abs() < 1e-9);
    }

    #[test]
    fn average_grade_is_mean_of_percentages() {
        let rows = student_rows(&fixture());
        assert!((percent(&rows[0], "average_grade") - 80.0).abs() < 1e-9);
        // (90 + 75 + 0) / 3, zero max score counts as 0
        assert!((percent(&rows[1], "average_grade") - 55.0).abs() < 1e-9);
    }

    #[test]
    fn students_without_records_get_zero_not_nan() {
        let filtered = FilteredRecords {
            students: vec![student("S9", "Kiara Patel")],
            ..FilteredRecords::default()
        };
        let rows = student_rows(&filtered);
        assert_eq!(percent(&rows[0], "attendance_rate"), 0.0);
        assert_eq!(percent(&rows[0], "average_grade"), 0.0);
    }

    #[test]
    fn unresolved_student_falls_back_to_unknown() {
        let filtered = FilteredRecords {
            students: vec![student("S1", "Avery Lee")],
            attendance: vec![attendance("ghost", 2, AttendanceStatus::Absent)],
            grades: vec![grade("ghost", 1.0, 2.0)],
            ..FilteredRecords::default()
        };

        let rows = attendance_rows(&filtered);
        assert_eq!(
            rows[0].get("student_name"),
            Some(&CellValue::Text(UNKNOWN_STUDENT.to_string()))
        );
        let rows = grade_rows(&filtered);
        assert_eq!(
            rows[0].get("student_name"),
            Some(&CellValue::Text(UNKNOWN_STUDENT.to_string()))
        );
        assert!((percent(&rows[0], "percentage") - 50.0).abs() < 1e-9);
    }

    #[test]
    fn aggregation_is_repeatable() {
        let filtered = fixture();
        for kind in [ReportKind::Students, ReportKind::Attendance, ReportKind::Grades] {
            assert_eq!(rows_for(kind, &filtered), rows_for(kind, &filtered));
        }
        assert_eq!(fixture(), filtered);
    }

    #[test]
    fn cohort_summary_averages_rows() {
        let summary = cohort_summary(&student_rows(&fixture()));
        assert_eq!(summary.student_count, 2);
        assert!((summary.mean_attendance_rate - 60.0).abs() < 1e-9);
        assert!((summary.mean_average_grade - 67.5).abs() < 1e-9);
        assert_eq!(cohort_summary(&[]), CohortSummary::default());
    }
}
