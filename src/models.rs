use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
    Graduated,
    Suspended,
    Transferred,
    #[serde(other)]
    Other,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Inactive => "inactive",
            StudentStatus::Graduated => "graduated",
            StudentStatus::Suspended => "suspended",
            StudentStatus::Transferred => "transferred",
            StudentStatus::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "active" => StudentStatus::Active,
            "inactive" => StudentStatus::Inactive,
            "graduated" => StudentStatus::Graduated,
            "suspended" => StudentStatus::Suspended,
            "transferred" => StudentStatus::Transferred,
            _ => StudentStatus::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            "excused" => Some(AttendanceStatus::Excused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub student_id: String,
    pub name: String,
    pub class_id: String,
    pub grade: String,
    pub status: StudentStatus,
}

/// Dates stay as the raw cached string; the filter decides what parses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub date: String,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub class_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub id: String,
    pub student_id: String,
    pub subject: String,
    pub assignment: String,
    pub score: f64,
    pub max_score: f64,
    pub date: String,
    #[serde(default)]
    pub class_id: Option<String>,
}

/// One offline-cache snapshot of the backend collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub students: Vec<StudentRecord>,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    #[serde(default)]
    pub grades: Vec<GradeRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClassFilter {
    #[default]
    AllClasses,
    SpecificClass(String),
}

impl ClassFilter {
    pub fn from_option(value: Option<String>) -> Self {
        value.map_or(ClassFilter::AllClasses, ClassFilter::SpecificClass)
    }

    pub fn matches(&self, class_id: Option<&str>) -> bool {
        match self {
            ClassFilter::AllClasses => true,
            ClassFilter::SpecificClass(wanted) => class_id == Some(wanted.as_str()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ClassFilter::AllClasses => "all classes",
            ClassFilter::SpecificClass(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubjectFilter {
    #[default]
    AllSubjects,
    SpecificSubject(String),
}

impl SubjectFilter {
    pub fn from_option(value: Option<String>) -> Self {
        value.map_or(SubjectFilter::AllSubjects, SubjectFilter::SpecificSubject)
    }

    pub fn matches(&self, subject: Option<&str>) -> bool {
        match self {
            SubjectFilter::AllSubjects => true,
            SubjectFilter::SpecificSubject(wanted) => subject == Some(wanted.as_str()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SubjectFilter::AllSubjects => "all subjects",
            SubjectFilter::SpecificSubject(name) => name,
        }
    }
}

/// Inclusive on both ends; a missing bound is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// The trailing window ending today, at least one day long. Windows
    /// reaching past the calendar start at `NaiveDate::MIN`.
    pub fn last_days(days: i64, today: NaiveDate) -> Self {
        let from = chrono::Duration::try_days(days.max(1))
            .and_then(|span| today.checked_sub_signed(span))
            .unwrap_or(NaiveDate::MIN);

        Self {
            from: Some(from),
            to: Some(today),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportType {
    #[default]
    Summary,
    Detailed,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Summary => "summary",
            ReportType::Detailed => "detailed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportFilters {
    pub date_range: DateRange,
    pub class: ClassFilter,
    pub subject: SubjectFilter,
    pub report_type: ReportType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportKind {
    Students,
    Attendance,
    Grades,
}

impl ReportKind {
    pub fn slug(&self) -> &'static str {
        match self {
            ReportKind::Students => "students",
            ReportKind::Attendance => "attendance",
            ReportKind::Grades => "grades",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::Students => "Student Report",
            ReportKind::Attendance => "Attendance Report",
            ReportKind::Grades => "Grade Report",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Number(f64),
    /// Stored at full precision, rounded to one decimal when rendered.
    Percent(f64),
    Date(NaiveDate),
}

impl CellValue {
    pub fn display(&self) -> String {
        match self {
            CellValue::Text(value) => value.clone(),
            CellValue::Integer(value) => value.to_string(),
            CellValue::Number(value) => format!("{}", value),
            CellValue::Percent(value) => format!("{:.1}", value),
            CellValue::Date(value) => value.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub key: &'static str,
    pub label: &'static str,
    pub value: CellValue,
}

/// Format-neutral output unit shared by every renderer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExportRow {
    cells: Vec<Cell>,
}

impl ExportRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, label: &'static str, value: CellValue) -> Self {
        self.cells.push(Cell { key, label, value });
        self
    }

    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|cell| cell.key == key)
            .map(|cell| &cell.value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.cells.iter().map(|cell| cell.key)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_filter_all_is_not_a_class_name() {
        let specific = ClassFilter::SpecificClass("all".to_string());
        assert!(specific.matches(Some("all")));
        assert!(!specific.matches(Some("5A")));
        assert!(!specific.matches(None));
        assert!(ClassFilter::AllClasses.matches(None));
        assert_eq!(ClassFilter::from_option(None), ClassFilter::AllClasses);
    }

    #[test]
    fn date_range_is_inclusive_and_open_ended() {
        let day = |d| NaiveDate::from_ymd_opt(2026, 3, d).unwrap();
        let range = DateRange {
            from: Some(day(2)),
            to: Some(day(4)),
        };
        assert!(range.contains(day(2)));
        assert!(range.contains(day(4)));
        assert!(!range.contains(day(5)));

        let open = DateRange {
            from: None,
            to: Some(day(4)),
        };
        assert!(open.contains(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()));
        assert!(DateRange::default().is_unbounded());
    }

    #[test]
    fn trailing_window_respects_days() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let range = DateRange::last_days(14, today);
        assert_eq!(range.from, NaiveDate::from_ymd_opt(2026, 3, 1));
        assert_eq!(range.to, Some(today));
        assert_eq!(DateRange::last_days(0, today).from, NaiveDate::from_ymd_opt(2026, 3, 14));
    }

    #[test]
    fn huge_trailing_window_clamps_to_calendar_start() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        for days in [200_000_000, 1_000_000_000_000, i64::MAX] {
            let range = DateRange::last_days(days, today);
            assert_eq!(range.from, Some(NaiveDate::MIN));
            assert_eq!(range.to, Some(today));
            assert!(range.contains(NaiveDate::from_ymd_opt(1900, 1, 1).unwrap()));
        }
    }

    #[test]
    fn unknown_student_status_deserializes_as_other() {
        let json = r#"{"id":"1","studentId":"S1","name":"Avery","classId":"5A","grade":"5","status":"on-leave"}"#;
        let student: StudentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(student.status, StudentStatus::Other);
    }

    #[test]
    fn percent_rounds_only_on_display() {
        let cell = CellValue::Percent(200.0 / 3.0);
        assert_eq!(cell.display(), "66.7");
        assert_eq!(cell, CellValue::Percent(200.0 / 3.0));
    }
}
