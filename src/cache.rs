use std::path::Path;

use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{
    AttendanceRecord, AttendanceStatus, GradeRecord, Snapshot, StudentRecord, StudentStatus,
};

pub fn load_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read offline cache {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&raw)
        .with_context(|| format!("offline cache {} is not a valid snapshot", path.display()))?;

    info!(
        students = snapshot.students.len(),
        attendance = snapshot.attendance.len(),
        grades = snapshot.grades.len(),
        "loaded offline cache"
    );
    Ok(snapshot)
}

pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write offline cache {}", path.display()))?;
    Ok(())
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        ("S-1001", "Avery Lee", "4B", "Grade 4", "active"),
        ("S-1002", "Jules Moreno", "4B", "Grade 4", "active"),
        ("S-1003", "Kiara Patel", "5C", "Grade 5", "active"),
        ("S-1004", "Noah Okafor", "5C", "Grade 5", "inactive"),
    ];

    for &(student_id, name, class_id, grade, status) in students.iter() {
        sqlx::query(
            r#"
            INSERT INTO school_reports.students (id, student_id, full_name, class_id, grade, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_id) DO UPDATE
            SET full_name = EXCLUDED.full_name, class_id = EXCLUDED.class_id,
                grade = EXCLUDED.grade, status = EXCLUDED.status
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(name)
        .bind(class_id)
        .bind(grade)
        .bind(status)
        .execute(pool)
        .await?;
    }

    let first_day = NaiveDate::from_ymd_opt(2026, 2, 2).context("invalid date")?;
    let pattern = ["present", "present", "late", "present", "absent"];

    for (offset, &(student_id, _, class_id, _, _)) in students.iter().enumerate() {
        for day in 0..10i64 {
            let status = pattern[(day as usize + offset) % pattern.len()];
            let recorded_on = first_day + Duration::days(day);
            let subject = if day % 2 == 0 { "Math" } else { "Science" };

            sqlx::query(
                r#"
                INSERT INTO school_reports.attendance
                (id, student_id, recorded_on, status, subject, class_id, source_key)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (source_key) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(student_id)
            .bind(recorded_on)
            .bind(status)
            .bind(subject)
            .bind(class_id)
            .bind(format!("seed-att-{student_id}-{day}"))
            .execute(pool)
            .await?;
        }
    }

    let grades = vec![
        ("S-1001", "Math", "Fractions quiz", 18.0, 20.0, 3),
        ("S-1001", "Science", "Plant lab", 42.0, 50.0, 6),
        ("S-1002", "Math", "Fractions quiz", 12.0, 20.0, 3),
        ("S-1002", "Science", "Plant lab", 35.0, 50.0, 6),
        ("S-1003", "Math", "Decimals test", 88.0, 100.0, 4),
        ("S-1003", "Science", "Weather journal", 9.0, 10.0, 8),
    ];

    for (student_id, subject, assignment, score, max_score, day) in grades {
        let class_id = students
            .iter()
            .find(|(id, ..)| *id == student_id)
            .map(|(_, _, class_id, _, _)| *class_id);

        sqlx::query(
            r#"
            INSERT INTO school_reports.grades
            (id, student_id, subject, assignment, score, max_score, recorded_on, class_id, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(subject)
        .bind(assignment)
        .bind(score)
        .bind(max_score)
        .bind(first_day + Duration::days(day))
        .bind(class_id)
        .bind(format!("seed-grd-{student_id}-{subject}-{assignment}"))
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_snapshot(pool: &PgPool) -> anyhow::Result<Snapshot> {
    let student_rows = sqlx::query(
        "SELECT id, student_id, full_name, class_id, grade, status \
         FROM school_reports.students ORDER BY class_id, full_name",
    )
    .fetch_all(pool)
    .await
    .context("failed to load students")?;

    let mut students = Vec::with_capacity(student_rows.len());
    for row in student_rows {
        let id: Uuid = row.get("id");
        let status: String = row.get("status");
        students.push(StudentRecord {
            id: id.to_string(),
            student_id: row.get("student_id"),
            name: row.get("full_name"),
            class_id: row.get("class_id"),
            grade: row.get("grade"),
            status: StudentStatus::parse(&status),
        });
    }

    let attendance_rows = sqlx::query(
        "SELECT id, student_id, recorded_on, status, subject, class_id \
         FROM school_reports.attendance ORDER BY recorded_on, student_id",
    )
    .fetch_all(pool)
    .await
    .context("failed to load attendance")?;

    let mut attendance = Vec::with_capacity(attendance_rows.len());
    for row in attendance_rows {
        let id: Uuid = row.get("id");
        let raw_status: String = row.get("status");
        let Some(status) = AttendanceStatus::parse(&raw_status) else {
            warn!(id = %id, status = %raw_status, "skipping attendance row with unknown status");
            continue;
        };
        let recorded_on: NaiveDate = row.get("recorded_on");
        attendance.push(AttendanceRecord {
            id: id.to_string(),
            student_id: row.get("student_id"),
            date: recorded_on.to_string(),
            status,
            subject: row.get("subject"),
            class_id: row.get("class_id"),
        });
    }

    let grade_rows = sqlx::query(
        "SELECT id, student_id, subject, assignment, score, max_score, recorded_on, class_id \
         FROM school_reports.grades ORDER BY recorded_on, student_id",
    )
    .fetch_all(pool)
    .await
    .context("failed to load grades")?;

    let mut grades = Vec::with_capacity(grade_rows.len());
    for row in grade_rows {
        let id: Uuid = row.get("id");
        let recorded_on: NaiveDate = row.get("recorded_on");
        grades.push(GradeRecord {
            id: id.to_string(),
            student_id: row.get("student_id"),
            subject: row.get("subject"),
            assignment: row.get("assignment"),
            score: row.get("score"),
            max_score: row.get("max_score"),
            date: recorded_on.to_string(),
            class_id: row.get("class_id"),
        });
    }

    Ok(Snapshot {
        synced_at: Some(Utc::now()),
        students,
        attendance,
        grades,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_backend_shaped_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(
            &path,
            r#"{
                "students": [
                    {"id": "u1", "studentId": "S-1001", "name": "Avery Lee", "classId": "4B", "grade": "Grade 4", "status": "active"}
                ],
                "attendance": [
                    {"id": "a1", "studentId": "S-1001", "date": "2026-02-02", "status": "late", "subject": "Math"}
                ]
            }"#,
        )
        .unwrap();

        let snapshot = load_snapshot(&path).unwrap();
        assert_eq!(snapshot.students[0].class_id, "4B");
        assert_eq!(snapshot.attendance[0].status, AttendanceStatus::Late);
        assert_eq!(snapshot.attendance[0].class_id, None);
        assert!(snapshot.grades.is_empty());
        assert!(snapshot.synced_at.is_none());
    }

    #[test]
    fn saved_snapshot_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let snapshot = Snapshot {
            synced_at: Some(Utc::now()),
            grades: vec![GradeRecord {
                id: "g1".to_string(),
                student_id: "S-1001".to_string(),
                subject: "Math".to_string(),
                assignment: "Quiz".to_string(),
                score: 7.5,
                max_score: 10.0,
                date: "2026-02-05".to_string(),
                class_id: Some("4B".to_string()),
            }],
            ..Snapshot::default()
        };

        save_snapshot(&path, &snapshot).unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), snapshot);
    }

    #[test]
    fn missing_cache_reports_the_path() {
        let err = load_snapshot(Path::new("/nonexistent/cache.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/cache.json"));
    }
}
