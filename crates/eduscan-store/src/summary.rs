//! Dashboard counts.

use crate::error::StoreError;
use crate::units::ActiveUnit;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub students: usize,
    pub units: usize,
    pub attendance_today: usize,
    pub active_unit: Option<ActiveUnit>,
}

impl Summary {
    pub fn collect(
        conn: &Connection,
        today: NaiveDate,
        active_unit_path: &Path,
    ) -> Result<Self, StoreError> {
        let count = |sql: &str| -> Result<usize, StoreError> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        let attendance_today: i64 = conn.query_row(
            "SELECT COUNT(*) FROM attendance WHERE date(timestamp) = ?1",
            [today.format("%Y-%m-%d").to_string()],
            |row| row.get(0),
        )?;

        let active_unit = match ActiveUnit::load(active_unit_path) {
            Ok(active) => active,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %active_unit_path.display(),
                    "active unit file unreadable"
                );
                None
            }
        };

        Ok(Self {
            students: count("SELECT COUNT(*) FROM students")?,
            units: count("SELECT COUNT(*) FROM units")?,
            attendance_today: attendance_today as usize,
            active_unit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_counts() {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::open_in_memory().unwrap();
        conn.execute_batch(
            "INSERT INTO students (student_id, name) VALUES ('S1', 'Alice'), ('S2', 'Bob');
             INSERT INTO units (unit_name, unit_code) VALUES ('Networks', 'CS301');
             INSERT INTO attendance (student_id, name, unit_id, timestamp)
                VALUES ('S1', 'Alice', '1', '2024-01-10 09:00:00'),
                       ('S2', 'Bob', '1', '2024-01-09 09:00:00');",
        )
        .unwrap();

        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let active_path = dir.path().join("active_unit.json");
        let summary = Summary::collect(&conn, today, &active_path).unwrap();
        assert_eq!(summary.students, 2);
        assert_eq!(summary.units, 1);
        assert_eq!(summary.attendance_today, 1);
        assert!(summary.active_unit.is_none());
    }
}
