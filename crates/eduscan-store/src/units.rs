//! Course units, their student assignments and the prepared active unit.

use crate::error::StoreError;
use crate::ledger::write_pretty_json;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

const PASSWORD_LEN: usize = 6;
const PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: i64,
    pub name: String,
    pub code: String,
}

impl Unit {
    /// Identifier used for this unit in attendance events.
    pub fn ledger_id(&self) -> String {
        self.id.to_string()
    }
}

/// The unit currently prepared for attendance, as written to `active_unit.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUnit {
    pub unit_id: i64,
    pub unit_name: String,
    pub unit_code: String,
    pub password: String,
}

impl ActiveUnit {
    /// Prepare `unit` with a fresh password and persist it to `path`.
    pub fn prepare<R: Rng>(unit: &Unit, path: &Path, rng: &mut R) -> Result<Self, StoreError> {
        let active = Self {
            unit_id: unit.id,
            unit_name: unit.name.clone(),
            unit_code: unit.code.clone(),
            password: generate_password(rng),
        };
        write_pretty_json(path, &active)?;
        tracing::info!(unit_id = unit.id, code = %unit.code, "unit prepared for attendance");
        Ok(active)
    }

    /// Read the prepared unit back. `None` when nothing has been prepared.
    pub fn load(path: &Path) -> Result<Option<Self>, StoreError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn generate_password<R: Rng>(rng: &mut R) -> String {
    (0..PASSWORD_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..PASSWORD_ALPHABET.len());
            PASSWORD_ALPHABET[idx] as char
        })
        .collect()
}

pub struct UnitRegistry {
    conn: Connection,
}

impl UnitRegistry {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn add(&self, name: &str, code: &str) -> Result<Unit, StoreError> {
        let (name, code) = (name.trim(), code.trim());
        if name.is_empty() || code.is_empty() {
            return Err(StoreError::InvalidInput(
                "unit name and code are required".into(),
            ));
        }
        self.conn.execute(
            "INSERT INTO units (unit_name, unit_code) VALUES (?1, ?2)",
            params![name, code],
        )?;
        let unit = Unit {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            code: code.to_string(),
        };
        tracing::info!(unit_id = unit.id, code = %unit.code, "unit added");
        Ok(unit)
    }

    pub fn list(&self) -> Result<Vec<Unit>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, unit_name, unit_code FROM units ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Unit {
                id: row.get(0)?,
                name: row.get(1)?,
                code: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get(&self, id: i64) -> Result<Option<Unit>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, unit_name, unit_code FROM units WHERE id = ?1",
                [id],
                |row| {
                    Ok(Unit {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        code: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Look a unit up by numeric id or by code (case-insensitive).
    pub fn resolve(&self, key: &str) -> Result<Unit, StoreError> {
        let key = key.trim();
        if let Ok(id) = key.parse::<i64>() {
            if let Some(unit) = self.get(id)? {
                return Ok(unit);
            }
        }
        self.list()?
            .into_iter()
            .find(|u| u.code.eq_ignore_ascii_case(key))
            .ok_or_else(|| {
                StoreError::InvalidInput(format!("no unit with id or code {key:?}"))
            })
    }

    /// Delete a unit and its assignments. Returns whether it existed.
    pub fn remove(&self, id: i64) -> Result<bool, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM student_units WHERE unit_id = ?1", [id])?;
        let removed = tx.execute("DELETE FROM units WHERE id = ?1", [id])?;
        tx.commit()?;
        if removed > 0 {
            tracing::info!(unit_id = id, "unit removed");
        }
        Ok(removed > 0)
    }

    /// Replace the set of students assigned to `unit_id`.
    pub fn assign(&self, unit_id: i64, student_ids: &[String]) -> Result<(), StoreError> {
        if self.get(unit_id)?.is_none() {
            return Err(StoreError::UnitNotFound(unit_id));
        }

        let tx = self.conn.unchecked_transaction()?;
        for id in student_ids {
            let known: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM students WHERE student_id = ?1)",
                [id],
                |row| row.get(0),
            )?;
            if !known {
                return Err(StoreError::StudentNotFound(id.clone()));
            }
        }
        tx.execute("DELETE FROM student_units WHERE unit_id = ?1", [unit_id])?;
        for id in student_ids {
            tx.execute(
                "INSERT INTO student_units (student_id, unit_id) VALUES (?1, ?2)",
                params![id, unit_id],
            )?;
        }
        tx.commit()?;

        tracing::info!(unit_id, students = student_ids.len(), "unit assignments replaced");
        Ok(())
    }

    /// Student ids assigned to `unit_id`, in assignment order.
    pub fn students(&self, unit_id: i64) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id FROM student_units WHERE unit_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([unit_id], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM units", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use rand::SeedableRng;

    fn registry() -> UnitRegistry {
        let conn = db::open_in_memory().unwrap();
        conn.execute_batch(
            "INSERT INTO students (student_id, name) VALUES ('S1', 'Alice');
             INSERT INTO students (student_id, name) VALUES ('S2', 'Bob');
             INSERT INTO students (student_id, name) VALUES ('S3', 'Carol');",
        )
        .unwrap();
        UnitRegistry::new(conn)
    }

    #[test]
    fn test_add_trims_and_requires_fields() {
        let reg = registry();
        let unit = reg.add("  Operating Systems ", " CS201").unwrap();
        assert_eq!(unit.name, "Operating Systems");
        assert_eq!(unit.code, "CS201");
        assert!(matches!(reg.add("", "X"), Err(StoreError::InvalidInput(_))));
        assert!(matches!(
            reg.add("Name", "   "),
            Err(StoreError::InvalidInput(_))
        ));
        assert_eq!(reg.count().unwrap(), 1);
    }

    #[test]
    fn test_assign_replaces_whole_set() {
        let reg = registry();
        let unit = reg.add("Networks", "CS301").unwrap();

        reg.assign(unit.id, &["S1".into(), "S2".into()]).unwrap();
        assert_eq!(reg.students(unit.id).unwrap(), vec!["S1", "S2"]);

        reg.assign(unit.id, &["S3".into()]).unwrap();
        assert_eq!(reg.students(unit.id).unwrap(), vec!["S3"]);
    }

    #[test]
    fn test_assign_unknown_student_keeps_previous_set() {
        let reg = registry();
        let unit = reg.add("Networks", "CS301").unwrap();
        reg.assign(unit.id, &["S1".into()]).unwrap();

        let ids = ["S2".to_string(), "S9".to_string()];
        let err = reg.assign(unit.id, &ids).unwrap_err();
        assert!(matches!(err, StoreError::StudentNotFound(id) if id == "S9"));
        assert_eq!(reg.students(unit.id).unwrap(), vec!["S1"]);
    }

    #[test]
    fn test_assign_unknown_unit() {
        let reg = registry();
        assert!(matches!(
            reg.assign(42, &["S1".into()]),
            Err(StoreError::UnitNotFound(42))
        ));
    }

    #[test]
    fn test_remove_drops_assignments() {
        let reg = registry();
        let unit = reg.add("Networks", "CS301").unwrap();
        reg.assign(unit.id, &["S1".into()]).unwrap();

        assert!(reg.remove(unit.id).unwrap());
        assert!(reg.get(unit.id).unwrap().is_none());
        assert!(reg.students(unit.id).unwrap().is_empty());
        assert!(!reg.remove(unit.id).unwrap());
    }

    #[test]
    fn test_resolve_by_id_or_code() {
        let reg = registry();
        let unit = reg.add("Networks", "CS301").unwrap();
        assert_eq!(reg.resolve(&unit.id.to_string()).unwrap(), unit);
        assert_eq!(reg.resolve("cs301").unwrap(), unit);
        assert!(reg.resolve("MATH100").is_err());
    }

    #[test]
    fn test_password_shape() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let pw = generate_password(&mut rng);
            assert_eq!(pw.len(), 6);
            assert!(pw
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_prepare_and_load_active_unit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("active_unit.json");
        assert!(ActiveUnit::load(&path).unwrap().is_none());

        let unit = Unit { id: 3, name: "Networks".into(), code: "CS301".into() };
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let active = ActiveUnit::prepare(&unit, &path, &mut rng).unwrap();

        let loaded = ActiveUnit::load(&path).unwrap().unwrap();
        assert_eq!(loaded, active);
        assert_eq!(loaded.unit_code, "CS301");

        let text = std::fs::read_to_string(&path).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw["unit_id"], 3);
        assert_eq!(raw["password"].as_str().unwrap().len(), 6);
    }
}
