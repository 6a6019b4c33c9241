//! Encoding store: the `students` table plus the media files it references.

use crate::error::StoreError;
use crate::media::{validate_id, MediaDir};
use eduscan_core::{Embedding, StudentRecord};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;

/// Anything that can hand out the full set of enrolled students.
pub trait Roster {
    fn load_all(&self) -> Result<Vec<StudentRecord>, StoreError>;
}

impl Roster for [StudentRecord] {
    fn load_all(&self) -> Result<Vec<StudentRecord>, StoreError> {
        Ok(self.to_vec())
    }
}

impl Roster for Vec<StudentRecord> {
    fn load_all(&self) -> Result<Vec<StudentRecord>, StoreError> {
        Ok(self.clone())
    }
}

pub struct EncodingStore {
    conn: Connection,
    media: MediaDir,
}

impl EncodingStore {
    pub fn new(conn: Connection, media: MediaDir) -> Self {
        Self { conn, media }
    }

    pub fn media(&self) -> &MediaDir {
        &self.media
    }

    /// Insert a new student. Ids are unique and every stored embedding
    /// shares one dimensionality.
    pub fn save(&self, record: &StudentRecord) -> Result<(), StoreError> {
        validate_id(&record.id)?;
        if record.name.trim().is_empty() {
            return Err(StoreError::InvalidInput("student name is empty".into()));
        }
        if record.embedding.dim() == 0 {
            return Err(StoreError::InvalidInput("face embedding is empty".into()));
        }
        if self.exists(&record.id)? {
            return Err(StoreError::DuplicateKey(record.id.clone()));
        }
        if let Some(expected) = self.stored_dim()? {
            if expected != record.embedding.dim() {
                return Err(StoreError::DimensionMismatch {
                    id: record.id.clone(),
                    expected,
                    actual: record.embedding.dim(),
                });
            }
        }

        let voice = record
            .voice_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        let inserted = self.conn.execute(
            "INSERT INTO students (student_id, name, face_encoding, voice_path)
             VALUES (?1, ?2, ?3, ?4)",
            params![record.id, record.name, record.embedding.to_bytes(), voice],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::DuplicateKey(record.id.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(student_id = %record.id, name = %record.name, "student registered");
        Ok(())
    }

    pub fn exists(&self, student_id: &str) -> Result<bool, StoreError> {
        let found: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM students WHERE student_id = ?1)",
            [student_id],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    pub fn get(&self, student_id: &str) -> Result<Option<StudentRecord>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT student_id, name, face_encoding, voice_path
                 FROM students WHERE student_id = ?1",
                [student_id],
                raw_row,
            )
            .optional()?;
        row.map(into_record).transpose()
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Students whose name or id contains `text`, case-insensitively.
    pub fn search(&self, text: &str) -> Result<Vec<StudentRecord>, StoreError> {
        let pattern = format!("%{}%", text.trim());
        let mut stmt = self.conn.prepare(
            "SELECT student_id, name, face_encoding, voice_path FROM students
             WHERE name LIKE ?1 OR student_id LIKE ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map([pattern], raw_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(into_record(row?)?);
        }
        Ok(out)
    }

    /// Remove a student row, their unit assignments and media files.
    /// Returns whether a row existed; deleting an unknown id is a no-op.
    pub fn delete(&self, student_id: &str) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM students WHERE student_id = ?1", [student_id])?;
        self.conn.execute(
            "DELETE FROM student_units WHERE student_id = ?1",
            [student_id],
        )?;
        if validate_id(student_id).is_ok() {
            self.media.remove(student_id)?;
        }
        if removed > 0 {
            tracing::info!(student_id, "student deleted");
        }
        Ok(removed > 0)
    }

    fn stored_dim(&self) -> Result<Option<usize>, StoreError> {
        let len: Option<i64> = self
            .conn
            .query_row(
                "SELECT length(face_encoding) FROM students ORDER BY id LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(len.map(|bytes| bytes as usize / 4))
    }
}

impl Roster for EncodingStore {
    /// All students in insertion order.
    fn load_all(&self) -> Result<Vec<StudentRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id, name, face_encoding, voice_path FROM students ORDER BY id",
        )?;
        let rows = stmt.query_map([], raw_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(into_record(row?)?);
        }
        tracing::debug!(count = out.len(), "students loaded");
        Ok(out)
    }
}

type RawStudent = (String, String, Option<Vec<u8>>, Option<String>);

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawStudent> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_record((id, name, blob, voice): RawStudent) -> Result<StudentRecord, StoreError> {
    let embedding = blob
        .as_deref()
        .and_then(Embedding::from_bytes)
        .filter(|e| e.dim() > 0)
        .ok_or_else(|| StoreError::CorruptEmbedding(id.clone()))?;
    Ok(StudentRecord {
        id,
        name,
        embedding,
        voice_path: voice.filter(|v| !v.is_empty()).map(PathBuf::from),
    })
}
