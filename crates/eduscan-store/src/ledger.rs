//! Attendance ledger: append-only events with a same-day de-duplication lookup.
//!
//! [`SqliteLedger`] writes the `attendance` table, [`JsonLedger`] keeps the
//! human-readable JSON log, [`TeeLedger`] writes both.

use crate::error::StoreError;
use crate::TIMESTAMP_FORMAT;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One attendance mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub student_id: String,
    pub name: String,
    /// Logs written before units existed have no unit.
    #[serde(default)]
    pub unit_id: String,
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
}

impl AttendanceEvent {
    /// Build an event; sub-second precision is dropped.
    pub fn new(
        student_id: impl Into<String>,
        name: impl Into<String>,
        unit_id: impl Into<String>,
        at: NaiveDateTime,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            name: name.into(),
            unit_id: unit_id.into(),
            timestamp: at.with_nanosecond(0).unwrap_or(at),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Selection for [`Ledger::events`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub unit_id: Option<String>,
    pub date: Option<NaiveDate>,
    /// Case-insensitive substring of the student id or name.
    pub text: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, event: &AttendanceEvent) -> bool {
        if let Some(unit) = &self.unit_id {
            if &event.unit_id != unit {
                return false;
            }
        }
        if let Some(date) = self.date {
            if event.date() != date {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            if !event.student_id.to_lowercase().contains(&needle)
                && !event.name.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

pub trait Ledger {
    /// True if `student_id` already has an event for `unit_id` on `date`.
    fn already_logged(
        &self,
        student_id: &str,
        unit_id: &str,
        date: NaiveDate,
    ) -> Result<bool, StoreError>;

    /// Append an event. Uniqueness is the caller's job.
    fn log(&mut self, event: &AttendanceEvent) -> Result<(), StoreError>;

    /// Delete every event. Returns how many were removed.
    fn clear_all(&mut self) -> Result<usize, StoreError>;

    /// Matching events, newest first.
    fn events(&self, filter: &EventFilter) -> Result<Vec<AttendanceEvent>, StoreError>;

    fn count_on(&self, date: NaiveDate) -> Result<usize, StoreError> {
        let filter = EventFilter {
            date: Some(date),
            ..EventFilter::default()
        };
        Ok(self.events(&filter)?.len())
    }
}

impl<L: Ledger + ?Sized> Ledger for Box<L> {
    fn already_logged(
        &self,
        student_id: &str,
        unit_id: &str,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        (**self).already_logged(student_id, unit_id, date)
    }

    fn log(&mut self, event: &AttendanceEvent) -> Result<(), StoreError> {
        (**self).log(event)
    }

    fn clear_all(&mut self) -> Result<usize, StoreError> {
        (**self).clear_all()
    }

    fn events(&self, filter: &EventFilter) -> Result<Vec<AttendanceEvent>, StoreError> {
        (**self).events(filter)
    }

    fn count_on(&self, date: NaiveDate) -> Result<usize, StoreError> {
        (**self).count_on(date)
    }
}

// ── SQLite ────────────────────────────────────────────────────────────────

pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl Ledger for SqliteLedger {
    fn already_logged(
        &self,
        student_id: &str,
        unit_id: &str,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        let day = date.format("%Y-%m-%d").to_string();
        let found: bool = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM attendance
                WHERE student_id = ?1 AND unit_id = ?2 AND date(timestamp) = ?3
            )",
            [student_id, unit_id, day.as_str()],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    fn log(&mut self, event: &AttendanceEvent) -> Result<(), StoreError> {
        let ts = event.timestamp.format(TIMESTAMP_FORMAT).to_string();
        self.conn.execute(
            "INSERT INTO attendance (student_id, name, unit_id, timestamp) VALUES (?1, ?2, ?3, ?4)",
            [
                event.student_id.as_str(),
                event.name.as_str(),
                event.unit_id.as_str(),
                ts.as_str(),
            ],
        )?;
        tracing::debug!(
            student_id = %event.student_id,
            unit_id = %event.unit_id,
            "attendance row written"
        );
        Ok(())
    }

    fn clear_all(&mut self) -> Result<usize, StoreError> {
        let removed = self.conn.execute("DELETE FROM attendance", [])?;
        tracing::warn!(removed, "attendance table cleared");
        Ok(removed)
    }

    fn events(&self, filter: &EventFilter) -> Result<Vec<AttendanceEvent>, StoreError> {
        let mut sql = String::from(
            "SELECT student_id, name, unit_id, timestamp FROM attendance WHERE 1 = 1",
        );
        let mut args: Vec<String> = Vec::new();
        if let Some(unit) = &filter.unit_id {
            args.push(unit.clone());
            sql.push_str(&format!(" AND unit_id = ?{}", args.len()));
        }
        if let Some(date) = filter.date {
            args.push(date.format("%Y-%m-%d").to_string());
            sql.push_str(&format!(" AND date(timestamp) = ?{}", args.len()));
        }
        if let Some(text) = &filter.text {
            args.push(format!("%{}%", text.trim()));
            let n = args.len();
            sql.push_str(&format!(" AND (student_id LIKE ?{n} OR name LIKE ?{n})"));
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (student_id, name, unit_id, ts) = row?;
            out.push(AttendanceEvent {
                student_id,
                name: name.unwrap_or_default(),
                unit_id: unit_id.unwrap_or_default(),
                timestamp: parse_timestamp(&ts)?,
            });
        }
        Ok(out)
    }

    fn count_on(&self, date: NaiveDate) -> Result<usize, StoreError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM attendance WHERE date(timestamp) = ?1",
            [date.format("%Y-%m-%d").to_string()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

// ── JSON log ──────────────────────────────────────────────────────────────

/// JSON array on disk, rewritten in full on every append.
pub struct JsonLedger {
    path: PathBuf,
}

impl JsonLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All events in file order. A missing or empty file is an empty log.
    pub fn load(&self) -> Result<Vec<AttendanceEvent>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn store(&self, events: &[AttendanceEvent]) -> Result<(), StoreError> {
        write_pretty_json(&self.path, events)
    }
}

impl Ledger for JsonLedger {
    fn already_logged(
        &self,
        student_id: &str,
        unit_id: &str,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        Ok(self
            .load()?
            .iter()
            .any(|e| {
                e.student_id == student_id && e.unit_id == unit_id && e.date() == date
            }))
    }

    fn log(&mut self, event: &AttendanceEvent) -> Result<(), StoreError> {
        let mut events = self.load()?;
        events.push(event.clone());
        self.store(&events)?;
        tracing::debug!(
            path = %self.path.display(),
            total = events.len(),
            "attendance log updated"
        );
        Ok(())
    }

    fn clear_all(&mut self) -> Result<usize, StoreError> {
        let removed = self.load()?.len();
        self.store(&[])?;
        Ok(removed)
    }

    fn events(&self, filter: &EventFilter) -> Result<Vec<AttendanceEvent>, StoreError> {
        let mut out: Vec<AttendanceEvent> = self
            .load()?
            .into_iter()
            .rev()
            .filter(|e| filter.matches(e))
            .collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(out)
    }
}

/// Write `value` as four-space indented JSON via a temp file and rename.
pub fn write_pretty_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &buf)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// ── Tee ───────────────────────────────────────────────────────────────────

/// Primary ledger plus a best-effort mirror. Reads only touch the primary.
pub struct TeeLedger<P, M> {
    primary: P,
    mirror: M,
}

impl<P: Ledger, M: Ledger> TeeLedger<P, M> {
    pub fn new(primary: P, mirror: M) -> Self {
        Self { primary, mirror }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn mirror(&self) -> &M {
        &self.mirror
    }
}

impl<P: Ledger, M: Ledger> Ledger for TeeLedger<P, M> {
    fn already_logged(
        &self,
        student_id: &str,
        unit_id: &str,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        self.primary.already_logged(student_id, unit_id, date)
    }

    fn log(&mut self, event: &AttendanceEvent) -> Result<(), StoreError> {
        self.primary.log(event)?;
        if let Err(e) = self.mirror.log(event) {
            tracing::warn!(
                error = %e,
                student_id = %event.student_id,
                "attendance mirror write failed"
            );
        }
        Ok(())
    }

    fn clear_all(&mut self) -> Result<usize, StoreError> {
        let removed = self.primary.clear_all()?;
        if let Err(e) = self.mirror.clear_all() {
            tracing::warn!(error = %e, "attendance mirror clear failed");
        }
        Ok(removed)
    }

    fn events(&self, filter: &EventFilter) -> Result<Vec<AttendanceEvent>, StoreError> {
        self.primary.events(filter)
    }

    fn count_on(&self, date: NaiveDate) -> Result<usize, StoreError> {
        self.primary.count_on(date)
    }
}

pub(crate) fn parse_timestamp(s: &str) -> Result<NaiveDateTime, StoreError> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)
        .map_err(|_| StoreError::BadTimestamp(s.to_string()))
}

mod timestamp {
    use super::parse_timestamp;
    use crate::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
