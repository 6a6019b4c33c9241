//! Database bootstrap: open, idempotent schema, forward-only migrations.

use crate::error::StoreError;
pub use rusqlite::Connection;
use std::path::Path;

/// The schema version this build expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id TEXT UNIQUE,
    name TEXT,
    face_encoding BLOB,
    voice_path TEXT
);

CREATE TABLE IF NOT EXISTS attendance (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id TEXT,
    name TEXT,
    unit_id TEXT,
    timestamp TEXT
);

CREATE TABLE IF NOT EXISTS units (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    unit_name TEXT NOT NULL,
    unit_code TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS student_units (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id TEXT,
    unit_id INTEGER
);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1');
"#;

/// Open (or create) the database at `path` with schema and migrations applied.
pub fn open_database(path: &Path) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    init(&conn)?;

    tracing::debug!(path = %path.display(), "database opened");
    Ok(conn)
}

/// In-memory database with the full schema, for tests and dry runs.
pub fn open_in_memory() -> Result<Connection, StoreError> {
    let conn = Connection::open_in_memory()?;
    init(&conn)?;
    Ok(conn)
}

fn init(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA_SQL)?;
    run_migrations(conn)?;
    Ok(())
}

pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let mut version = schema_version(conn)?;

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        let tx = conn.unchecked_transaction()?;
        match next {
            2 => migrate_v1_to_v2(&tx)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                break;
            }
        }
        tx.execute(
            "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
            [next.to_string()],
        )?;
        tx.commit()?;
        version = next;
    }

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_attendance_lookup ON attendance(student_id, unit_id, timestamp);
         CREATE INDEX IF NOT EXISTS idx_student_units_unit ON student_units(unit_id);",
    )?;
    Ok(())
}

/// v1 → v2: attendance rows carry the unit they were taken for.
/// Databases created before units existed lack the column.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    if !has_column(conn, "attendance", "unit_id")? {
        conn.execute("ALTER TABLE attendance ADD COLUMN unit_id TEXT", [])?;
    }
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
