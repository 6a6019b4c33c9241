//! eduscan-store — Persistence for students, units and attendance.
//!
//! One SQLite file holds the relational data; the attendance ledger can be
//! mirrored to a JSON log. Per-student media live in a flat directory.

pub mod db;
pub mod error;
pub mod ledger;
pub mod media;
pub mod students;
pub mod summary;
pub mod units;

pub use error::StoreError;
pub use ledger::{AttendanceEvent, EventFilter, JsonLedger, Ledger, SqliteLedger, TeeLedger};
pub use media::{validate_id, MediaDir};
pub use students::{EncodingStore, Roster};
pub use summary::Summary;
pub use units::{ActiveUnit, Unit, UnitRegistry};

/// Timestamp layout shared by the database and the JSON log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
