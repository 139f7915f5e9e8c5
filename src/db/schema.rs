//! SQL DDL for initializing the identity store.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - `credentials` keyed by subject UUID, UNIQUE `username` and `email`
///   (the indexes, not the application lookups, guarantee uniqueness)
/// - `personal_details`, `education_records`, `medical_records` each 1:1 with
///   a credential through a foreign key on `subject_id`
/// - personal names hold ciphertext or the literal 'N/A' for unset
/// - `education_records.seq` preserves insertion order across upserts
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS credentials (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('admin', 'staff', 'student')),
    created_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL -- RFC3339
);

CREATE TABLE IF NOT EXISTS personal_details (
    subject_id TEXT PRIMARY KEY REFERENCES credentials(id),
    first_name TEXT NOT NULL DEFAULT 'N/A',
    last_name TEXT NOT NULL DEFAULT 'N/A'
);

CREATE TABLE IF NOT EXISTS education_records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id TEXT NOT NULL UNIQUE REFERENCES credentials(id),
    education_level TEXT NOT NULL,
    year_level TEXT NULL,
    section TEXT NULL,
    department TEXT NULL,
    strand TEXT NULL,
    course TEXT NULL
);

CREATE INDEX IF NOT EXISTS idx_education_records_level ON education_records(education_level);

CREATE TABLE IF NOT EXISTS medical_records (
    subject_id TEXT PRIMARY KEY REFERENCES credentials(id),
    created_at TEXT NOT NULL -- RFC3339
);
"#;
