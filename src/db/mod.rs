//! Database module: models and schema for the identity store.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and caller payloads
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: queries over the four subject tables

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{DbCredential, EducationRecord, PersonalDetail, Role, SubjectId};
pub use schema::SQLITE_INIT;
pub use sqlite::{IdentityStorage, SqlitePool};
