//! Taskboard Storage Layer
//!
//! SQLite persistence for the agent-access authorization server:
//! registered OAuth clients, standing consents, single-use
//! authorization codes, and hashed access/refresh tokens.
//!
//! All exclusivity invariants (single-use codes, consent upsert,
//! idempotent revocation) are enforced by atomic SQL statements rather
//! than in-process locks, so multiple server processes can share one
//! database.
//!
//! # Usage
//!
//! ```rust,ignore
//! use taskboard_storage::{ClientRepository, ConsentRepository, Database};
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//!
//! let db = Arc::new(Mutex::new(Database::open(&path)?));
//! let clients = ClientRepository::new(db.clone());
//! let consents = ConsentRepository::new(db.clone());
//! ```

mod database;
mod repositories;

pub use database::Database;
pub use repositories::*;

/// Default database file name.
pub const DATABASE_FILE: &str = "taskboard.db";
