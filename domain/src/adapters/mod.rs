//! In-memory adapters that live inside the domain crate.
//!
//! Used by unit tests and by the API server when `STORAGE_PROVIDER=memory`.
//! The SQLite implementation lives in its own crate.

pub mod memory_repo;
