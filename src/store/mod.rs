//! Persistence layer for documents, claims, history, and signatures
//!
//! The traits define the abstract interface; `SqliteStore` is the bundled
//! relational backend. All cross-request coordination happens through the
//! store, never through in-memory locks, so the engine is safe behind
//! multiple concurrent processes.

pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteStore;
pub use traits::{SignatureRepository, StoreTransaction, WorkflowStore};
