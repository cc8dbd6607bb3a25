//! Persistence layer for the tab lifecycle manager
//!
//! State lives in a key-value store of versioned JSON blobs. The
//! [`kv::KeyValueStore`] trait abstracts the backend: an in-memory map for
//! tests and ephemeral profiles, SQLite for durable installs. The typed
//! [`repository::StateRepository`] sits on top and is the only code that
//! knows the key names and blob shapes.

pub mod batch;
pub mod kv;
pub mod repository;
pub mod schema;
pub mod sqlite;

pub use batch::StateBatch;
pub use kv::{KeyChange, KeyValueStore, MemoryKvStore};
pub use repository::StateRepository;
pub use sqlite::SqliteKvStore;
