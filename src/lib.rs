// todostore - Local to-do list with key-value persistence and a reconciled view

pub mod codec;
pub mod config;
pub mod filter;
pub mod models;
pub mod storage;
pub mod store;
pub mod view;

// Re-export main types for convenience
pub use config::{Backend, Config};
pub use filter::Filter;
pub use models::{Task, ValidationError, now_ms};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage, SessionLock, SqliteStorage};
pub use store::{Confirm, DEFAULT_KEY, TaskStore};
pub use view::{Counts, Row, View};
