// TodoStore - Persistent task list with pluggable key-value storage

pub mod config;
pub mod filter;
pub mod jsonl;
pub mod kv;
pub mod models;
pub mod render;
pub mod sqlite;
pub mod store;
pub mod theme;

// Re-export main types for convenience
pub use config::Config;
pub use filter::{FilterMode, active_count, filtered_view};
pub use kv::{Backend, KeyValueStore, MemoryStorage, open_backend};
pub use models::{IdGenerator, Task, TaskId, TaskList, now_ms};
pub use store::{SubscriptionId, TaskListStore};
pub use theme::ThemeStore;
