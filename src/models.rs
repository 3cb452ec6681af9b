// Data models for the task list

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stable task identity, serialized as a JSON number
pub type TaskId = i64;

/// Immutable snapshot of the task list, in insertion order
pub type TaskList = Arc<[Task]>;

/// A single to-do entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
}

impl Task {
    /// Build a new, not yet completed task.
    ///
    /// Returns `None` when `raw_text` is empty after trimming.
    pub fn new(id: TaskId, raw_text: &str) -> Option<Self> {
        let text = normalize_text(raw_text)?;

        Some(Self {
            id,
            text: text.to_string(),
            completed: false,
        })
    }
}

/// Task text with surrounding whitespace removed, or `None` if nothing is left
pub fn normalize_text(raw_text: &str) -> Option<&str> {
    let text = raw_text.trim();
    if text.is_empty() { None } else { Some(text) }
}

/// Issues task ids that are unique and strictly increasing.
///
/// Ids track wall-clock milliseconds, so they stay close to the creation time,
/// but two ids issued in the same millisecond (or after a clock step backwards)
/// are bumped past the last one instead of colliding. Once the last id is
/// `i64::MAX` no further id can be issued and `None` is returned.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: TaskId,
}

impl IdGenerator {
    /// Start after the highest id already in use
    pub fn after<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let last = tasks.into_iter().map(|t| t.id).max().unwrap_or(0);
        Self { last }
    }

    /// Next id based on the current time
    pub fn next_id(&mut self) -> Option<TaskId> {
        self.next_at(now_ms())
    }

    /// Next id given a timestamp in milliseconds
    pub fn next_at(&mut self, now: i64) -> Option<TaskId> {
        let id = now.max(self.last.checked_add(1)?);
        self.last = id;
        Some(id)
    }

    pub fn last(&self) -> TaskId {
        self.last
    }
}

/// Current timestamp in milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
