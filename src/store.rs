// Task list store: in-memory list, persisted after every change

use crate::kv::{CORRUPT_TODOS_KEY, KeyValueStore, TODOS_KEY};
use crate::models::{IdGenerator, Task, TaskId, TaskList, normalize_text};
use eyre::{Context, Result};
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handle returned by [`TaskListStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&TaskList)>;

/// Owns the task list and every mutation of it.
///
/// Each change is written through to storage before the new snapshot is
/// returned and handed to subscribers. Requests that change nothing (blank
/// text, unknown id) return the current snapshot without writing.
pub struct TaskListStore {
    storage: Rc<dyn KeyValueStore>,
    tasks: TaskList,
    ids: IdGenerator,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl TaskListStore {
    /// Open the store, loading whatever list storage holds
    pub fn open(storage: Rc<dyn KeyValueStore>) -> Result<Self> {
        let tasks = Self::load(storage.as_ref())?;
        let ids = IdGenerator::after(tasks.iter());

        info!(count = tasks.len(), "Loaded task list");

        Ok(Self {
            storage,
            tasks,
            ids,
            listeners: Vec::new(),
            next_subscription: 0,
        })
    }

    /// Read the persisted list.
    ///
    /// A missing key is an empty list. A value that does not parse is copied
    /// to `todos.corrupt` and replaced by an empty list. Storage read errors
    /// are returned so nothing overwrites data that could not be read.
    pub fn load(storage: &dyn KeyValueStore) -> Result<TaskList> {
        let raw = match storage.get(TODOS_KEY).context("Failed to read task list")? {
            Some(raw) => raw,
            None => return Ok(Arc::from(Vec::new())),
        };

        let parsed: Vec<Task> = match serde_json::from_str(&raw) {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %e, "Stored task list is malformed, starting empty");
                keep_corrupt_copy(storage, &raw);
                return Ok(Arc::from(Vec::new()));
            }
        };

        Ok(sanitize(parsed).into())
    }

    /// Current snapshot
    pub fn snapshot(&self) -> TaskList {
        Arc::clone(&self.tasks)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Append a task with trimmed `raw_text`; blank text is ignored
    pub fn add(&mut self, raw_text: &str) -> Result<TaskList> {
        let Some(text) = normalize_text(raw_text) else {
            debug!("Ignoring blank task text");
            return Ok(self.snapshot());
        };

        let id = match self.ids.next_id() {
            Some(id) => id,
            None => smallest_unused_id(&self.tasks),
        };
        let task = Task {
            id,
            text: text.to_string(),
            completed: false,
        };

        let mut next = self.tasks.to_vec();
        next.push(task);
        self.commit(next)
    }

    /// Flip `completed` on the task with `id`; unknown ids are ignored
    pub fn toggle(&mut self, id: TaskId) -> Result<TaskList> {
        if self.get(id).is_none() {
            debug!(id, "Toggle for unknown task ignored");
            return Ok(self.snapshot());
        }

        let next = self
            .tasks
            .iter()
            .map(|t| {
                if t.id == id {
                    Task {
                        completed: !t.completed,
                        ..t.clone()
                    }
                } else {
                    t.clone()
                }
            })
            .collect();
        self.commit(next)
    }

    /// Remove the task with `id`; unknown ids are ignored
    pub fn remove(&mut self, id: TaskId) -> Result<TaskList> {
        if self.get(id).is_none() {
            debug!(id, "Remove for unknown task ignored");
            return Ok(self.snapshot());
        }

        let next = self.tasks.iter().filter(|t| t.id != id).cloned().collect();
        self.commit(next)
    }

    /// Drop every completed task, keeping the order of the rest
    pub fn clear_completed(&mut self) -> Result<TaskList> {
        if !self.tasks.iter().any(|t| t.completed) {
            return Ok(self.snapshot());
        }

        let next = self.tasks.iter().filter(|t| !t.completed).cloned().collect();
        self.commit(next)
    }

    /// Call `listener` with the new snapshot after every persisted change
    pub fn subscribe(&mut self, listener: impl FnMut(&TaskList) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    /// Persist `next`, then make it current and notify subscribers
    fn commit(&mut self, next: Vec<Task>) -> Result<TaskList> {
        let json = serde_json::to_string(&next).context("Failed to serialize task list")?;
        self.storage.set(TODOS_KEY, &json).context("Failed to persist task list")?;

        self.tasks = next.into();
        debug!(count = self.tasks.len(), "Task list saved");

        let snapshot = self.snapshot();
        for (_, listener) in self.listeners.iter_mut() {
            listener(&snapshot);
        }

        Ok(snapshot)
    }
}

/// Set a malformed task list aside under `todos.corrupt`, unless that copy is already there
fn keep_corrupt_copy(storage: &dyn KeyValueStore, raw: &str) {
    match storage.get(CORRUPT_TODOS_KEY) {
        Ok(Some(existing)) if existing == raw => return,
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Failed to read previous copy of malformed task list"),
    }

    if let Err(e) = storage.set(CORRUPT_TODOS_KEY, raw) {
        warn!(error = %e, "Failed to keep a copy of the malformed task list");
    }
}

/// Lowest positive id not used by any task
///
/// Only needed once time-based ids have run out at `i64::MAX`.
fn smallest_unused_id(tasks: &[Task]) -> TaskId {
    let used: HashSet<TaskId> = tasks.iter().map(|t| t.id).collect();
    (1..).find(|id| !used.contains(id)).unwrap_or(0)
}

/// Enforce list invariants on loaded data: distinct ids, non-blank trimmed text
fn sanitize(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    let mut clean = Vec::with_capacity(tasks.len());

    for mut task in tasks {
        let text = match normalize_text(&task.text) {
            Some(text) => text.to_string(),
            None => {
                warn!(id = task.id, "Dropping task with blank text");
                continue;
            }
        };

        if !seen.insert(task.id) {
            warn!(id = task.id, "Dropping task with duplicate id");
            continue;
        }

        task.text = text;
        clean.push(task);
    }

    clean
}
