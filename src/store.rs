// Task store: ordered tasks persisted to a key-value slot and reconciled into a view

use crate::codec::{decode_tasks, encode_tasks};
use crate::filter::Filter;
use crate::models::{Task, new_task_id, normalize_text};
use crate::storage::{KeyValueStore, validate_key};
use crate::view::{self, View};
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

/// Storage key used when none is configured
pub const DEFAULT_KEY: &str = "tasks";

/// Blocking yes/no prompt consulted before destructive bulk operations
pub trait Confirm {
    /// Ask whether `count` completed tasks should be deleted
    fn confirm(&mut self, count: usize) -> bool;
}

impl<F: FnMut(usize) -> bool> Confirm for F {
    fn confirm(&mut self, count: usize) -> bool {
        self(count)
    }
}

/// In-process task list backed by a single storage slot
///
/// Every mutation serializes the complete next state and saves it before
/// the in-memory list is replaced, then recomputes the view. If the save
/// fails, the store is left exactly as it was.
pub struct TaskStore<S: KeyValueStore> {
    storage: S,
    key: String,
    tasks: Vec<Task>,
    filter: Filter,
    editing: Option<String>,
    view: View,
}

impl<S: KeyValueStore> TaskStore<S> {
    /// Load the slot named `key` from `storage`
    ///
    /// An absent slot yields an empty store.
    pub fn open(storage: S, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        validate_key(&key)?;

        let tasks = match storage.load(&key).context("Failed to load tasks")? {
            Some(raw) => decode_tasks(&raw)?,
            None => {
                debug!(key = %key, "No stored tasks, starting empty");
                Vec::new()
            }
        };

        let filter = Filter::default();
        let view = view::reconcile(&tasks, filter, None);

        Ok(Self {
            storage,
            key,
            tasks,
            filter,
            editing: None,
            view,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// All tasks in insertion order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Find a task by its full id or by a prefix shared with no other task
    ///
    /// An exact match always wins. A prefix matching several tasks is an error.
    pub fn find_by_prefix(&self, prefix: &str) -> Result<Option<&Task>> {
        if let Some(task) = self.get(prefix) {
            return Ok(Some(task));
        }
        if prefix.is_empty() {
            return Ok(None);
        }

        let mut matches = self.tasks.iter().filter(|t| t.id.starts_with(prefix));
        let first = matches.next();
        if first.is_some() && matches.next().is_some() {
            return Err(eyre!("Ambiguous task id prefix: {}", prefix));
        }
        Ok(first)
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// Id of the task currently open for editing
    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    /// The view as of the last reconciliation
    pub fn view(&self) -> &View {
        &self.view
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Append a new task
    ///
    /// Fails with [`ValidationError::EmptyText`](crate::ValidationError) when
    /// `text` is blank after trimming; nothing changes in that case.
    pub fn add(&mut self, text: &str) -> Result<Task> {
        let text = normalize_text(text)?;

        let mut task = Task::new(text);
        while self.position(&task.id).is_some() {
            task.id = new_task_id();
        }

        let mut next = self.tasks.clone();
        next.push(task.clone());
        self.commit(next)?;

        info!(id = %task.id, "Added task");
        Ok(task)
    }

    /// Flip the completion flag; returns false if no task has this id
    pub fn toggle(&mut self, id: &str) -> Result<bool> {
        let Some(pos) = self.position(id) else {
            debug!(id, "toggle: no such task");
            return Ok(false);
        };

        let mut next = self.tasks.clone();
        next[pos].completed = !next[pos].completed;
        self.commit(next)?;

        debug!(id, completed = self.tasks[pos].completed, "Toggled task");
        Ok(true)
    }

    /// Open `id` for in-place editing and return its current text
    ///
    /// Replaces any session already open on another task.
    pub fn begin_edit(&mut self, id: &str) -> Option<String> {
        let text = self.get(id)?.text.clone();
        self.editing = Some(id.to_string());
        self.reconcile();
        Some(text)
    }

    /// Replace the text of the task being edited
    ///
    /// Returns false without changes when `id` is not the open edit session.
    /// Blank text is rejected and leaves the session open.
    pub fn commit_edit(&mut self, id: &str, new_text: &str) -> Result<bool> {
        if self.editing.as_deref() != Some(id) {
            debug!(id, "commit_edit: task is not being edited");
            return Ok(false);
        }
        let Some(pos) = self.position(id) else {
            self.editing = None;
            self.reconcile();
            return Ok(false);
        };

        let text = normalize_text(new_text)?;

        let mut next = self.tasks.clone();
        next[pos].text = text;
        self.commit(next)?;

        debug!(id, "Edited task");
        Ok(true)
    }

    /// Close the edit session on `id` without changing anything
    pub fn cancel_edit(&mut self, id: &str) {
        if self.editing.as_deref() == Some(id) {
            self.editing = None;
            self.reconcile();
        }
    }

    /// Delete a task; returns false if no task has this id
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let Some(pos) = self.position(id) else {
            debug!(id, "remove: no such task");
            return Ok(false);
        };

        let mut next = self.tasks.clone();
        next.remove(pos);
        self.commit(next)?;

        info!(id, "Removed task");
        Ok(true)
    }

    /// Delete every completed task once `confirm` agrees
    ///
    /// Returns the number of tasks removed. With no completed tasks the
    /// prompt is never shown.
    pub fn clear_completed<C: Confirm + ?Sized>(&mut self, confirm: &mut C) -> Result<usize> {
        let count = self.view.counts.completed;
        if count == 0 {
            return Ok(0);
        }

        if !confirm.confirm(count) {
            debug!(count, "clear_completed: declined");
            return Ok(0);
        }

        let next: Vec<Task> = self.tasks.iter().filter(|t| !t.completed).cloned().collect();
        self.commit(next)?;

        info!(count, "Cleared completed tasks");
        Ok(count)
    }

    /// Change which tasks the view shows
    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
        self.editing = None;
        self.reconcile();
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    fn commit(&mut self, next: Vec<Task>) -> Result<()> {
        let encoded = encode_tasks(&next)?;
        self.storage
            .save(&self.key, &encoded)
            .context("Failed to save tasks")?;

        self.tasks = next;
        self.editing = None;
        self.reconcile();
        Ok(())
    }

    fn reconcile(&mut self) {
        self.view = view::reconcile(&self.tasks, self.filter, self.editing.as_deref());
    }
}
