//! The canonical collection.
//!
//! # Invariants
//! - No two tasks share an id; records with an empty id are never stored.
//! - Tasks are kept in a stable sort by `created_at_ms` ascending, so ties
//!   keep their insertion order.
//! - `done` only ever moves from `false` to `true`.

use std::collections::BTreeSet;

use crate::task::{local_id, Task, TaskId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut list = Self::new();
        list.replace_all(tasks);
        list
    }

    /// Swaps in a whole new collection. Records without an id and repeated
    /// ids (first occurrence wins) are dropped; the number dropped is
    /// returned.
    pub fn replace_all(&mut self, tasks: Vec<Task>) -> usize {
        let incoming = tasks.len();
        let mut seen = BTreeSet::new();
        self.tasks = tasks
            .into_iter()
            .filter(|t| !t.id.is_empty() && seen.insert(t.id.clone()))
            .collect();
        self.sort();
        incoming - self.tasks.len()
    }

    /// Appends `task`, or replaces the record already holding its id.
    pub fn upsert(&mut self, task: Task) -> bool {
        if task.id.is_empty() {
            return false;
        }
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => {
                let done = existing.done || task.done;
                *existing = task;
                existing.done = done;
            }
            None => self.tasks.push(task),
        }
        self.sort();
        true
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn set_title(&mut self, id: &str, title: &str) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.title = title.to_owned();
                true
            }
            None => false,
        }
    }

    /// Returns true only when the task existed and was not done yet.
    pub fn mark_done(&mut self, id: &str) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) if !task.done => {
                task.done = true;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let idx = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(idx))
    }

    /// A temporary id not yet used by any task in the collection.
    pub fn unique_local_id(&self, now_ms: u64) -> TaskId {
        let base = local_id(now_ms);
        if !self.contains(&base) {
            return base;
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("{base}-{n}");
            if !self.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn as_slice(&self) -> &[Task] {
        &self.tasks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn sort(&mut self) {
        self.tasks.sort_by_key(|t| t.created_at_ms);
    }
}
