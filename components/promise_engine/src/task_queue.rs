//! Task and microtask queue management.
//!
//! This module provides the queues used by the reference [`EventLoop`]:
//! a timer queue ordered by due time (ties broken by scheduling order) and
//! a FIFO microtask queue.
//!
//! [`EventLoop`]: crate::EventLoop

use crate::host::{Job, TimerId};
use core_types::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// A timer callback waiting in the task queue.
pub struct Task {
    id: TimerId,
    due: u64,
    callback: Job,
}

impl Task {
    /// Creates a task that becomes runnable at virtual time `due` (ms).
    pub fn new<F>(id: TimerId, due: u64, f: F) -> Self
    where
        F: FnOnce() -> Result<(), Value> + 'static,
    {
        Self {
            id,
            due,
            callback: Box::new(f),
        }
    }

    pub(crate) fn from_job(id: TimerId, due: u64, callback: Job) -> Self {
        Self { id, due, callback }
    }

    /// The timer handle of this task.
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Virtual time (ms) at which the task is due.
    pub fn due(&self) -> u64 {
        self.due
    }

    /// Executes the task.
    pub fn run(self) -> Result<(), Value> {
        (self.callback)()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task {{ id: {:?}, due: {} }}", self.id, self.due)
    }
}

/// A microtask to be executed by the event loop.
///
/// Promise handler dispatch lands here when the engine runs in microtask
/// mode.
pub struct MicroTask {
    callback: Job,
}

impl MicroTask {
    /// Creates a new MicroTask from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<(), Value> + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    pub(crate) fn from_job(callback: Job) -> Self {
        Self { callback }
    }

    /// Executes the microtask.
    pub fn run(self) -> Result<(), Value> {
        (self.callback)()
    }
}

impl std::fmt::Debug for MicroTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MicroTask {{ ... }}")
    }
}

/// Pending timers.
///
/// Tasks come out earliest-due first; tasks due at the same time come out
/// in the order their ids were allocated.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: BTreeMap<(u64, TimerId), Task>,
    due_by_id: HashMap<TimerId, u64>,
}

impl TaskQueue {
    /// Creates a new empty TaskQueue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task.
    pub fn enqueue(&mut self, task: Task) {
        self.due_by_id.insert(task.id, task.due);
        self.tasks.insert((task.due, task.id), task);
    }

    /// Removes a pending task. Returns false when the id is unknown.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.due_by_id.remove(&id) {
            Some(due) => self.tasks.remove(&(due, id)).is_some(),
            None => false,
        }
    }

    /// Removes and returns the earliest task.
    pub fn dequeue(&mut self) -> Option<Task> {
        let (_, task) = self.tasks.pop_first()?;
        self.due_by_id.remove(&task.id);
        Some(task)
    }

    /// Due time of the earliest task.
    pub fn next_due(&self) -> Option<u64> {
        self.tasks.keys().next().map(|(due, _)| *due)
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns the number of tasks in the queue.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

/// A queue for microtasks.
///
/// Microtasks are drained completely after each task.
#[derive(Debug, Default)]
pub struct MicrotaskQueue {
    queue: VecDeque<MicroTask>,
}

impl MicrotaskQueue {
    /// Creates a new empty MicrotaskQueue.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Adds a microtask to the end of the queue.
    pub fn enqueue(&mut self, microtask: MicroTask) {
        self.queue.push_back(microtask);
    }

    /// Removes and returns the next microtask from the queue.
    pub fn dequeue(&mut self) -> Option<MicroTask> {
        self.queue.pop_front()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of microtasks in the queue.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
