//! Event loop implementation.
//!
//! [`EventLoop`] is a deterministic, single-threaded [`HostScheduler`] with a
//! virtual millisecond clock. It is what tests and embedders without their
//! own loop hand to the engine.

use crate::host::{HostScheduler, Job, TimerId};
use crate::task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue};
use core_types::Value;
use std::cell::RefCell;
use std::time::Duration;

/// A deterministic event loop.
///
/// Each turn of the loop:
/// 1. Drains the microtask queue
/// 2. Takes the earliest due timer, advances the clock to its due time and
///    runs it
/// 3. Repeats
///
/// Time only moves when a timer runs or [`EventLoop::advance_by`] is called.
///
/// # Examples
///
/// ```
/// use promise_engine::{EventLoop, HostScheduler};
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use std::time::Duration;
///
/// let event_loop = EventLoop::new();
/// let fired = Rc::new(Cell::new(false));
/// let flag = fired.clone();
/// event_loop.set_timeout(
///     Box::new(move || {
///         flag.set(true);
///         Ok(())
///     }),
///     Duration::from_millis(10),
/// );
///
/// event_loop.run_until_done().unwrap();
/// assert!(fired.get());
/// assert_eq!(event_loop.now(), Duration::from_millis(10));
/// ```
#[derive(Debug, Default)]
pub struct EventLoop {
    state: RefCell<LoopState>,
}

#[derive(Debug, Default)]
struct LoopState {
    now: u64,
    next_timer: u64,
    task_queue: TaskQueue,
    microtask_queue: MicrotaskQueue,
}

impl EventLoop {
    /// Creates a new EventLoop with empty queues at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        Duration::from_millis(self.state.borrow().now)
    }

    /// Runs until both queues are empty.
    ///
    /// Stops at the first job that returns an error and hands that error
    /// back; whatever is still queued stays queued and a later call resumes
    /// from there.
    pub fn run_until_done(&self) -> Result<(), Value> {
        loop {
            self.run_all_microtasks()?;
            if !self.run_next_task()? {
                return Ok(());
            }
        }
    }

    /// Runs all microtasks in the queue until empty, including microtasks
    /// queued while draining.
    pub fn run_all_microtasks(&self) -> Result<(), Value> {
        loop {
            // The borrow ends with this statement; the job may enqueue more.
            let next = self.state.borrow_mut().microtask_queue.dequeue();
            match next {
                Some(microtask) => microtask.run()?,
                None => return Ok(()),
            }
        }
    }

    /// Processes one complete cycle: one timer (if any) followed by all
    /// microtasks. Returns whether a timer ran.
    pub fn process_one_cycle(&self) -> Result<bool, Value> {
        let ran = self.run_next_task()?;
        self.run_all_microtasks()?;
        Ok(ran)
    }

    /// Moves the clock forward by `duration`, running every timer that falls
    /// due on the way (and the microtasks each one queues).
    pub fn advance_by(&self, duration: Duration) -> Result<(), Value> {
        let target = self.state.borrow().now + duration.as_millis() as u64;
        loop {
            self.run_all_microtasks()?;
            let due = self.state.borrow().task_queue.next_due();
            match due {
                Some(due) if due <= target => {
                    self.run_next_task()?;
                }
                _ => break,
            }
        }
        self.state.borrow_mut().now = target;
        Ok(())
    }

    /// Returns true if no timer is pending.
    pub fn is_task_queue_empty(&self) -> bool {
        self.state.borrow().task_queue.is_empty()
    }

    /// Returns true if no microtask is pending.
    pub fn is_microtask_queue_empty(&self) -> bool {
        self.state.borrow().microtask_queue.is_empty()
    }

    /// Number of pending timers.
    pub fn pending_timers(&self) -> usize {
        self.state.borrow().task_queue.len()
    }

    fn run_next_task(&self) -> Result<bool, Value> {
        let task = {
            let mut state = self.state.borrow_mut();
            let task = state.task_queue.dequeue();
            if let Some(task) = &task {
                state.now = state.now.max(task.due());
            }
            task
        };
        match task {
            Some(task) => task.run().map(|()| true),
            None => Ok(false),
        }
    }
}

impl HostScheduler for EventLoop {
    fn set_timeout(&self, callback: Job, delay: Duration) -> TimerId {
        let mut state = self.state.borrow_mut();
        let id = TimerId(state.next_timer);
        state.next_timer += 1;
        let due = state.now + delay.as_millis() as u64;
        state.task_queue.enqueue(Task::from_job(id, due, callback));
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        self.state.borrow_mut().task_queue.cancel(id);
    }

    fn next_tick(&self, job: Job) {
        self.state
            .borrow_mut()
            .microtask_queue
            .enqueue(MicroTask::from_job(job));
    }
}
