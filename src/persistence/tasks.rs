//! Deferred update tasks
//!
//! Any thread may enqueue; the tick thread drains the whole queue right
//! before serializing. The lock only guards push and take, never the task
//! bodies or any store I/O.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use super::record::Registry;

pub type UpdateTask = Box<dyn FnOnce(&mut Registry) + Send + 'static>;

/// Cloneable handle onto the pending-task queue
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Arc<Mutex<VecDeque<UpdateTask>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&self, task: F)
    where
        F: FnOnce(&mut Registry) + Send + 'static,
    {
        self.tasks.lock().push_back(Box::new(task));
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.tasks.lock().clear();
    }

    /// Run every queued task once, in FIFO order. A panicking task is logged
    /// and the rest still run. Tasks queued while draining wait for the next
    /// pass. Returns how many tasks ran.
    pub(crate) fn drain_into(&self, registry: &mut Registry) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let count = tasks.len();

        for (index, task) in tasks.into_iter().enumerate() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task(registry))) {
                log::error!(
                    "Storage update task #{} panicked: {}",
                    index,
                    panic_message(payload.as_ref())
                );
            }
        }

        count
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue").field("pending", &self.len()).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic>"
    }
}
