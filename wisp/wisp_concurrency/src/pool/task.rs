//! Type-erased units of work and their result handles.
//!
//! Every submission is packaged as a [`PackagedTask`]: the caller's closure
//! plus the sending half of a one-shot channel. The pool stores these behind
//! the object-safe [`Task`] trait so closures of unrelated types share one
//! queue. The receiving half becomes the caller's [`TaskHandle`].

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, error};
use wisp_core::{panic_message, TaskError};

/// How a task's execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskOutcome {
    /// The closure returned normally
    Completed,

    /// The closure panicked; the panic was captured
    Panicked,
}

/// A unit of work the pool can run without knowing its concrete type.
pub(crate) trait Task: Send {
    /// Run the task to completion, delivering its result to whoever holds
    /// the handle.
    fn execute(self: Box<Self>) -> TaskOutcome;
}

/// A closure bound to the promise its result is delivered through.
pub(crate) struct PackagedTask<F, T> {
    func: F,
    promise: Sender<thread::Result<T>>,
}

impl<F, T> PackagedTask<F, T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    /// Package `func` and return it together with the handle for its result.
    pub(crate) fn new(func: F) -> (Self, TaskHandle<T>) {
        let (promise, receiver) = bounded(1);
        (Self { func, promise }, TaskHandle { receiver })
    }
}

impl<F, T> Task for PackagedTask<F, T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    fn execute(self: Box<Self>) -> TaskOutcome {
        let Self { func, promise } = *self;

        let result = panic::catch_unwind(AssertUnwindSafe(func));
        let outcome = match &result {
            Ok(_) => TaskOutcome::Completed,
            Err(_) => TaskOutcome::Panicked,
        };

        // The channel has room for exactly this one message, so `send` only
        // fails when the handle was dropped.
        if let Err(unsent) = promise.send(result) {
            match unsent.into_inner() {
                Err(payload) => error!(
                    "Task panicked with no handle waiting: {}",
                    panic_message(payload.as_ref())
                ),
                Ok(_) => debug!("Task finished after its handle was dropped"),
            }
        }

        outcome
    }
}

/// Handle to the eventual result of a pooled task.
///
/// Dropping the handle does not cancel the task; the result is discarded.
/// A result can be taken only once: after one of the retrieval methods has
/// returned it, further calls report [`TaskError::Abandoned`].
pub struct TaskHandle<T> {
    receiver: Receiver<thread::Result<T>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes and return its value.
    ///
    /// A panic inside the task is reported as [`TaskError::Panicked`].
    pub fn wait(self) -> Result<T, TaskError> {
        match self.receiver.recv() {
            Ok(result) => Self::unpack(result),
            Err(_) => Err(TaskError::Abandoned),
        }
    }

    /// Block for at most `timeout` waiting for the task.
    ///
    /// On [`TaskError::Timeout`] the handle remains usable.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, TaskError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Self::unpack(result),
            Err(RecvTimeoutError::Timeout) => Err(TaskError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(TaskError::Abandoned),
        }
    }

    /// Return the result if the task has already finished, without blocking.
    pub fn try_get(&self) -> Option<Result<T, TaskError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(Self::unpack(result)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(TaskError::Abandoned)),
        }
    }

    /// Block until the task finishes, keeping the raw panic payload.
    ///
    /// Mirrors [`std::thread::JoinHandle::join`]: pass the error to
    /// [`std::panic::resume_unwind`] to re-raise the task's own panic on the
    /// calling thread.
    pub fn join(self) -> thread::Result<T> {
        match self.receiver.recv() {
            Ok(result) => result,
            Err(_) => Err(Box::new(TaskError::Abandoned)),
        }
    }

    /// Whether a result is ready to be taken.
    pub fn is_finished(&self) -> bool {
        !self.receiver.is_empty()
    }

    fn unpack(result: thread::Result<T>) -> Result<T, TaskError> {
        result.map_err(|payload: Box<dyn Any + Send>| {
            TaskError::Panicked(panic_message(payload.as_ref()))
        })
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}
