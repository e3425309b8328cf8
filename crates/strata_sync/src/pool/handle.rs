//! # Task Handles
//!
//! Result delivery for tasks submitted with [`ThreadPool::spawn`](super::ThreadPool::spawn).

use std::any::Any;
use std::fmt;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::error::{PoolError, PoolResult};

/// What a finished task sends back: its value, or its panic message.
pub(crate) type Outcome<R> = Result<R, String>;

/// Handle to the result of a spawned task.
///
/// Dropping the handle does not cancel the task; the result is discarded.
pub struct TaskHandle<R> {
    receiver: Receiver<Outcome<R>>,
}

impl<R> TaskHandle<R> {
    pub(crate) fn new(receiver: Receiver<Outcome<R>>) -> Self {
        Self { receiver }
    }

    /// Blocks until the task finishes and returns its value.
    ///
    /// # Errors
    ///
    /// - [`PoolError::TaskPanicked`] if the task panicked
    /// - [`PoolError::Disconnected`] if the task was dropped without running
    pub fn join(self) -> PoolResult<R> {
        match self.receiver.recv() {
            Ok(outcome) => outcome.map_err(|message| PoolError::TaskPanicked { message }),
            Err(_) => Err(PoolError::Disconnected),
        }
    }

    /// Returns the result if the task has finished, `None` if it is still
    /// queued or running.
    ///
    /// The result is handed out once; later calls report
    /// [`PoolError::Disconnected`].
    pub fn try_join(&self) -> Option<PoolResult<R>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome.map_err(|message| PoolError::TaskPanicked { message })),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(PoolError::Disconnected)),
        }
    }

    /// Whether a result is waiting to be collected.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !self.receiver.is_empty()
    }
}

impl<R> fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
