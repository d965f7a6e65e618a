//! Bounded task queue with outstanding-work tracking.
//!
//! The channel itself is a bounded crossbeam channel; the tracker layered on
//! top counts every element still unacknowledged (queued or in flight) so
//! that `join` can wait for quiescence without polling. Sentinels are
//! counted and acknowledged exactly like tasks, otherwise a `join` issued
//! during shutdown would never complete.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};

use super::task::{QueueItem, Task};

pub(crate) struct TaskQueue {
    tx: Sender<QueueItem>,
    rx: Receiver<QueueItem>,
    /// Elements enqueued but not yet acknowledged via `task_done`.
    outstanding: Mutex<usize>,
    drained: Condvar,
}

impl TaskQueue {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            outstanding: Mutex::new(0),
            drained: Condvar::new(),
        }
    }

    /// Non-blocking push. Returns the task back on a full queue so the
    /// admission loop can retry or fall back without re-allocating.
    pub(crate) fn try_push(&self, task: Task) -> Result<(), Task> {
        let mut outstanding = self.outstanding.lock();
        match self.tx.try_send(QueueItem::Task(task)) {
            Ok(()) => {
                *outstanding += 1;
                Ok(())
            }
            Err(TrySendError::Full(item) | TrySendError::Disconnected(item)) => {
                match item {
                    QueueItem::Task(task) => Err(task),
                    QueueItem::Stop => unreachable!("sentinels go through push_sentinel"),
                }
            }
        }
    }

    /// Blocking push with a timeout, used by the blocking admission retry.
    ///
    /// The count is taken optimistically before the send and rolled back on
    /// timeout. Holding the count lock across a blocking send would wedge
    /// the workers, which need it in `task_done` before they can dequeue
    /// again and free a slot.
    pub(crate) fn push_timeout(&self, task: Task, timeout: Duration) -> Result<(), Task> {
        *self.outstanding.lock() += 1;
        match self.tx.send_timeout(QueueItem::Task(task), timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(item) | SendTimeoutError::Disconnected(item)) => {
                self.decrement();
                match item {
                    QueueItem::Task(task) => Err(task),
                    QueueItem::Stop => unreachable!("sentinels go through push_sentinel"),
                }
            }
        }
    }

    /// Blocking push of one stop sentinel. Counted so `join` sees it.
    pub(crate) fn push_sentinel(&self) {
        *self.outstanding.lock() += 1;
        if self.tx.send(QueueItem::Stop).is_err() {
            self.decrement();
        }
    }

    pub(crate) fn pop(&self, timeout: Duration) -> Result<QueueItem, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Acknowledge one dequeued element (task or sentinel).
    pub(crate) fn task_done(&self) {
        self.decrement();
    }

    fn decrement(&self) {
        let mut outstanding = self.outstanding.lock();
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.drained.notify_all();
        }
    }

    /// Block until every enqueued element has been acknowledged.
    pub(crate) fn join(&self) {
        let mut outstanding = self.outstanding.lock();
        while *outstanding > 0 {
            self.drained.wait(&mut outstanding);
        }
    }

    /// Elements currently sitting in the channel (not yet dequeued).
    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }
}
