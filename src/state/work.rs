//! Work items and the FIFO queue that sequences them.
//!
//! At most one item is active. Only the active item receives
//! operation-scoped messages, and the next item is started (its frames
//! written) only after the active one has been completed by ReadyForQuery.

use std::collections::VecDeque;

use crate::error::{Error, ErrorFields, Result};
use crate::protocol::backend::BackendMessage;
use crate::protocol::types::TransactionStatus;

/// Continuation invoked exactly once with the outcome of an operation.
pub type Completion<T> = Box<dyn FnOnce(Result<T>) + Send>;

/// Whether the active item accepted a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    Consumed,
    /// The item has no handler for this message kind.
    Unexpected,
    /// An ErrorResponse arrived after the item had already resolved its caller,
    /// e.g. an implicit COMMIT failing at Sync.
    LateError(ErrorFields),
}

/// One client operation: the frames it sends and the messages it expects back.
pub trait WorkItem: Send {
    /// Encode this item's frontend frames into `out`.
    ///
    /// Called once, when the item becomes active.
    fn start(&mut self, out: &mut Vec<u8>);

    /// Handle an operation-scoped message while active.
    fn handle(&mut self, msg: BackendMessage) -> Handled;

    /// ReadyForQuery ended this item.
    fn finish(self: Box<Self>, status: TransactionStatus);

    /// The connection failed before this item could finish.
    fn fail(self: Box<Self>, error: Error);
}

/// FIFO of pending work items plus the single active slot.
#[derive(Default)]
pub struct WorkQueue {
    pending: VecDeque<Box<dyn WorkItem>>,
    active: Option<Box<dyn WorkItem>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an item; start it immediately if nothing is active.
    pub fn push(&mut self, item: Box<dyn WorkItem>, out: &mut Vec<u8>) {
        self.pending.push_back(item);
        if self.active.is_none() {
            self.start_next(out);
        }
    }

    fn start_next(&mut self, out: &mut Vec<u8>) {
        if let Some(mut item) = self.pending.pop_front() {
            item.start(out);
            self.active = Some(item);
        }
    }

    /// Route a message to the active item.
    pub fn dispatch(&mut self, msg: BackendMessage) -> Handled {
        match self.active.as_mut() {
            Some(item) => item.handle(msg),
            None => Handled::Unexpected,
        }
    }

    /// Finish the active item and start the next one.
    ///
    /// Returns false if no item was active.
    pub fn complete(&mut self, status: TransactionStatus, out: &mut Vec<u8>) -> bool {
        let Some(item) = self.active.take() else {
            return false;
        };
        item.finish(status);
        self.start_next(out);
        true
    }

    /// Fail the active item with `error` and every queued item with
    /// [`Error::ConnectionBroken`]. Queued items are never started.
    pub fn fail_all(&mut self, error: Error) {
        if let Some(item) = self.active.take() {
            item.fail(error);
        }
        for item in self.pending.drain(..) {
            item.fail(Error::ConnectionBroken);
        }
    }

    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    /// Number of queued items that have not started.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.pending.is_empty()
    }
}
