//! Transport events emitted while the negotiation progresses

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Event describing observable progress of the transport the layer is
/// registered with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// A state changed or a frame was staged for writing
    Progress,
    /// A fatal condition was recorded on the transport
    Error,
}

/// Shared event queue.
///
/// The collector is shared between the layer and the enclosing transport;
/// cloning yields another handle to the same queue. Duplicate events are
/// harmless, the consumer is expected to coalesce them into a single wakeup.
#[derive(Debug, Clone, Default)]
pub struct Collector {
    inner: Rc<RefCell<VecDeque<TransportEvent>>>,
}

impl Collector {
    /// Creates an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event to the queue
    pub fn put(&self, event: TransportEvent) {
        self.inner.borrow_mut().push_back(event);
    }

    /// Removes and returns the oldest event
    pub fn pop(&self) -> Option<TransportEvent> {
        self.inner.borrow_mut().pop_front()
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Removes and returns all queued events
    pub fn drain(&self) -> Vec<TransportEvent> {
        self.inner.borrow_mut().drain(..).collect()
    }
}
