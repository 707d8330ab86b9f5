pub mod bounded_queue;
pub mod isolated_forwarder;

pub use bounded_queue::*;
pub use isolated_forwarder::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueKind {
    /// Never refuses; evicts the oldest queued event when full.
    FifoDropOldest { capacity: usize },
    /// Refuses new events when full, so the publisher can react.
    BoundedDropNewest { capacity: usize },
    /// Publisher-decoupled channel drained by a background task.
    Isolated { output_buffer: usize },
}
