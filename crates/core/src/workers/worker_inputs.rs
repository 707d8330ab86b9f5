use std::sync::Arc;

use tokio::sync::{Notify, mpsc};

use crate::{events::EnrichedEvent, queues::BoundedReceiver};

pub enum FifoReceiver {
    Bounded(BoundedReceiver<Arc<EnrichedEvent>>),
    Isolated(mpsc::Receiver<Arc<EnrichedEvent>>),
}

pub struct FifoInput {
    pub event_type: &'static str,
    pub receiver: FifoReceiver,
}

/// All inboxes of one worker, woken by a shared notifier.
pub struct WorkerInputs {
    pub fifos: Vec<FifoInput>,
    pub notify_any: Arc<Notify>,
    pub fifo_index: usize,
}

pub struct InboxItem {
    pub event_type: &'static str,
    pub event: Arc<EnrichedEvent>,
}

impl WorkerInputs {
    /// Wait for the next event, polling inboxes round-robin.
    pub async fn next(&mut self) -> InboxItem {
        loop {
            if !self.fifos.is_empty() {
                let start = self.fifo_index;

                loop {
                    let i = self.fifo_index;
                    self.fifo_index = (self.fifo_index + 1) % self.fifos.len();
                    let fifo = &mut self.fifos[i];

                    let item = match fifo.receiver {
                        FifoReceiver::Bounded(ref r) => r.try_recv(),
                        FifoReceiver::Isolated(ref mut r) => r.try_recv().ok(),
                    };

                    if let Some(event) = item {
                        return InboxItem {
                            event_type: fifo.event_type,
                            event,
                        };
                    }

                    if self.fifo_index == start {
                        break;
                    }
                }
            }
            self.notify_any.notified().await;
        }
    }
}
