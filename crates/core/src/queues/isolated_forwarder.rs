use std::{pin::Pin, sync::Arc};

use tokio::sync::{Notify, mpsc};

pub type StartupTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Drain tasks that must be spawned before anything is published.
pub struct StartupTasks {
    pub tokio: Vec<StartupTask>,
}

/// Inbox that never blocks the publisher: values go through a small staging
/// channel and a drain task moves them into the worker-facing channel.
pub struct IsolatedForwarder<T> {
    inbox_tx: mpsc::Sender<T>,
}

impl<T: Send + 'static> IsolatedForwarder<T> {
    pub fn new(
        output_buffer: usize,
        notify_any: Arc<Notify>,
    ) -> (IsolatedForwarder<T>, mpsc::Receiver<T>, StartupTask) {
        let (inbox_tx, mut inbox_rx) = mpsc::channel::<T>(output_buffer);
        let (out_tx, out_rx) = mpsc::channel::<T>(output_buffer);

        let drain_task = Box::pin(async move {
            while let Some(value) = inbox_rx.recv().await {
                if out_tx.send(value).await.is_err() {
                    break;
                }
                notify_any.notify_one();
            }
        });

        (IsolatedForwarder { inbox_tx }, out_rx, drain_task)
    }

    pub fn try_send(&self, value: T) -> Result<(), T> {
        self.inbox_tx.try_send(value).map_err(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_values_reach_the_output_in_order() {
        let notify = Arc::new(Notify::new());
        let (fwd, mut out, drain) = IsolatedForwarder::new(4, Arc::clone(&notify));
        tokio::spawn(drain);

        for v in 0..3u8 {
            fwd.try_send(v).unwrap();
        }
        for v in 0..3u8 {
            assert_eq!(out.recv().await, Some(v));
        }
    }
}
