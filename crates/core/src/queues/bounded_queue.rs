use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use tokio::sync::Notify;

/// What a full queue does with the next value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Overflow {
    /// Evict the oldest queued value to make room.
    DropOldest,
    /// Refuse the new value.
    RejectNewest,
}

/// Fixed-capacity FIFO shared between the bus (producer side) and one worker.
pub struct BoundedQueue<T> {
    inner: Arc<BoundedInner<T>>,
}

struct BoundedInner<T> {
    buf: Mutex<VecDeque<T>>,
    capacity: usize,
    overflow: Overflow,
    notify_any: Arc<Notify>,
}

pub struct BoundedReceiver<T> {
    inner: Arc<BoundedInner<T>>,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize, overflow: Overflow, notify_any: Arc<Notify>) -> Self {
        assert!(capacity > 0);

        Self {
            inner: Arc::new(BoundedInner {
                buf: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                overflow,
                notify_any,
            }),
        }
    }

    /// Enqueue a value. `Err` hands the value back when the queue refused it.
    ///
    /// With [`Overflow::DropOldest`] the push always succeeds.
    pub fn push(&self, value: T) -> Result<(), T> {
        let mut buf = self.inner.buf.lock().expect("BoundedQueue poisoned");
        if buf.len() >= self.inner.capacity {
            match self.inner.overflow {
                Overflow::DropOldest => {
                    let _ = buf.pop_front();
                }
                Overflow::RejectNewest => return Err(value),
            }
        }
        buf.push_back(value);
        drop(buf);
        self.inner.notify_any.notify_one();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.buf.lock().expect("BoundedQueue poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn receiver(&self) -> BoundedReceiver<T> {
        BoundedReceiver {
            inner: self.inner.clone(),
        }
    }
}

impl<T> BoundedReceiver<T> {
    pub fn try_recv(&self) -> Option<T> {
        self.inner
            .buf
            .lock()
            .expect("BoundedQueue poisoned")
            .pop_front()
    }
}
