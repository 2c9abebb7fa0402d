use crossbeam_channel::{Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Single-writer, multi-reader channel that replays the latest value to every
/// new subscriber.
pub struct Broadcast<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    latest: T,
    subscribers: Vec<Sender<T>>,
}

impl<T: Clone + Send> Broadcast<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Mutex::new(Inner {
                latest: initial,
                subscribers: Vec::new(),
            }),
        }
    }

    /// The receiver immediately yields the current value, then every later one.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut inner = self.lock();
        // a fresh unbounded channel cannot be full or disconnected here
        let _ = tx.send(inner.latest.clone());
        inner.subscribers.push(tx);
        rx
    }

    pub fn latest(&self) -> T {
        self.lock().latest.clone()
    }

    pub fn publish(&self, value: T) {
        let mut inner = self.lock();
        inner.latest = value;
        Self::fan_out(&mut inner);
    }

    /// Publishes only when the value actually changes.
    pub fn publish_if_changed(&self, value: T)
    where
        T: PartialEq,
    {
        let mut inner = self.lock();
        if inner.latest == value {
            return;
        }
        inner.latest = value;
        Self::fan_out(&mut inner);
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn fan_out(inner: &mut Inner<T>) {
        let value = inner.latest.clone();
        inner.subscribers.retain(|tx| tx.send(value.clone()).is_ok());
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
