use super::errors::QueueError;
use crossbeam::channel::{
    self,
    Receiver,
    RecvTimeoutError,
    Sender,
};
use std::{
    sync::Arc,
    time::Duration,
};


pub type SharedQueue<T> = Arc<dyn WorkQueue<T>>;

/// Блокирующая MPMC очередь задач.
///
/// Диспетчеры только кладут и забирают элементы и никогда не вызывают очередь
/// повторно изнутри её же методов.
pub trait WorkQueue<T: Send>: Send + Sync {
    /// Блокируется, пока ограниченная очередь заполнена
    fn push(&self, item: T) -> Result<(), QueueError>;

    /// Блокируется до появления элемента. `None` только если очередь закрыта
    fn pop(&self) -> Option<T>;

    fn pop_timeout(&self, timeout: Duration) -> Option<T>;

    /// Ждёт первый элемент не дольше `timeout`, затем забирает всё, что уже есть,
    /// но не больше `max`. Пустой результат по таймауту ошибкой не является.
    fn pop_batch(&self, max: usize, timeout: Duration) -> Vec<T>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}


/// Очередь поверх канала crossbeam. Держит оба конца канала, поэтому пока она
/// жива, канал не может оказаться закрытым.
pub struct ChannelQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> ChannelQueue<T> {
    pub fn new(capacity: Option<usize>) -> Self {
        let (sender, receiver) = match capacity {
            Some(cap) => channel::bounded(cap),
            None => channel::unbounded(),
        };
        Self { sender, receiver }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn bounded(capacity: usize) -> Self {
        Self::new(Some(capacity))
    }

    pub fn capacity(&self) -> Option<usize> {
        self.sender.capacity()
    }
}

impl<T> Default for ChannelQueue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T: Send> WorkQueue<T> for ChannelQueue<T> {
    #[inline]
    fn push(&self, item: T) -> Result<(), QueueError> {
        self.sender.send(item).map_err(|_| QueueError::Disconnected)
    }

    #[inline]
    fn pop(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    #[inline]
    fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        self.receiver.recv_timeout(timeout).ok()
    }

    fn pop_batch(&self, max: usize, timeout: Duration) -> Vec<T> {
        if max == 0 {
            return Vec::new();
        }

        let first = match self.receiver.recv_timeout(timeout) {
            Ok(item) => item,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return Vec::new(),
        };

        let mut batch = Vec::with_capacity(max.min(self.receiver.len() + 1));
        batch.push(first);
        batch.extend(self.receiver.try_iter().take(max - 1));
        batch
    }

    #[inline]
    fn len(&self) -> usize {
        self.receiver.len()
    }
}
