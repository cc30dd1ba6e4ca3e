// Work Queue - unbounded FIFO with a one-way "no more items" signal

use super::error::{DomainError, Result};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Outcome of a blocking dequeue
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued<T> {
    Item(T),
    /// Closed for writing and empty: nothing will ever arrive again
    EndOfStream,
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Thread-safe FIFO shared by producers and workers
///
/// Producers append with [`WorkQueue::enqueue`] until [`WorkQueue::close`] is
/// called. Items already queued at close time stay consumable; once they are
/// drained every consumer sees [`Dequeued::EndOfStream`].
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Notify,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Notify::new(),
        }
    }

    /// Append an item to the tail
    ///
    /// # Errors
    /// - DomainError::QueueClosed if the queue was closed for writing
    pub fn enqueue(&self, item: T) -> Result<()> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(DomainError::QueueClosed);
            }
            state.items.push_back(item);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Wait for the next item, or end-of-stream once closed and drained
    ///
    /// Cancel-safe: an item is only removed in the same poll that returns it,
    /// so dropping this future (timeout, select) never loses an item.
    pub async fn dequeue(&self) -> Dequeued<T> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register interest before looking, so a concurrent enqueue/close
            // between the check and the await still wakes us.
            notified.as_mut().enable();

            if let Some(next) = self.try_dequeue() {
                return next;
            }
            notified.await;
        }
    }

    /// Non-blocking dequeue; `None` means "open but currently empty"
    pub fn try_dequeue(&self) -> Option<Dequeued<T>> {
        let mut state = self.lock();
        match state.items.pop_front() {
            Some(item) => Some(Dequeued::Item(item)),
            None if state.closed => Some(Dequeued::EndOfStream),
            None => None,
        }
    }

    /// Mark closed for writing. Returns true only for the first call.
    pub fn close(&self) -> bool {
        let first = {
            let mut state = self.lock();
            let first = !state.closed;
            state.closed = true;
            first
        };
        self.available.notify_waiters();
        first
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Current backlog (best-effort, for sizing only)
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = WorkQueue::new();
        for i in 0..3 {
            queue.enqueue(i).unwrap();
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_dequeue(), Some(Dequeued::Item(0)));
        assert_eq!(queue.try_dequeue(), Some(Dequeued::Item(1)));
        assert_eq!(queue.try_dequeue(), Some(Dequeued::Item(2)));
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    fn test_enqueue_after_close_rejected() {
        let queue = WorkQueue::new();
        queue.enqueue("a").unwrap();

        assert!(queue.close());
        assert!(!queue.close(), "second close is a no-op");
        assert_eq!(queue.enqueue("b"), Err(DomainError::QueueClosed));

        // Items queued before close stay consumable
        assert_eq!(queue.try_dequeue(), Some(Dequeued::Item("a")));
        assert_eq!(queue.try_dequeue(), Some(Dequeued::EndOfStream));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_enqueue() {
        let queue = Arc::new(WorkQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished(), "consumer should block on empty queue");

        queue.enqueue(42).unwrap();
        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer should wake")
            .unwrap();
        assert_eq!(got, Dequeued::Item(42));
    }

    #[tokio::test]
    async fn test_close_wakes_all_blocked_consumers() {
        let queue: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::new());

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.dequeue().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        for consumer in consumers {
            let got = tokio::time::timeout(Duration::from_secs(1), consumer)
                .await
                .expect("close should wake consumer")
                .unwrap();
            assert_eq!(got, Dequeued::EndOfStream);
        }
    }

    #[tokio::test]
    async fn test_dropped_dequeue_does_not_lose_item() {
        let queue = WorkQueue::new();

        let timed_out = tokio::time::timeout(Duration::from_millis(10), queue.dequeue()).await;
        assert!(timed_out.is_err());

        queue.enqueue(7).unwrap();
        assert_eq!(queue.dequeue().await, Dequeued::Item(7));
    }
}
