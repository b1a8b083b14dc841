//! Bounded per-sink event queue.
//!
//! Producers (the connection task) push through a [`QueueSender`]; the sink's
//! delivery task is the only consumer. A close sentinel tells the consumer that
//! no more items will arrive. Items the consumer takes out and cannot deliver
//! yet are put back with [`QueueReceiver::requeue`], which never waits on the
//! channel, so the consumer can never block on its own full queue.

use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

enum Message<T> {
    Item(T),
    Close,
}

/// The delivery task has stopped and no longer accepts items.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("queue consumer is gone")]
pub struct QueueClosed;

pub fn bounded<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    (
        QueueSender { tx },
        QueueReceiver {
            rx,
            requeued: VecDeque::new(),
            closed: false,
        },
    )
}

pub struct QueueSender<T> {
    tx: mpsc::Sender<Message<T>>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        QueueSender {
            tx: self.tx.clone(),
        }
    }
}

impl<T> QueueSender<T> {
    /// Waits for capacity, then enqueues the item.
    pub async fn send(&self, item: T) -> Result<(), QueueClosed> {
        self.tx
            .send(Message::Item(item))
            .await
            .map_err(|_| QueueClosed)
    }

    /// Enqueues the close sentinel behind every item sent so far.
    pub async fn close(&self) -> Result<(), QueueClosed> {
        self.tx.send(Message::Close).await.map_err(|_| QueueClosed)
    }
}

pub struct QueueReceiver<T> {
    rx: mpsc::Receiver<Message<T>>,
    requeued: VecDeque<T>,
    closed: bool,
}

impl<T> QueueReceiver<T> {
    /// Waits for the next item.
    ///
    /// Requeued items come first. Returns `None` once the sentinel has been
    /// seen (or every sender is gone) and nothing is left to requeue.
    pub async fn pop(&mut self) -> Option<T> {
        if let Some(item) = self.requeued.pop_front() {
            return Some(item);
        }
        if self.closed {
            return None;
        }

        match self.rx.recv().await {
            Some(Message::Item(item)) => Some(item),
            Some(Message::Close) | None => {
                self.closed = true;
                None
            }
        }
    }

    /// Returns an item only if one is available right now.
    pub fn try_pop(&mut self) -> Option<T> {
        if let Some(item) = self.requeued.pop_front() {
            return Some(item);
        }
        if self.closed {
            return None;
        }

        match self.rx.try_recv() {
            Ok(Message::Item(item)) => Some(item),
            Ok(Message::Close) | Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
            Err(TryRecvError::Empty) => None,
        }
    }

    /// Puts an item back so that it is the next one returned.
    pub fn requeue(&mut self, item: T) {
        self.requeued.push_front(item);
    }

    /// Number of items waiting, requeued ones included.
    pub fn len(&self) -> usize {
        self.requeued.len() + self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
