//! Debounced per-chat batch accumulation.
//!
//! Every inbound attachment lands here first. A chat's batch stays open
//! while attachments keep arriving; each arrival slides the debounce window
//! forward, and only when it lapses is the accumulated list handed to the
//! sink in one piece.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Receives a chat's accumulated items once its debounce window lapses.
#[async_trait]
pub trait BatchSink<T>: Send + Sync {
    async fn drain(&self, chat_id: i64, items: Vec<T>);
}

struct OpenBatch<T> {
    /// Buffered items in arrival order.
    items: Vec<T>,
    /// The single outstanding debounce task. Replaced (old one aborted)
    /// whenever a new item arrives, so at most one timer is live per chat.
    timer: JoinHandle<()>,
}

pub struct BatchAggregator<T> {
    batches: Mutex<HashMap<i64, OpenBatch<T>>>,
    window: Duration,
    sink: Arc<dyn BatchSink<T>>,
}

impl<T: Send + 'static> BatchAggregator<T> {
    pub fn new(window: Duration, sink: Arc<dyn BatchSink<T>>) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(HashMap::new()),
            window,
            sink,
        })
    }

    /// Buffer one item and slide the chat's debounce window forward.
    ///
    /// The append and the timer swap happen under one lock, so a superseded
    /// timer can never drain a half-updated list: it is aborted here, and if
    /// it already woke it cancels at the table lock before taking anything.
    pub async fn push(self: Arc<Self>, chat_id: i64, item: T) {
        let mut batches = self.batches.lock().await;

        let aggregator = Arc::clone(&self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(aggregator.window).await;
            aggregator.fire(chat_id).await;
        });

        match batches.get_mut(&chat_id) {
            Some(open) => {
                open.items.push(item);
                open.timer.abort();
                open.timer = timer;
                debug!(chat_id, buffered = open.items.len(), "Batch window extended");
            }
            None => {
                batches.insert(
                    chat_id,
                    OpenBatch {
                        items: vec![item],
                        timer,
                    },
                );
                debug!(chat_id, "Batch window opened");
            }
        }
    }

    /// Timer body: take sole ownership of the batch and hand it off.
    /// No entry means a racing push superseded this timer after it woke;
    /// an empty list drains to nothing.
    async fn fire(self: Arc<Self>, chat_id: i64) {
        let taken = self.batches.lock().await.remove(&chat_id);
        let Some(open) = taken else {
            return;
        };
        if open.items.is_empty() {
            return;
        }
        debug!(chat_id, count = open.items.len(), "Batch window lapsed, draining");
        self.sink.drain(chat_id, open.items).await;
    }

    /// Number of chats with an open window.
    #[cfg(test)]
    pub async fn open_batches(&self) -> usize {
        self.batches.lock().await.len()
    }
}
