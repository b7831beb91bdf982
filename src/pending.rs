//! Album offers awaiting a user decision.
//!
//! When a multi-file batch completes with at least one success, the
//! uploaded ids are parked here under a one-shot token until the user
//! either builds the album or dismisses the offer. State is in-memory
//! only; a restart drops every open offer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info};

struct AlbumEntry {
    file_ids: Vec<String>,
    created_at: Instant,
}

/// Completed batches waiting on a create/cancel decision, keyed by an
/// unguessable token.
pub struct PendingAlbums {
    entries: Mutex<HashMap<String, AlbumEntry>>,
    ttl: Option<Duration>,
}

impl PendingAlbums {
    pub fn new(ttl: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        })
    }

    /// Store the ids of a completed batch and mint its decision token.
    pub async fn insert(&self, file_ids: Vec<String>) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let mut entries = self.entries.lock().await;
        entries.insert(
            token.clone(),
            AlbumEntry {
                file_ids,
                created_at: Instant::now(),
            },
        );
        debug!(token = %token, pending = entries.len(), "Stored album offer");
        token
    }

    /// Consume the entry. First caller wins; later calls get None.
    pub async fn take(&self, token: &str) -> Option<Vec<String>> {
        self.entries.lock().await.remove(token).map(|e| e.file_ids)
    }

    /// Drop the entry if still present. Discarding twice is a no-op, not an
    /// error.
    pub async fn discard(&self, token: &str) -> bool {
        self.entries.lock().await.remove(token).is_some()
    }

    /// Periodically evict offers older than the configured TTL. Returns
    /// None (and spawns nothing) when no TTL is configured.
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        let ttl = self.ttl?;
        let albums = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(ttl.max(Duration::from_secs(1)));
            tick.tick().await; // first tick is immediate
            loop {
                tick.tick().await;
                let evicted = albums.sweep(ttl).await;
                if evicted > 0 {
                    info!(evicted, "Evicted expired album offers");
                }
            }
        }))
    }

    async fn sweep(&self, ttl: Duration) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| e.created_at.elapsed() < ttl);
        before - entries.len()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
