use std::sync::Arc;
use std::time::Duration;

use teloxide::types::Message;
use tracing::info;

use crate::batch::{BatchAggregator, BatchSink};
use crate::channels::TelegramChannel;
use crate::config::AppConfig;
use crate::host::PixeldrainClient;
use crate::pending::PendingAlbums;
use crate::traits::FileHost;

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!(
        api_id = config.telegram.api_id,
        "Telegram application credentials loaded"
    );

    // 1. Remote store client
    let host: Arc<dyn FileHost> = Arc::new(PixeldrainClient::new(&config.pixeldrain));
    info!(base_url = %config.pixeldrain.base_url, "Pixeldrain client ready");

    // 2. Pending album registry, with optional TTL eviction
    let ttl = config.batch.pending_ttl_secs.map(Duration::from_secs);
    let albums = PendingAlbums::new(ttl);
    if albums.spawn_sweeper().is_some() {
        info!(
            ttl_secs = config.batch.pending_ttl_secs.unwrap_or(0),
            "Album offer TTL sweeper started"
        );
    }

    // 3. Telegram channel
    let telegram = Arc::new(TelegramChannel::new(
        &config.telegram.bot_token,
        Arc::clone(&host),
        Arc::clone(&albums),
        config.batch.max_file_size_mb,
    ));

    // 4. Batch aggregator draining into the channel
    let sink: Arc<dyn BatchSink<Message>> = telegram.clone();
    let aggregator = BatchAggregator::new(Duration::from_millis(config.batch.debounce_ms), sink);
    telegram.set_aggregator(Arc::downgrade(&aggregator));
    info!(debounce_ms = config.batch.debounce_ms, "Batch aggregator ready");

    // 5. Dispatcher loop; restarts with backoff if it ever stops
    telegram.start_with_retry().await;

    Ok(())
}
