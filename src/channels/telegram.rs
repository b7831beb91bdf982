use std::sync::{Arc, RwLock as StdRwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardMarkup, LinkPreviewOptions, MaybeInaccessibleMessage, Message, MessageId,
    ParseMode,
};
use tracing::{debug, info, warn};

use super::formatting::{
    album_keyboard, batch_report, build_help_text, sanitize_filename, single_report,
    strip_choices_paragraph, successful_ids, ALBUM_PROMPT, CANCEL_NOTICE,
};
use crate::batch::{BatchAggregator, BatchSink};
use crate::pending::PendingAlbums;
use crate::traits::FileHost;
use crate::types::{UploadError, UploadFailure, UploadOutcome};
use crate::upload::{upload_staged, StagedFile};

pub struct TelegramChannel {
    bot: Bot,
    bot_token: String,
    host: Arc<dyn FileHost>,
    albums: Arc<PendingAlbums>,
    /// Max inbound attachment size in MB, checked before downloading.
    max_file_size_mb: u64,
    /// Back-reference to the aggregator that feeds this channel.
    /// Set after construction via set_aggregator(); the strong handle lives
    /// in core::run.
    aggregator: StdRwLock<Option<Weak<BatchAggregator<Message>>>>,
}

impl TelegramChannel {
    pub fn new(
        bot_token: &str,
        host: Arc<dyn FileHost>,
        albums: Arc<PendingAlbums>,
        max_file_size_mb: u64,
    ) -> Self {
        Self {
            bot: Bot::new(bot_token),
            bot_token: bot_token.to_string(),
            host,
            albums,
            max_file_size_mb,
            aggregator: StdRwLock::new(None),
        }
    }

    pub fn set_aggregator(&self, aggregator: Weak<BatchAggregator<Message>>) {
        if let Ok(mut guard) = self.aggregator.write() {
            *guard = Some(aggregator);
        }
    }

    fn aggregator(&self) -> Option<Arc<BatchAggregator<Message>>> {
        self.aggregator
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Start the Telegram dispatcher with automatic retry on crash.
    /// Uses exponential backoff: 5s -> 10s -> 20s -> 40s -> 60s cap.
    /// Resets backoff to initial after a stable run (60s+).
    pub async fn start_with_retry(self: Arc<Self>) {
        let initial_backoff = Duration::from_secs(5);
        let max_backoff = Duration::from_secs(60);
        let stable_threshold = Duration::from_secs(60);
        let mut backoff = initial_backoff;

        loop {
            info!("Starting Telegram dispatcher");
            let started = tokio::time::Instant::now();
            self.clone().start().await;
            let ran_for = started.elapsed();

            if ran_for >= stable_threshold {
                backoff = initial_backoff;
            }

            warn!(
                backoff_secs = backoff.as_secs(),
                ran_for_secs = ran_for.as_secs(),
                "Telegram dispatcher stopped, restarting"
            );
            tokio::time::sleep(backoff).await;
            backoff = std::cmp::min(backoff * 2, max_backoff);
        }
    }

    pub async fn start(self: Arc<Self>) {
        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint({
                let channel = Arc::clone(&self);
                move |msg: Message, bot: Bot| {
                    let channel = Arc::clone(&channel);
                    async move {
                        channel.handle_message(msg, bot).await;
                        respond(())
                    }
                }
            }))
            .branch(Update::filter_callback_query().endpoint({
                let channel = Arc::clone(&self);
                move |q: CallbackQuery, bot: Bot| {
                    let channel = Arc::clone(&channel);
                    async move {
                        channel.handle_callback(q, bot).await;
                        respond(())
                    }
                }
            }));

        Dispatcher::builder(self.bot.clone(), handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    async fn handle_message(&self, msg: Message, bot: Bot) {
        if let Some(text) = msg.text() {
            if text.starts_with('/') {
                self.handle_command(text, &msg, &bot).await;
            }
            return;
        }

        if !has_attachment(&msg) {
            return;
        }

        let Some(aggregator) = self.aggregator() else {
            warn!("Attachment received before the aggregator was wired");
            return;
        };
        debug!(
            chat_id = msg.chat.id.0,
            message_id = msg.id.0,
            "Buffering attachment"
        );
        aggregator.push(msg.chat.id.0, msg).await;
    }

    async fn handle_command(&self, text: &str, msg: &Message, bot: &Bot) {
        let cmd = text.split_whitespace().next().unwrap_or(text);
        let reply = match cmd {
            "/start" | "/help" => build_help_text(),
            _ => format!(
                "Unknown command: {}\nType /help for available commands.",
                cmd
            ),
        };
        if let Err(e) = bot.send_message(msg.chat.id, reply).await {
            warn!(chat_id = msg.chat.id.0, "Failed to send command reply: {}", e);
        }
    }

    /// Handle callback query from the album inline keyboard.
    async fn handle_callback(&self, q: CallbackQuery, bot: Bot) {
        let data = match q.data {
            Some(ref d) => d.clone(),
            None => return,
        };

        // Callback data: "album:{create|cancel}:{token}"
        let parts: Vec<&str> = data.splitn(3, ':').collect();
        if parts.len() != 3 || parts[0] != "album" {
            return;
        }
        let action = parts[1];
        let token = parts[2].to_string();

        match action {
            "create" => self.handle_create(&bot, q, &token).await,
            "cancel" => self.handle_cancel(&bot, q, &token).await,
            _ => {}
        }
    }

    async fn handle_create(&self, bot: &Bot, q: CallbackQuery, token: &str) {
        let message = match q.message {
            Some(MaybeInaccessibleMessage::Regular(m)) => m,
            _ => {
                // No message to render the result into; leave the offer pending.
                warn!(token, "Album create callback without an accessible message");
                let _ = bot.answer_callback_query(q.id).await;
                return;
            }
        };

        let Some(file_ids) = self.albums.take(token).await else {
            warn!(token, "Album callback for an unknown or consumed token");
            let _ = bot
                .answer_callback_query(q.id)
                .text("This batch has expired or was already handled.")
                .show_alert(true)
                .await;
            return;
        };

        info!(token, files = file_ids.len(), "Building album");
        let _ = bot
            .edit_message_text(message.chat.id, message.id, "Creating the album link…")
            .await;

        match self.host.create_list(&file_ids).await {
            Ok(list_id) => {
                let text = format!(
                    "✅ <b>Album created!</b>\n\n🔗 Your album link: {}",
                    self.host.list_link(&list_id)
                );
                self.edit_report(bot, message.chat.id, message.id, text, None)
                    .await;
                let _ = bot.answer_callback_query(q.id).text("Album created.").await;
            }
            Err(e) => {
                warn!(token, error = %e, "Album creation failed");
                let text = format!("❌ <b>Album creation failed:</b> {}", e);
                self.edit_report(bot, message.chat.id, message.id, text, None)
                    .await;
                let _ = bot
                    .answer_callback_query(q.id)
                    .text("Album creation failed.")
                    .await;
            }
        }
    }

    async fn handle_cancel(&self, bot: &Bot, q: CallbackQuery, token: &str) {
        // Idempotent: a second cancel, or a cancel after create, is a no-op.
        let removed = self.albums.discard(token).await;
        debug!(token, removed, "Album offer discarded");

        if let Some(MaybeInaccessibleMessage::Regular(message)) = q.message {
            // message.text() is plain text with entities resolved, so the
            // rebuilt notice is edited in without a parse mode.
            let original = message.text().unwrap_or("");
            let cleaned = strip_choices_paragraph(original);
            let _ = bot
                .edit_message_text(
                    message.chat.id,
                    message.id,
                    format!("{}\n\n{}", cleaned, CANCEL_NOTICE),
                )
                .await;
        }
        let _ = bot.answer_callback_query(q.id).text("Cancelled.").await;
    }

    /// Resolve the attachment in a message and materialize it to a temp file.
    async fn stage_attachment(&self, msg: &Message) -> anyhow::Result<StagedFile> {
        let (file_id, file_size, filename) = if let Some(doc) = msg.document() {
            (
                doc.file.id.clone(),
                doc.file.size as u64,
                doc.file_name
                    .clone()
                    .unwrap_or_else(|| "document".to_string()),
            )
        } else if let Some(photos) = msg.photo() {
            // Last photo in the array is the largest
            let photo = photos
                .last()
                .ok_or_else(|| anyhow::anyhow!("Empty photo array"))?;
            (
                photo.file.id.clone(),
                photo.file.size as u64,
                "photo.jpg".to_string(),
            )
        } else if let Some(audio) = msg.audio() {
            (
                audio.file.id.clone(),
                audio.file.size as u64,
                audio
                    .file_name
                    .clone()
                    .unwrap_or_else(|| "audio.mp3".to_string()),
            )
        } else if let Some(video) = msg.video() {
            (
                video.file.id.clone(),
                video.file.size as u64,
                video
                    .file_name
                    .clone()
                    .unwrap_or_else(|| "video.mp4".to_string()),
            )
        } else if let Some(voice) = msg.voice() {
            (
                voice.file.id.clone(),
                voice.file.size as u64,
                "voice.ogg".to_string(),
            )
        } else {
            anyhow::bail!("Unsupported attachment type");
        };

        // Check file size before downloading
        let max_bytes = self.max_file_size_mb * 1_048_576;
        if file_size > max_bytes {
            anyhow::bail!(
                "File too large ({:.1} MB). Maximum is {} MB.",
                file_size as f64 / 1_048_576.0,
                self.max_file_size_mb
            );
        }

        let file = self.bot.get_file(file_id).await?;
        let download_url = format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot_token, file.path
        );
        let response = reqwest::get(&download_url).await?;
        if !response.status().is_success() {
            anyhow::bail!(
                "Failed to download file from Telegram: HTTP {}",
                response.status()
            );
        }
        let bytes = response.bytes().await?;

        let staged = StagedFile::write(sanitize_filename(&filename), &bytes)?;
        debug!(file = %staged.file_name, size = bytes.len(), "Staged attachment");
        Ok(staged)
    }

    /// Stage + upload one attachment, converting every failure into a
    /// per-item outcome so siblings in the batch keep going.
    async fn process_attachment(&self, msg: &Message) -> UploadOutcome {
        let staged = match self.stage_attachment(msg).await {
            Ok(staged) => staged,
            Err(e) => {
                warn!(message_id = msg.id.0, "Failed to stage attachment: {:#}", e);
                return Err(UploadFailure {
                    message_id: msg.id,
                    file_name: None,
                    error: UploadError::Fetch(e),
                });
            }
        };
        upload_staged(self.host.as_ref(), msg.id, staged).await
    }

    async fn drain_single(&self, chat_id: ChatId, msg: &Message) {
        let notice = match self
            .bot
            .send_message(chat_id, "Received 1 file, uploading…")
            .await
        {
            Ok(m) => m,
            Err(e) => {
                // Without the notice there is nowhere to render the result.
                warn!(chat_id = chat_id.0, "Failed to send processing notice: {}", e);
                return;
            }
        };

        let outcome = self.process_attachment(msg).await;
        let text = single_report(&outcome, self.host.as_ref());
        self.edit_report(&self.bot, chat_id, notice.id, text, None)
            .await;
    }

    async fn drain_many(&self, chat_id: ChatId, messages: &[Message]) {
        let count = messages.len();
        let notice = match self
            .bot
            .send_message(
                chat_id,
                format!("Received {} files, uploading them concurrently…", count),
            )
            .await
        {
            Ok(m) => m,
            Err(e) => {
                warn!(chat_id = chat_id.0, "Failed to send processing notice: {}", e);
                return;
            }
        };

        // Fan out: all uploads run concurrently and a failure never cancels
        // its siblings; join_all keeps submission order in the results.
        let outcomes =
            futures::future::join_all(messages.iter().map(|m| self.process_attachment(m))).await;

        let succeeded = successful_ids(&outcomes);
        let mut text = batch_report(&outcomes, self.host.as_ref());

        if succeeded.is_empty() {
            self.edit_report(&self.bot, chat_id, notice.id, text, None)
                .await;
            return;
        }

        let token = self.albums.insert(succeeded).await;
        text.push_str("\n\n");
        text.push_str(ALBUM_PROMPT);
        info!(chat_id = chat_id.0, count, token = %token, "Offering album for batch");
        self.edit_report(&self.bot, chat_id, notice.id, text, Some(album_keyboard(&token)))
            .await;
    }

    async fn edit_report(
        &self,
        bot: &Bot,
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) {
        let mut request = bot
            .edit_message_text(chat_id, message_id, text)
            .parse_mode(ParseMode::Html)
            .link_preview_options(disabled_link_preview());
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard);
        }
        if let Err(e) = request.await {
            warn!(chat_id = chat_id.0, "Failed to edit report message: {}", e);
        }
    }
}

#[async_trait]
impl BatchSink<Message> for TelegramChannel {
    async fn drain(&self, chat_id: i64, messages: Vec<Message>) {
        if messages.len() == 1 {
            self.drain_single(ChatId(chat_id), &messages[0]).await;
        } else {
            self.drain_many(ChatId(chat_id), &messages).await;
        }
    }
}

fn has_attachment(msg: &Message) -> bool {
    msg.document().is_some()
        || msg.photo().is_some()
        || msg.audio().is_some()
        || msg.video().is_some()
        || msg.voice().is_some()
}

fn disabled_link_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}
