//! Dispatcher: turns one inbound photo event into one captioned reply.
//!
//! Steps per event:
//! 1. Access policy (blacklist, then whitelist)
//! 2. Photo presence
//! 3. Group gate (group chats only)
//! 4. Fetch the largest resolution, pick a phrase, render + encode inside
//!    `tokio::task::spawn_blocking`, send back as `output.jpeg`
//!
//! Steps 1–3 drop the event silently. Failures in step 4 surface as `BotError`
//! and the worker pool decides what happens next.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::caption::{render_caption, GlyphSource};
use crate::errors::BotError;
use crate::state::BotState;
use crate::telegram::TransportError;

pub mod pool;

pub use pool::{start_pool, PoolDone};

pub const OUTPUT_FILE_NAME: &str = "output.jpeg";
pub const JPEG_QUALITY: u8 = 85;

// ────────────────────────────────────────────────────────────────────────────
// Transport seam
// ────────────────────────────────────────────────────────────────────────────

/// Fetches source photos and delivers captioned ones.
///
/// Carried in `BotState` as `Arc<dyn PhotoTransport>`.
#[async_trait]
pub trait PhotoTransport: Send + Sync {
    async fn fetch_photo(&self, file_id: &str) -> Result<Bytes, TransportError>;

    async fn send_photo(
        &self,
        chat_id: i64,
        image: Bytes,
        file_name: &str,
    ) -> Result<(), TransportError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Events and outcomes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRef {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

/// A chat message as the dispatcher sees it.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub message_id: i64,
    pub chat_id: i64,
    pub is_group: bool,
    /// The same photo at every resolution the platform offers; empty for non-photo messages.
    pub photos: Vec<PhotoRef>,
    pub caption: Option<String>,
}

impl InboundEvent {
    /// Widest available resolution; the first one wins ties.
    pub fn largest_photo(&self) -> Option<&PhotoRef> {
        self.photos
            .iter()
            .reduce(|best, p| if p.width > best.width { p } else { best })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAllowed,
    NoPhoto,
    GroupGate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    Skipped(SkipReason),
}

// ────────────────────────────────────────────────────────────────────────────
// Event processing
// ────────────────────────────────────────────────────────────────────────────

pub async fn process_event<R: Rng>(
    state: &BotState,
    event: InboundEvent,
    rng: &mut R,
) -> Result<Outcome, BotError> {
    let chat_id = event.chat_id;

    if !state.policy.is_allowed(chat_id) {
        debug!(chat_id, "Chat is not allowed");
        return Ok(Outcome::Skipped(SkipReason::NotAllowed));
    }

    let Some(photo) = event.largest_photo() else {
        debug!(chat_id, "No photo");
        return Ok(Outcome::Skipped(SkipReason::NoPhoto));
    };

    if event.is_group && !state.group_gate.admits(event.caption.as_deref(), rng) {
        debug!(chat_id, "Group gate declined");
        return Ok(Outcome::Skipped(SkipReason::GroupGate));
    }

    let source = state.transport.fetch_photo(&photo.file_id).await?;
    debug!(
        chat_id,
        file_id = %photo.file_id,
        width = photo.width,
        bytes = source.len(),
        "Fetched photo"
    );

    let phrase = state
        .phrases
        .choose(rng)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("no caption phrases configured"))?;

    // Decode, layout, raster and encode are CPU-bound; keep them off the async workers.
    let font = Arc::clone(&state.font);
    let jpeg = tokio::task::spawn_blocking(move || caption_photo(&source, font.as_ref(), &phrase))
        .await
        .map_err(|e| {
            BotError::Internal(anyhow::anyhow!("spawn_blocking failed in caption render: {e}"))
        })??;
    debug!(chat_id, bytes = jpeg.len(), "Encoded JPEG");

    state
        .transport
        .send_photo(chat_id, jpeg, OUTPUT_FILE_NAME)
        .await?;
    debug!(chat_id, "Sent photo");

    Ok(Outcome::Sent)
}

/// Decodes `source`, draws `text` on it and re-encodes the result as JPEG.
pub fn caption_photo(
    source: &[u8],
    font: &dyn GlyphSource,
    text: &str,
) -> Result<Bytes, BotError> {
    let image = image::load_from_memory(source).map_err(BotError::Decode)?;
    let rendered = render_caption(&image, font, text)?;

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgba8(rendered).to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(BotError::Encode)?;

    Ok(Bytes::from(buf.into_inner()))
}

// ────────────────────────────────────────────────────────────────────────────
// Test doubles
// ────────────────────────────────────────────────────────────────────────────


// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
