use thiserror::Error;

use crate::caption::RenderError;
use crate::telegram::TransportError;

/// Errors raised while handling a single inbound event.
///
/// Policy rejections are not errors; they come back as `Outcome::Skipped`.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Image decode error: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Image encode error: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
