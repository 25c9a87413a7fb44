// Caption layout engine.
// Pure image + font + text → annotated image; knows nothing about the transport.
// Rendering is CPU-bound: callers on the async runtime run it inside tokio::task::spawn_blocking.

pub mod font;
pub mod layout;
pub mod render;

use thiserror::Error;

pub use font::{CaptionFont, FontLoadError, GlyphSource};
pub use render::render_caption;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("caption text is empty")]
    EmptyText,

    #[error("source image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("caption text {text:?} has no measurable width")]
    Unmeasurable { text: String },
}
