// THEORY:
// Every way a single slot refresh can fail. None of these are fatal to the
// process: the scheduler logs the error, records it in the tick report, and the
// slot keeps serving its previous bitmap.

use std::fmt;
use std::time::Duration;

use crate::core_modules::bitmap::BitmapError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The bounded step of a render that ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Fetch,
    Rasterize,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderStage::Fetch => f.write_str("fetch"),
            RenderStage::Rasterize => f.write_str("rasterize"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: RenderStage, after: Duration },

    #[error("render cancelled")]
    Cancelled,

    #[error("renderer produced HTML but no rasterizer is configured")]
    NoRasterizer,

    /// A content source or rasterizer failed for its own reasons.
    #[error("collaborator failed: {0}")]
    Collaborator(#[source] BoxError),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bitmap encode failed: {0}")]
    Encode(#[from] BitmapError),

    #[error("conversion task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl RenderError {
    /// Wraps any collaborator-side error.
    pub fn collaborator(err: impl Into<BoxError>) -> Self {
        RenderError::Collaborator(err.into())
    }
}
