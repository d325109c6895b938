// THEORY:
// The `pipeline` module is the top-level conversion API. It encapsulates the
// luminance -> dither -> encode stack behind a single call and defines the seams
// through which external collaborators feed it.
//
// Collaborators come in two kinds:
// - a `Renderer` produces a slot's raw content, either a finished raster image
//   (a photo, a chart) or an HTML document;
// - a `Rasterizer` turns an HTML document into a raster image (a headless browser).
//
// Both receive the process-wide cancellation token and return boxed futures so
// heterogeneous collaborators can sit side by side in one registry. The pipeline
// itself does not know or care how an image was produced.

use futures::future::BoxFuture;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core_modules::bitmap::{self, BitmapError};
use crate::core_modules::dither::{DitherAlgorithm, DitherOptions, HybridBand, dither_plane};
use crate::core_modules::luminance::LumaPlane;
use crate::error::RenderError;

// Re-export key data structures for the public API.
pub use crate::core_modules::monochrome::MonoImage;

/// What a content source hands back for one refresh.
#[derive(Debug, Clone)]
pub enum RenderOutput {
    Image(DynamicImage),
    Html(String),
}

/// How a slot's color image becomes black and white.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Conversion {
    /// Run the dither engine.
    Dither {
        #[serde(default)]
        algorithm: DitherAlgorithm,
        #[serde(default)]
        invert: bool,
    },
    /// Threshold at 50% luminance, no dithering. Suited to line art that is
    /// already black and white, such as charts.
    Direct,
}

impl Default for Conversion {
    fn default() -> Self {
        Conversion::Dither {
            algorithm: DitherAlgorithm::default(),
            invert: false,
        }
    }
}

/// Converts a color image into an encoded 1-bpp bitmap.
pub fn convert(
    image: &DynamicImage,
    conversion: Conversion,
    band: HybridBand,
) -> Result<Vec<u8>, BitmapError> {
    match conversion {
        Conversion::Dither { algorithm, invert } => {
            let plane = LumaPlane::from_image(image);
            let mono = dither_plane(
                &plane,
                DitherOptions {
                    algorithm,
                    invert,
                    band,
                },
            );
            bitmap::encode(&mono)
        }
        Conversion::Direct => bitmap::encode_color(image),
    }
}

/// Produces the raw content for one slot.
pub trait Renderer: Send + Sync {
    fn render<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<RenderOutput, RenderError>>;
}

/// Turns an HTML document into a raster image.
pub trait Rasterizer: Send + Sync {
    fn rasterize<'a>(
        &'a self,
        html: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<DynamicImage, RenderError>>;
}
