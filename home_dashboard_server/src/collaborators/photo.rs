// THEORY:
// A still photo, cover-cropped to the panel.
//
// The photo is scaled so it fills the panel completely: the source is trimmed to
// the panel's aspect ratio around its center, then resampled bilinearly. Nothing
// is letterboxed and nothing is distorted.

use std::path::PathBuf;

use futures::FutureExt;
use futures::future::BoxFuture;
use home_dashboard::{RenderError, RenderOutput, Renderer};
use image::DynamicImage;
use image::imageops::FilterType;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct PhotoFile {
    path: PathBuf,
    width: u32,
    height: u32,
}

impl PhotoFile {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            width,
            height,
        }
    }
}

impl Renderer for PhotoFile {
    fn render<'a>(
        &'a self,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<RenderOutput, RenderError>> {
        async move {
            let bytes = tokio::fs::read(&self.path).await?;
            let (width, height) = (self.width, self.height);
            let image = tokio::task::spawn_blocking(move || {
                image::load_from_memory(&bytes).map(|photo| cover(&photo, width, height))
            })
            .await??;
            Ok(RenderOutput::Image(image))
        }
        .boxed()
    }
}

/// Crops `image` to the `width:height` aspect around its center and scales the
/// crop to exactly `width` x `height`.
pub fn cover(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (src_w, src_h) = (image.width(), image.height());
    if src_w == 0 || src_h == 0 {
        return DynamicImage::new_rgb8(width, height);
    }

    let target_ratio = width as f64 / height as f64;
    let src_ratio = src_w as f64 / src_h as f64;

    let (x, y, crop_w, crop_h) = if src_ratio > target_ratio {
        // Too wide: trim the sides.
        let crop_w = ((src_h as f64 * target_ratio) as u32).clamp(1, src_w);
        ((src_w - crop_w) / 2, 0, crop_w, src_h)
    } else {
        // Too tall: trim top and bottom.
        let crop_h = ((src_w as f64 / target_ratio) as u32).clamp(1, src_h);
        (0, (src_h - crop_h) / 2, src_w, crop_h)
    };

    image
        .crop_imm(x, y, crop_w, crop_h)
        .resize_exact(width, height, FilterType::Triangle)
}
