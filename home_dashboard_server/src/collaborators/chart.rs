// THEORY:
// The stocks slot is a price history drawn as a plain line chart: white strokes
// on a black background, which is what the panel shows well without dithering
// (the slot uses the direct threshold conversion).
//
// Layout, for a W x H canvas:
// - plot area inset by 40 px left, 10 px right, 70 px top, 40 px bottom;
// - five dotted horizontal grid lines, evenly spaced from the lowest price (the
//   bottom edge of the plot) to the highest (the top edge);
// - the series as a 2 px polyline from left edge to right edge;
// - a filled dot on the most recent price.
//
// The price file is a JSON array of numbers, oldest first. Non-positive points
// are gaps in the feed and are dropped.

use std::path::PathBuf;

use embedded_graphics::{
    Drawable, Pixel,
    pixelcolor::BinaryColor,
    prelude::{DrawTarget, OriginDimensions, Point, Primitive, Size},
    primitives::{Circle, Polyline, PrimitiveStyle},
};
use futures::FutureExt;
use futures::future::BoxFuture;
use home_dashboard::{RenderError, RenderOutput, Renderer};
use image::{DynamicImage, Rgb, RgbImage};
use tokio_util::sync::CancellationToken;

const MARGIN_LEFT: f64 = 40.0;
const MARGIN_RIGHT: f64 = 10.0;
const MARGIN_TOP: f64 = 70.0;
const MARGIN_BOTTOM: f64 = 40.0;
const GRID_LINES: u32 = 5;
const GRID_DOT_SPACING: usize = 4;
const SERIES_STROKE: u32 = 2;
const LAST_PRICE_DIAMETER: u32 = 9;

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const INK: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("price series has no positive points")]
    NoPrices,

    #[error("price file is not a JSON array of numbers: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct PriceChart {
    path: PathBuf,
    width: u32,
    height: u32,
}

impl PriceChart {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            width,
            height,
        }
    }
}

impl Renderer for PriceChart {
    fn render<'a>(
        &'a self,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<RenderOutput, RenderError>> {
        async move {
            let raw = tokio::fs::read(&self.path).await?;
            let prices: Vec<f64> = serde_json::from_slice(&raw)
                .map_err(|err| RenderError::collaborator(ChartError::from(err)))?;
            let chart =
                draw_chart(&prices, self.width, self.height).map_err(RenderError::collaborator)?;
            Ok(RenderOutput::Image(DynamicImage::ImageRgb8(chart)))
        }
        .boxed()
    }
}

/// Draws `prices` (oldest first) as a white-on-black line chart.
pub fn draw_chart(prices: &[f64], width: u32, height: u32) -> Result<RgbImage, ChartError> {
    let prices: Vec<f64> = prices
        .iter()
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
        .collect();
    let (Some(&first), Some(&last)) = (prices.first(), prices.last()) else {
        return Err(ChartError::NoPrices);
    };

    let mut min = first;
    let mut max = first;
    for &p in &prices {
        min = min.min(p);
        max = max.max(p);
    }
    if max == min {
        max += 1.0;
    }

    let mut canvas = Canvas(RgbImage::from_pixel(width, height, BACKGROUND));
    let (w, h) = (width as f64, height as f64);
    let plot_w = (w - MARGIN_LEFT - MARGIN_RIGHT).max(0.0);
    let plot_h = (h - MARGIN_TOP - MARGIN_BOTTOM).max(0.0);
    let bottom = h - MARGIN_BOTTOM;

    let (left, right) = (MARGIN_LEFT as i32, (w - MARGIN_RIGHT) as i32);
    let grid = (0..GRID_LINES).flat_map(|i| {
        let y = (bottom - plot_h * i as f64 / (GRID_LINES - 1) as f64).round() as i32;
        (left..=right)
            .step_by(GRID_DOT_SPACING)
            .map(move |x| Pixel(Point::new(x, y), BinaryColor::On))
    });
    let Ok(()) = canvas.draw_iter(grid);

    let steps = (prices.len() - 1).max(1) as f64;
    let point = |i: usize, p: f64| {
        let x = MARGIN_LEFT + plot_w * i as f64 / steps;
        let y = bottom - plot_h * (p - min) / (max - min);
        Point::new(x.round() as i32, y.round() as i32)
    };

    let points: Vec<Point> = prices.iter().enumerate().map(|(i, &p)| point(i, p)).collect();
    let Ok(()) = Polyline::new(&points)
        .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, SERIES_STROKE))
        .draw(&mut canvas);

    let Ok(()) = Circle::with_center(point(prices.len() - 1, last), LAST_PRICE_DIAMETER)
        .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
        .draw(&mut canvas);

    Ok(canvas.0)
}

/// An `RgbImage` as a two-colour draw target: `On` is ink, `Off` is background.
/// Pixels outside the image are clipped.
struct Canvas(RgbImage);

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.0.width(), self.0.height())
    }
}

impl DrawTarget for Canvas {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(coord.x), u32::try_from(coord.y)) else {
                continue;
            };
            if x < self.0.width() && y < self.0.height() {
                let rgb = if color.is_on() { INK } else { BACKGROUND };
                self.0.put_pixel(x, y, rgb);
            }
        }
        Ok(())
    }
}
