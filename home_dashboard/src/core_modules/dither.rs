// THEORY:
// The dither engine turns a `LumaPlane` into a `MonoImage`. Each algorithm is a pure
// function of the plane: no shared state, no randomness, so independent images can be
// dithered concurrently and identical input always produces identical output.
//
// Families:
// 1.  **Ordered (Bayer)**: a fixed N x N threshold matrix tiled over the image. The
//     luminance is quantized to N^2 levels and compared against the matrix cell at
//     `(x mod N, y mod N)`. The comparison is made against the center of the cell's
//     level bucket, so a fully black source stays fully black and a fully white
//     source stays fully white.
// 2.  **Hybrid**: ordered dithering restricted to an "ambiguous" luminance band.
//     Clearly dark pixels go straight to black and clearly bright pixels straight to
//     white, which keeps text and line art crisp while still shading mid-tones.
// 3.  **Error diffusion (Floyd-Steinberg)**: a running buffer of normalized luminance;
//     each pixel is thresholded at 0.5 and its quantization error pushed forward to
//     the not-yet-visited neighbours. Out-of-bounds neighbours are skipped.
//
// `invert` is applied last, after the algorithm's own decision.

use std::fmt;
use std::str::FromStr;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::core_modules::luminance::{LumaPlane, Luminance, normalized};
use crate::core_modules::monochrome::MonoImage;

/// Bayer 4x4 ordered-dither matrix (values 0..15).
pub const BAYER_4X4: [[u8; 4]; 4] = [
    [0, 8, 2, 10],
    [12, 4, 14, 6],
    [3, 11, 1, 9],
    [15, 7, 13, 5],
];

/// Bayer 8x8 ordered-dither matrix (values 0..63).
pub const BAYER_8X8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

// 16-bit luminance >> 12 gives 0..15, >> 10 gives 0..63.
const LEVEL_SHIFT_4X4: u32 = 12;
const LEVEL_SHIFT_8X8: u32 = 10;

/// Floyd-Steinberg threshold on the normalized scale.
const DIFFUSION_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DitherAlgorithm {
    #[serde(rename = "ordered_8x8")]
    Ordered8x8,
    #[serde(rename = "ordered_4x4")]
    Ordered4x4,
    #[serde(rename = "hybrid_4x4")]
    Hybrid4x4,
    #[serde(rename = "hybrid_8x8")]
    Hybrid8x8,
    #[default]
    #[serde(rename = "floyd_steinberg")]
    FloydSteinberg,
}

impl DitherAlgorithm {
    pub const ALL: [DitherAlgorithm; 5] = [
        DitherAlgorithm::Ordered8x8,
        DitherAlgorithm::Ordered4x4,
        DitherAlgorithm::Hybrid4x4,
        DitherAlgorithm::Hybrid8x8,
        DitherAlgorithm::FloydSteinberg,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DitherAlgorithm::Ordered8x8 => "ordered_8x8",
            DitherAlgorithm::Ordered4x4 => "ordered_4x4",
            DitherAlgorithm::Hybrid4x4 => "hybrid_4x4",
            DitherAlgorithm::Hybrid8x8 => "hybrid_8x8",
            DitherAlgorithm::FloydSteinberg => "floyd_steinberg",
        }
    }
}

impl fmt::Display for DitherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dither algorithm `{0}` (expected one of ordered_8x8, ordered_4x4, hybrid_4x4, hybrid_8x8, floyd_steinberg)")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for DitherAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DitherAlgorithm::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAlgorithm(s.to_string()))
    }
}

/// Luminance cut points for the hybrid algorithms, on the 0..65535 scale.
/// Below `low` is always black, above `high` always white; only the band in
/// between is dithered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HybridBand {
    pub low: Luminance,
    pub high: Luminance,
}

impl HybridBand {
    pub const DEFAULT: HybridBand = HybridBand {
        low: 18000,
        high: 52000,
    };

    pub fn is_valid(&self) -> bool {
        self.low < self.high
    }
}

impl Default for HybridBand {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DitherOptions {
    pub algorithm: DitherAlgorithm,
    pub invert: bool,
    pub band: HybridBand,
}

/// Dithers a color image with the default hybrid band.
pub fn dither(image: &DynamicImage, algorithm: DitherAlgorithm, invert: bool) -> MonoImage {
    dither_plane(
        &LumaPlane::from_image(image),
        DitherOptions {
            algorithm,
            invert,
            band: HybridBand::DEFAULT,
        },
    )
}

pub fn dither_plane(plane: &LumaPlane, options: DitherOptions) -> MonoImage {
    let mut out = match options.algorithm {
        DitherAlgorithm::Ordered8x8 => ordered(plane, is_black_8x8),
        DitherAlgorithm::Ordered4x4 => ordered(plane, is_black_4x4),
        DitherAlgorithm::Hybrid4x4 => ordered(plane, |s, x, y| {
            hybrid(options.band, s).unwrap_or_else(|| is_black_4x4(s, x, y))
        }),
        DitherAlgorithm::Hybrid8x8 => ordered(plane, |s, x, y| {
            hybrid(options.band, s).unwrap_or_else(|| is_black_8x8(s, x, y))
        }),
        DitherAlgorithm::FloydSteinberg => floyd_steinberg(plane).0,
    };

    if options.invert {
        out.invert();
    }
    out
}

fn ordered(plane: &LumaPlane, is_black: impl Fn(Luminance, u32, u32) -> bool) -> MonoImage {
    MonoImage::from_fn(plane.width(), plane.height(), |x, y| {
        is_black(plane.get(x, y), x, y)
    })
}

/// Ordered-dither decision for a single sample. The matrix value `t` selects level
/// bucket `t`; the sample is black when it lies below that bucket's center.
#[inline]
fn bayer_is_black(sample: Luminance, cell: u8, level_shift: u32) -> bool {
    let threshold = ((cell as u32) << level_shift) + (1 << (level_shift - 1));
    (sample as u32) < threshold
}

#[inline]
fn is_black_4x4(sample: Luminance, x: u32, y: u32) -> bool {
    let cell = BAYER_4X4[(y & 3) as usize][(x & 3) as usize];
    bayer_is_black(sample, cell, LEVEL_SHIFT_4X4)
}

#[inline]
fn is_black_8x8(sample: Luminance, x: u32, y: u32) -> bool {
    let cell = BAYER_8X8[(y & 7) as usize][(x & 7) as usize];
    bayer_is_black(sample, cell, LEVEL_SHIFT_8X8)
}

/// Direct decision outside the band, `None` inside it.
#[inline]
fn hybrid(band: HybridBand, sample: Luminance) -> Option<bool> {
    if sample < band.low {
        Some(true)
    } else if sample > band.high {
        Some(false)
    } else {
        None
    }
}

/// Returns the dithered image together with the working buffer as it stood after
/// the scan (each entry is the pixel's value at the moment it was quantized).
fn floyd_steinberg(plane: &LumaPlane) -> (MonoImage, Vec<f64>) {
    let width = plane.width() as usize;
    let height = plane.height() as usize;
    let mut buffer: Vec<f64> = plane.samples().iter().map(|&s| normalized(s)).collect();
    let mut black = Vec::with_capacity(buffer.len());

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let old = buffer[i];
            let quantized = if old >= DIFFUSION_THRESHOLD { 1.0 } else { 0.0 };
            let error = old - quantized;
            black.push(quantized < DIFFUSION_THRESHOLD);

            if x + 1 < width {
                buffer[i + 1] += error * 7.0 / 16.0;
            }
            if y + 1 < height {
                let below = i + width;
                if x > 0 {
                    buffer[below - 1] += error * 3.0 / 16.0;
                }
                buffer[below] += error * 5.0 / 16.0;
                if x + 1 < width {
                    buffer[below + 1] += error * 1.0 / 16.0;
                }
            }
        }
    }

    let image = MonoImage::from_pixels(plane.width(), plane.height(), black)
        .unwrap_or_else(|| MonoImage::new(plane.width(), plane.height()));
    (image, buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::luminance::MAX_LUMINANCE;
    use proptest::prelude::*;

    fn plane(width: u32, height: u32, samples: &[Luminance]) -> LumaPlane {
        LumaPlane::from_samples(width, height, samples.to_vec()).expect("sample count")
    }

    fn flat(width: u32, height: u32, value: Luminance) -> LumaPlane {
        plane(width, height, &vec![value; (width * height) as usize])
    }

    fn options(algorithm: DitherAlgorithm) -> DitherOptions {
        DitherOptions {
            algorithm,
            ..DitherOptions::default()
        }
    }

    #[test]
    fn matrices_cover_their_full_range_once() {
        let mut seen4: Vec<u8> = BAYER_4X4.iter().flatten().copied().collect();
        seen4.sort_unstable();
        assert_eq!(seen4, (0..16).collect::<Vec<u8>>());

        let mut seen8: Vec<u8> = BAYER_8X8.iter().flatten().copied().collect();
        seen8.sort_unstable();
        assert_eq!(seen8, (0..64).collect::<Vec<u8>>());
    }

    #[test]
    fn two_by_two_black_over_white_with_ordered_8x8() {
        let img = dither_plane(
            &plane(2, 2, &[0, 0, MAX_LUMINANCE, MAX_LUMINANCE]),
            options(DitherAlgorithm::Ordered8x8),
        );
        assert_eq!(img.row(0), &[true, true]);
        assert_eq!(img.row(1), &[false, false]);
    }

    #[test]
    fn solid_extremes_stay_solid_for_every_algorithm() {
        for algorithm in DitherAlgorithm::ALL {
            let black = dither_plane(&flat(16, 16, 0), options(algorithm));
            let white = dither_plane(&flat(16, 16, MAX_LUMINANCE), options(algorithm));
            assert_eq!(black.black_count(), 256, "{algorithm} on black");
            assert_eq!(white.black_count(), 0, "{algorithm} on white");
        }
    }

    #[test]
    fn mid_gray_ordered_dither_is_half_black() {
        let img = dither_plane(&flat(8, 8, 32768), options(DitherAlgorithm::Ordered8x8));
        assert_eq!(img.black_count(), 32);

        let img = dither_plane(&flat(4, 4, 32768), options(DitherAlgorithm::Ordered4x4));
        assert_eq!(img.black_count(), 8);
    }

    #[test]
    fn invert_flips_every_pixel() {
        let source = plane(3, 1, &[0, 40000, MAX_LUMINANCE]);
        for algorithm in DitherAlgorithm::ALL {
            let normal = dither_plane(&source, options(algorithm));
            let inverted = dither_plane(
                &source,
                DitherOptions {
                    algorithm,
                    invert: true,
                    ..DitherOptions::default()
                },
            );
            for (a, b) in normal.pixels().iter().zip(inverted.pixels()) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn zero_sized_input_gives_zero_sized_output() {
        let empty = LumaPlane::from_samples(0, 0, Vec::new()).expect("empty plane");
        for algorithm in DitherAlgorithm::ALL {
            let out = dither_plane(&empty, options(algorithm));
            assert_eq!((out.width(), out.height()), (0, 0));
        }
        let tall = LumaPlane::from_samples(0, 7, Vec::new()).expect("empty plane");
        assert_eq!(dither_plane(&tall, options(DitherAlgorithm::FloydSteinberg)).height(), 7);
    }

    #[test]
    fn floyd_steinberg_diffuses_mid_gray() {
        let img = dither_plane(&flat(16, 16, 32768), options(DitherAlgorithm::FloydSteinberg));
        let black = img.black_count();
        assert!((112..=144).contains(&black), "got {black} black pixels");
    }

    #[test]
    fn floyd_steinberg_pushes_error_to_the_right() {
        // 0.4 rounds to black; +0.175 of error lands on the right neighbour (0.4 -> 0.575).
        let sample = (0.4 * MAX_LUMINANCE as f64) as Luminance;
        let (img, buffer) = floyd_steinberg(&plane(2, 1, &[sample, sample]));
        assert!(img.is_black(0, 0));
        assert!(!img.is_black(1, 0));
        assert!((buffer[1] - (normalized(sample) * (1.0 + 7.0 / 16.0))).abs() < 1e-9);
    }

    #[test]
    fn algorithm_names_round_trip_through_from_str() {
        for algorithm in DitherAlgorithm::ALL {
            assert_eq!(algorithm.as_str().parse::<DitherAlgorithm>(), Ok(algorithm));
        }
        assert!("bayer".parse::<DitherAlgorithm>().is_err());
    }

    #[test]
    fn default_band_is_valid() {
        assert!(HybridBand::default().is_valid());
        assert!(!HybridBand { low: 5, high: 5 }.is_valid());
    }

    #[test]
    fn hybrid_band_edges_fall_through_to_the_matrix() {
        let band = HybridBand::DEFAULT;
        let pairs = [
            (DitherAlgorithm::Hybrid4x4, DitherAlgorithm::Ordered4x4),
            (DitherAlgorithm::Hybrid8x8, DitherAlgorithm::Ordered8x8),
        ];
        for edge in [band.low, band.high] {
            let tile = flat(8, 8, edge);
            for (hybrid, ordered) in pairs {
                let mixed = dither_plane(&tile, DitherOptions { algorithm: hybrid, invert: false, band });
                assert_eq!(mixed, dither_plane(&tile, options(ordered)), "{hybrid} at {edge}");
                assert!(
                    (1..64).contains(&mixed.black_count()),
                    "{hybrid} at {edge} should be a pattern, got {} black",
                    mixed.black_count()
                );
            }
        }
    }

    proptest! {
        #[test]
        fn ordered_output_depends_only_on_value_and_matrix_position(
            value in any::<u16>(),
            x in 0u32..64,
            y in 0u32..64,
            invert in any::<bool>(),
        ) {
            for algorithm in [DitherAlgorithm::Ordered8x8, DitherAlgorithm::Ordered4x4] {
                let opts = DitherOptions { algorithm, invert, ..DitherOptions::default() };
                let size = 8;
                let here = dither_plane(&flat(x % size + 1 + 8, y % size + 1 + 8, value), opts);
                let tile = dither_plane(&flat(size, size, value), opts);
                prop_assert_eq!(here.is_black(x % size + 8, y % size + 8), tile.is_black(x % size, y % size));
                let again = dither_plane(&flat(x % size + 1 + 8, y % size + 1 + 8, value), opts);
                prop_assert_eq!(here, again);
            }
        }

        #[test]
        fn hybrid_band_edges_ignore_the_matrix(
            value in prop_oneof![0u16..18000, 52001u16..=u16::MAX],
            x in 0u32..8,
            y in 0u32..8,
        ) {
            let band = HybridBand::DEFAULT;
            for algorithm in [DitherAlgorithm::Hybrid4x4, DitherAlgorithm::Hybrid8x8] {
                let img = dither_plane(&flat(8, 8, value), DitherOptions { algorithm, invert: false, band });
                prop_assert_eq!(img.is_black(x, y), value < band.low);
            }
        }

        #[test]
        fn floyd_steinberg_working_values_stay_bounded(
            samples in proptest::collection::vec(any::<u16>(), 48),
        ) {
            let (_, buffer) = floyd_steinberg(&plane(8, 6, &samples));
            for value in buffer {
                prop_assert!((-0.5 - 1e-9..=1.5 + 1e-9).contains(&value), "value {} escaped", value);
            }
        }
    }
}
