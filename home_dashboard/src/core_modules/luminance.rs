// THEORY:
// Luminance is the only signal the dither engine ever looks at. Every algorithm,
// ordered or error-diffusing, reads the same per-pixel value so their outputs can
// be compared side by side.
//
// The value is the Rec. 601 weighted sum `0.299 R + 0.587 G + 0.114 B`, computed in
// integer arithmetic on 16-bit channels (0..65535). 8-bit sources are widened by the
// image crate (x * 257), so pure white always lands on 65535 regardless of the
// source depth. Error diffusion works on the normalized form `L / 65535`.
//
// A `LumaPlane` is computed once per source image and then handed to whichever
// algorithm was selected; it is a "dumb" container with no knowledge of dithering.

use image::DynamicImage;

pub type Luminance = u16;

/// Upper bound of the luminance scale.
pub const MAX_LUMINANCE: Luminance = Luminance::MAX;

/// Midpoint of the luminance scale, used by direct (non-dithered) thresholding.
pub const HALF_LUMINANCE: Luminance = 32768;

const RED_WEIGHT: u32 = 299;
const GREEN_WEIGHT: u32 = 587;
const BLUE_WEIGHT: u32 = 114;
const WEIGHT_SUM: u32 = RED_WEIGHT + GREEN_WEIGHT + BLUE_WEIGHT;

/// Weighted luminance of a 16-bit RGB sample.
#[inline]
pub fn luminance(red: u16, green: u16, blue: u16) -> Luminance {
    let weighted =
        RED_WEIGHT * red as u32 + GREEN_WEIGHT * green as u32 + BLUE_WEIGHT * blue as u32;
    (weighted / WEIGHT_SUM) as Luminance
}

/// Luminance mapped onto `[0, 1]`.
#[inline]
pub fn normalized(sample: Luminance) -> f64 {
    sample as f64 / MAX_LUMINANCE as f64
}

/// Per-pixel luminance of a whole image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaPlane {
    width: u32,
    height: u32,
    samples: Vec<Luminance>,
}

impl LumaPlane {
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb16();
        let samples = rgb
            .pixels()
            .map(|pixel| luminance(pixel[0], pixel[1], pixel[2]))
            .collect();

        Self {
            width: rgb.width(),
            height: rgb.height(),
            samples,
        }
    }

    /// Builds a plane from precomputed samples. Returns `None` when the sample
    /// count does not match the dimensions.
    pub fn from_samples(width: u32, height: u32, samples: Vec<Luminance>) -> Option<Self> {
        if samples.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Luminance] {
        &self.samples
    }

    pub fn get(&self, x: u32, y: u32) -> Luminance {
        self.samples[y as usize * self.width as usize + x as usize]
    }
}
