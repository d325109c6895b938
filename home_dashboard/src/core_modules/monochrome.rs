// THEORY:
// `MonoImage` is the single output type of the dither engine and the single input
// type of the bitmap encoder. It is deliberately colorless: a pixel is black or it
// is not. Once an image has been reduced to this form, nothing downstream ever
// re-derives black/white from color again.

/// A width x height grid of black (`true`) / white (`false`) pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonoImage {
    width: u32,
    height: u32,
    black: Vec<bool>,
}

impl MonoImage {
    /// An all-white image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            black: vec![false; width as usize * height as usize],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut is_black: impl FnMut(u32, u32) -> bool) -> Self {
        let mut black = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                black.push(is_black(x, y));
            }
        }
        Self {
            width,
            height,
            black,
        }
    }

    /// Wraps a row-major pixel vector. Returns `None` when the length does not
    /// match the dimensions.
    pub fn from_pixels(width: u32, height: u32, black: Vec<bool>) -> Option<Self> {
        (black.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            black,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_black(&self, x: u32, y: u32) -> bool {
        self.black[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, black: bool) {
        let i = self.index(x, y);
        self.black[i] = black;
    }

    /// One row of pixels, left to right.
    pub fn row(&self, y: u32) -> &[bool] {
        let start = y as usize * self.width as usize;
        &self.black[start..start + self.width as usize]
    }

    pub fn pixels(&self) -> &[bool] {
        &self.black
    }

    pub fn black_count(&self) -> usize {
        self.black.iter().filter(|&&b| b).count()
    }

    /// Flips every pixel in place.
    pub fn invert(&mut self) {
        self.black.iter_mut().for_each(|b| *b = !*b);
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_images_are_white() {
        let img = MonoImage::new(3, 2);
        assert_eq!(img.black_count(), 0);
        assert_eq!(img.pixels().len(), 6);
    }

    #[test]
    fn rows_are_addressed_top_down() {
        let img = MonoImage::from_fn(3, 2, |_, y| y == 1);
        assert_eq!(img.row(0), &[false, false, false]);
        assert_eq!(img.row(1), &[true, true, true]);
    }

    #[test]
    fn set_and_invert() {
        let mut img = MonoImage::new(2, 2);
        img.set(1, 0, true);
        assert!(img.is_black(1, 0));
        img.invert();
        assert!(!img.is_black(1, 0));
        assert_eq!(img.black_count(), 3);
    }

    #[test]
    fn from_pixels_checks_length() {
        assert!(MonoImage::from_pixels(2, 2, vec![true; 3]).is_none());
        assert!(MonoImage::from_pixels(0, 5, Vec::new()).is_some());
    }
}
