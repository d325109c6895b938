pub mod bitmap;
pub mod dispatcher;
pub mod dither;
pub mod image_cache;
pub mod luminance;
pub mod monochrome;
pub mod slot;
