// THEORY:
// This file is the entry point for the `home_dashboard` library crate. It turns
// color content into the 1-bit bitmaps an e-paper panel can show, keeps the latest
// bitmap per slot in memory, and decides which slot the panel should show next.
//
// The layers, bottom up:
// - `core_modules`: the pure pieces. Luminance, dithering, BMP encoding, the slot
//   cache and the dispatcher. None of them touch the network or the clock.
// - `pipeline`: the one-call conversion API plus the `Renderer` / `Rasterizer`
//   traits that content collaborators implement.
// - `scheduler`: the background task that drives collaborators through the
//   pipeline into the cache on a timer.
//
// Collaborators themselves (browsers, files, charts) live with the server binary.

pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod scheduler;

pub use core_modules::dispatcher::{DispatchConfig, Dispatcher, TimeOfDay};
pub use core_modules::dither::{DitherAlgorithm, HybridBand};
pub use core_modules::image_cache::{CachedArtifact, ImageCache};
pub use core_modules::slot::Slot;
pub use error::RenderError;
pub use pipeline::{Conversion, Rasterizer, RenderOutput, Renderer, convert};
pub use scheduler::{RefreshPolicy, RefreshScheduler, SchedulerConfig, SlotJob, TickReport};
