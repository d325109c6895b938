// THEORY:
// Collaborators are the concrete content sources behind each slot. They implement
// the library's `Renderer` and `Rasterizer` traits and nothing else; the scheduler
// bounds them with timeouts and the pipeline turns their output into bitmaps.
//
// Every source reads from the local filesystem, so the content itself can be
// produced by whatever job the deployment prefers (cron, a template engine, a
// price scraper) and the server only ever deals with finished files.

pub mod browser;
pub mod chart;
pub mod html_file;
pub mod photo;

use std::sync::Arc;

use home_dashboard::Renderer;

use crate::config::{BrowserConfig, SourceConfig};

pub use browser::HeadlessBrowser;
pub use chart::PriceChart;
pub use html_file::HtmlFile;
pub use photo::PhotoFile;

/// Builds the renderer for one configured source. Photos and charts are drawn
/// at the browser's window size so every slot matches the panel.
pub fn renderer_for(source: &SourceConfig, panel: &BrowserConfig) -> Arc<dyn Renderer> {
    match source {
        SourceConfig::Html { path } => Arc::new(HtmlFile::new(path.clone())),
        SourceConfig::Photo { path } => {
            Arc::new(PhotoFile::new(path.clone(), panel.width, panel.height))
        }
        SourceConfig::Chart { path } => {
            Arc::new(PriceChart::new(path.clone(), panel.width, panel.height))
        }
    }
}
