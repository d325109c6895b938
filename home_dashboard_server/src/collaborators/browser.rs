// THEORY:
// HTML slots are rasterized by a Chromium-compatible browser run in headless
// screenshot mode, one short-lived process per render:
//
//   <command> --headless --disable-gpu --hide-scrollbars --window-size=W,H
//             --screenshot=<tmp.png> [extra args] file://<tmp.html>
//
// The document is written to a temp file beside the screenshot and handed over
// as a `file://` URL, so its size never counts against the argv limit. The
// child is spawned with `kill_on_drop`: when the scheduler's timeout or the
// shutdown token drops this future, the browser dies with it. Both temp files
// are removed on every exit path.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use home_dashboard::{RenderError, Rasterizer};
use image::{DynamicImage, ImageFormat, imageops::FilterType};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::BrowserConfig;

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("browser exited with {status}: {stderr}")]
    Exited { status: ExitStatus, stderr: String },
}

/// Process-wide, so several browsers never share a scratch file.
static SCRATCH: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
pub struct HeadlessBrowser {
    config: BrowserConfig,
}

impl HeadlessBrowser {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// A fresh temp path stem; the document and screenshot share it.
    fn scratch_path(&self) -> PathBuf {
        let n = SCRATCH.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("home_dashboard-{}-{n}", std::process::id()))
    }

    /// Full argument list for one screenshot.
    fn args(&self, url: &str, screenshot: &Path) -> Vec<String> {
        let mut args = vec![
            "--headless".to_string(),
            "--disable-gpu".to_string(),
            "--hide-scrollbars".to_string(),
            format!("--window-size={},{}", self.config.width, self.config.height),
            format!("--screenshot={}", screenshot.display()),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        args.push(url.to_string());
        args
    }

    async fn screenshot(
        &self,
        html: &str,
        cancel: &CancellationToken,
    ) -> Result<DynamicImage, RenderError> {
        let scratch = self.scratch_path();
        let document = TempFile(scratch.with_extension("html"));
        let screenshot = TempFile(scratch.with_extension("png"));
        tokio::fs::write(&document.0, html).await?;

        let mut command = Command::new(&self.config.command);
        command
            .args(self.args(&file_url(&document.0), &screenshot.0))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RenderError::Cancelled),
            output = command.output() => output?,
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::collaborator(BrowserError::Exited {
                status: output.status,
                stderr: stderr.trim().lines().last().unwrap_or_default().to_string(),
            }));
        }

        let png = tokio::fs::read(&screenshot.0).await?;
        let image = image::load_from_memory_with_format(&png, ImageFormat::Png)?;
        Ok(fit(image, self.config.width, self.config.height))
    }
}

impl Rasterizer for HeadlessBrowser {
    fn rasterize<'a>(
        &'a self,
        html: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<DynamicImage, RenderError>> {
        self.screenshot(html, cancel).boxed()
    }
}

/// Removes its file when the render ends, however it ends.
struct TempFile(PathBuf);

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Some browsers pad the screenshot by a few pixels; bring it back to the panel.
fn fit(image: DynamicImage, width: u32, height: u32) -> DynamicImage {
    if image.width() == width && image.height() == height {
        return image;
    }
    log::debug!(
        "screenshot is {}x{}, resizing to {width}x{height}",
        image.width(),
        image.height()
    );
    image.resize_exact(width, height, FilterType::Triangle)
}
