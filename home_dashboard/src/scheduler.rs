// THEORY:
// The refresh scheduler is the single writer of the `ImageCache`. It owns a list of
// slot jobs and, on every tick of a periodic timer, walks that list in order:
//
//   render (fetch timeout) -> rasterize if HTML (rasterize timeout)
//     -> convert on the blocking pool -> cache.set
//
// Jobs run one after another, never in parallel, so a tick never puts more than
// one headless browser on the machine at a time. Each job is isolated: an error is
// logged, recorded in the tick's `TickReport`, and the slot keeps whatever bitmap it
// had before. The next job runs regardless.
//
// Every await inside a job races the process-wide cancellation token. Once it has
// fired, the in-flight result is dropped on the floor and no further job starts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::core_modules::dither::HybridBand;
use crate::core_modules::image_cache::ImageCache;
use crate::core_modules::slot::Slot;
use crate::error::{RenderError, RenderStage};
use crate::pipeline::{self, Conversion, Rasterizer, RenderOutput, Renderer};

pub const DEFAULT_INTERVAL_SECS: u64 = 20;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_RASTERIZE_TIMEOUT_SECS: u64 = 10;

/// Timer and conversion settings, as found in the `[refresh]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub rasterize_timeout_secs: u64,
    pub hybrid: HybridBand,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            rasterize_timeout_secs: DEFAULT_RASTERIZE_TIMEOUT_SECS,
            hybrid: HybridBand::DEFAULT,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn rasterize_timeout(&self) -> Duration {
        Duration::from_secs(self.rasterize_timeout_secs)
    }
}

/// When a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// On every tick.
    #[default]
    EveryTick,
    /// Until the slot holds a bitmap, then never again. For static content.
    UntilPopulated,
}

/// One slot's refresh recipe.
#[derive(Clone)]
pub struct SlotJob {
    pub slot: Slot,
    pub renderer: Arc<dyn Renderer>,
    pub conversion: Conversion,
    pub policy: RefreshPolicy,
}

impl std::fmt::Debug for SlotJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotJob")
            .field("slot", &self.slot)
            .field("conversion", &self.conversion)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Outcome of one pass over the job list.
#[derive(Debug, Default)]
pub struct TickReport {
    pub refreshed: Vec<Slot>,
    pub skipped: Vec<Slot>,
    pub failed: Vec<(Slot, RenderError)>,
}

impl TickReport {
    pub fn failed_slots(&self) -> Vec<Slot> {
        self.failed.iter().map(|(slot, _)| *slot).collect()
    }
}

pub struct RefreshScheduler {
    cache: Arc<ImageCache>,
    jobs: Vec<SlotJob>,
    rasterizer: Option<Arc<dyn Rasterizer>>,
    config: SchedulerConfig,
}

impl RefreshScheduler {
    pub fn new(cache: Arc<ImageCache>, config: SchedulerConfig) -> Self {
        Self {
            cache,
            jobs: Vec::new(),
            rasterizer: None,
            config,
        }
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    /// Appends a job. Jobs run in registration order.
    pub fn register(&mut self, job: SlotJob) -> &mut Self {
        self.jobs.push(job);
        self
    }

    pub fn jobs(&self) -> &[SlotJob] {
        &self.jobs
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Ticks until `cancel` fires. The first tick is immediate so the cache warms
    /// at startup; a tick that overruns the interval delays the next one.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!(
            "refresh scheduler started: {} jobs every {:?}",
            self.jobs.len(),
            self.config.interval()
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.refresh_all(&cancel).await;
                    log::debug!(
                        "tick done: {} refreshed, {} skipped, {} failed",
                        report.refreshed.len(),
                        report.skipped.len(),
                        report.failed.len()
                    );
                }
            }
        }

        log::info!("refresh scheduler stopped");
    }

    /// Runs every job once, in order.
    pub async fn refresh_all(&self, cancel: &CancellationToken) -> TickReport {
        let mut report = TickReport::default();

        for job in &self.jobs {
            if cancel.is_cancelled() {
                break;
            }
            if job.policy == RefreshPolicy::UntilPopulated && self.cache.is_populated(job.slot) {
                report.skipped.push(job.slot);
                continue;
            }

            match self.refresh_slot(job, cancel).await {
                Ok(()) => {
                    log::debug!("slot {} refreshed", job.slot);
                    report.refreshed.push(job.slot);
                }
                Err(RenderError::Cancelled) => {
                    log::debug!("slot {} refresh cancelled", job.slot);
                    break;
                }
                Err(err) => {
                    log::warn!("slot {} refresh failed: {err}", job.slot);
                    report.failed.push((job.slot, err));
                }
            }
        }

        report
    }

    async fn refresh_slot(&self, job: &SlotJob, cancel: &CancellationToken) -> Result<(), RenderError> {
        let output = bounded(
            cancel,
            RenderStage::Fetch,
            self.config.fetch_timeout(),
            job.renderer.render(cancel),
        )
        .await?;

        let image = match output {
            RenderOutput::Image(image) => image,
            RenderOutput::Html(html) => {
                let rasterizer = self.rasterizer.as_ref().ok_or(RenderError::NoRasterizer)?;
                bounded(
                    cancel,
                    RenderStage::Rasterize,
                    self.config.rasterize_timeout(),
                    rasterizer.rasterize(&html, cancel),
                )
                .await?
            }
        };

        let conversion = job.conversion;
        let band = self.config.hybrid;
        let converting =
            tokio::task::spawn_blocking(move || pipeline::convert(&image, conversion, band));
        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RenderError::Cancelled),
            joined = converting => joined??,
        };

        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        self.cache.set(job.slot, bytes);
        Ok(())
    }
}

/// Runs `work` unless it outlives `after` or the token fires first.
async fn bounded<T>(
    cancel: &CancellationToken,
    stage: RenderStage,
    after: Duration,
    work: impl Future<Output = Result<T, RenderError>>,
) -> Result<T, RenderError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RenderError::Cancelled),
        result = tokio::time::timeout(after, work) => {
            result.unwrap_or(Err(RenderError::Timeout { stage, after }))
        }
    }
}
