// THEORY:
// The composition root for the dashboard server. It owns the two pieces of
// shared state (the image cache and the dispatcher), wires the configured
// collaborators into a refresh scheduler, and exposes the cache over HTTP:
//
//   GET /{slot}.bmp      latest bitmap for that slot, or 503 until it exists
//   GET /dashboard.bmp   whatever the dispatcher picks for the current local time
//   GET /healthz         liveness
//
// Handlers only ever read the cache; they never render. A slow browser can delay
// a refresh but never a request.

pub mod collaborators;
pub mod config;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use home_dashboard::core_modules::dispatcher::DispatchError;
use home_dashboard::{
    DispatchConfig, Dispatcher, ImageCache, RefreshScheduler, Slot, SlotJob, TimeOfDay,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::collaborators::{HeadlessBrowser, renderer_for};
use crate::config::DashboardConfig;

pub const NOT_READY: &str = "image not ready";

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ImageCache>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(cache: Arc<ImageCache>, dispatch: &DispatchConfig) -> Result<Self, DispatchError> {
        Ok(Self {
            cache,
            dispatcher: Arc::new(Dispatcher::new(dispatch)?),
        })
    }
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/dashboard.bmp", get(dashboard));

    for slot in Slot::ALL {
        router = router.route(
            &format!("/{slot}.bmp"),
            get(move |State(state): State<AppState>| async move {
                cached_response(&state.cache, slot)
            }),
        );
    }

    router.with_state(state)
}

async fn dashboard(State(state): State<AppState>) -> Response {
    dashboard_at(&state, TimeOfDay::of(&chrono::Local::now()))
}

/// Dispatches for `now` and serves the chosen slot. The rotation advances even
/// when that slot turns out to be empty.
pub fn dashboard_at(state: &AppState, now: TimeOfDay) -> Response {
    let slot = state.dispatcher.dispatch(now);
    log::debug!("dashboard at {now} resolved to {slot}");
    cached_response(&state.cache, slot)
}

/// The slot's bitmap with its headers, or 503 if the slot was never populated.
pub fn cached_response(cache: &ImageCache, slot: Slot) -> Response {
    let Some(artifact) = cache.get(slot) else {
        return (StatusCode::SERVICE_UNAVAILABLE, NOT_READY).into_response();
    };

    let body: Bytes = artifact.bytes;
    (
        [
            (header::CONTENT_TYPE, "image/bmp".to_string()),
            (header::CONTENT_LENGTH, body.len().to_string()),
            (header::LAST_MODIFIED, http_date(artifact.updated_at)),
        ],
        body,
    )
        .into_response()
}

/// IMF-fixdate, as HTTP wants it.
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// One job per configured slot, in config order, with the headless browser as
/// the rasterizer for HTML sources.
pub fn build_scheduler(config: &DashboardConfig, cache: Arc<ImageCache>) -> RefreshScheduler {
    let browser = HeadlessBrowser::new(config.browser.clone());
    let mut scheduler = RefreshScheduler::new(cache, config.refresh).with_rasterizer(Arc::new(browser));

    for slot in &config.slots {
        scheduler.register(SlotJob {
            slot: slot.slot,
            renderer: renderer_for(&slot.source, &config.browser),
            conversion: slot.conversion,
            policy: slot.policy,
        });
    }
    scheduler
}

/// Binds `bind_addr` and serves until `cancel` fires, then drains in-flight
/// requests and exits.
pub async fn start_server(
    state: AppState,
    bind_addr: &str,
    cancel: CancellationToken,
) -> anyhow::Result<JoinHandle<()>> {
    use anyhow::Context as _;

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    let local_addr = listener.local_addr()?;
    let app = router(state);

    let server = tokio::spawn(async move {
        log::info!("Dashboard server listening on http://{local_addr}");
        let shutdown = async move { cancel.cancelled().await };
        if let Err(err) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            log::error!("Dashboard server failed: {err}");
        }
        log::info!("Dashboard server stopped");
    });

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    async fn body_of(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body")
    }

    fn state() -> AppState {
        AppState::new(Arc::new(ImageCache::new()), &DispatchConfig::default()).expect("state")
    }

    #[tokio::test]
    async fn unpopulated_slots_are_503() {
        let state = state();
        let response = cached_response(&state.cache, Slot::Weather);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_of(response).await.as_ref(), NOT_READY.as_bytes());
    }

    #[tokio::test]
    async fn populated_slots_are_served_as_bmp() {
        let state = state();
        state.cache.set(Slot::Quote, b"BM-fake-bitmap".to_vec());
        let updated_at = state.cache.get(Slot::Quote).expect("populated").updated_at;

        let response = cached_response(&state.cache, Slot::Quote);
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "image/bmp");
        assert_eq!(headers[header::CONTENT_LENGTH], "14");
        assert_eq!(
            headers[header::LAST_MODIFIED].to_str().expect("ascii"),
            http_date(updated_at)
        );
        assert_eq!(body_of(response).await.as_ref(), b"BM-fake-bitmap");
    }

    #[test]
    fn http_dates_use_the_imf_fixdate_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 7, 9, 2).single().expect("valid date");
        assert_eq!(http_date(at), "Tue, 05 Mar 2024 07:09:02 GMT");
    }

    #[tokio::test]
    async fn dashboard_follows_the_dispatcher() {
        let app = state();
        for slot in Slot::ALL {
            app.cache.set(slot, slot.as_str().as_bytes().to_vec());
        }

        let commute = body_of(dashboard_at(&app, TimeOfDay::new(7, 20))).await;
        assert_eq!(commute.as_ref(), b"transport");

        let noon = TimeOfDay::new(12, 0);
        let first = body_of(dashboard_at(&app, noon)).await;
        let second = body_of(dashboard_at(&app, noon)).await;
        assert_eq!(first.as_ref(), b"weather");
        assert_eq!(second.as_ref(), b"quote");
        assert_eq!(app.dispatcher.rotation_index(), 2);
    }

    #[tokio::test]
    async fn dashboard_advances_the_rotation_even_when_unpopulated() {
        let app = state();
        let response = dashboard_at(&app, TimeOfDay::new(18, 0));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(app.dispatcher.rotation_index(), 1);
    }

    #[test]
    fn default_config_schedules_every_slot() {
        let config = DashboardConfig::default();
        let scheduler = build_scheduler(&config, Arc::new(ImageCache::new()));
        let slots: Vec<Slot> = scheduler.jobs().iter().map(|job| job.slot).collect();
        assert_eq!(slots.len(), Slot::COUNT);
        for slot in Slot::ALL {
            assert!(slots.contains(&slot), "{slot} missing");
        }
    }

    #[tokio::test]
    async fn server_shuts_down_when_cancelled() {
        let cancel = CancellationToken::new();
        let handle = start_server(state(), "127.0.0.1:0", cancel.clone())
            .await
            .expect("bind");
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("server stops")
            .expect("server task");
    }
}
