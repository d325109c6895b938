use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use home_dashboard::ImageCache;
use home_dashboard_server::config::DashboardConfig;
use home_dashboard_server::{AppState, build_scheduler, start_server};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "home_dashboard_server", version, about = "Serves e-paper dashboard bitmaps")]
struct Args {
    /// Config file (falls back to $HOME_DASHBOARD_CONFIG, then ./dashboard.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overriding `[server] bind_addr`
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = DashboardConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }

    let cache = Arc::new(ImageCache::new());
    let state = AppState::new(Arc::clone(&cache), &config.dispatch)?;
    let cancel = CancellationToken::new();

    let scheduler = build_scheduler(&config, cache).spawn(cancel.clone());
    let server = start_server(state, &config.server.bind_addr, cancel.clone()).await?;

    tokio::signal::ctrl_c().await?;
    log::info!("Shutdown requested");
    cancel.cancel();

    let (scheduler, server) = tokio::join!(scheduler, server);
    scheduler?;
    server?;
    Ok(())
}
