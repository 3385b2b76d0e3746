//! # Example: Keyed Restarts
//!
//! Drives the controller directly with `sleep` standing in for ffmpeg:
//! duplicate starts are ignored, a burst of restarts collapses into one,
//! and a stop cancels a pending restart.
//!
//! Run with: `RUST_LOG=debug cargo run --example keyed_restarts` (unix only).

use std::{sync::Arc, time::Duration};

use rendervisor::{
    CommandRenderer, Config, LifecycleController, RenderParams, ScoreState, StreamKey, Subscribe,
    score,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = Config {
        grace: Duration::from_millis(500),
        debounce: Duration::from_millis(300),
        ..Config::default()
    };

    #[cfg(feature = "logging")]
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(rendervisor::LogWriter)];
    #[cfg(not(feature = "logging"))]
    let subs: Vec<Arc<dyn Subscribe>> = Vec::new();

    let ctl = LifecycleController::builder(cfg)
        .with_renderer(CommandRenderer::new("sleep", ["3600"]))
        .with_subscribers(subs)
        .build();

    let a = StreamKey::new("cam-a")?;
    let b = StreamKey::new("cam-b")?;
    let state = ScoreState::default();

    println!("[demo] start cam-a twice, cam-b once");
    let first = ctl.start(&a, RenderParams::from_state(state.clone())).await?;
    let second = ctl.start(&a, RenderParams::from_state(state.clone())).await?;
    ctl.start(&b, RenderParams::from_state(state.clone())).await?;
    println!("[demo] cam-a: first={first} second={second}");

    println!("[demo] five score updates in a burst");
    for runs in 246..251 {
        let update = state.clone().with(score::TEAM1_SCORE, format!("{runs}/4"));
        ctl.restart_all(RenderParams::from_state(update), ctl.config().debounce)
            .await?;
    }

    println!("[demo] stop cam-b before its restart fires");
    ctl.stop(&b).await?;

    tokio::time::sleep(Duration::from_secs(1)).await;
    for rec in ctl.snapshot().await {
        println!(
            "[demo] {} generation={} state={:?} pid={:?}",
            rec.key, rec.generation, rec.state, rec.pid
        );
    }

    ctl.shutdown().await;
    println!("[demo] shutdown complete");
    Ok(())
}
