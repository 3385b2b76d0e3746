//! # Example: Overlay Pipeline
//!
//! Full wiring: settings, score board, controller with the log writer,
//! router, score file watcher and auto-update ticker. Relay and operator
//! triggers are read from stdin, one per line:
//!
//! ```text
//! begin /live/main        stream published
//! end /live/main          stream unpublished (`end` alone: all streams)
//! start main [style]      manual start
//! image main bar.png      manual start over an image template
//! stop main               manual stop
//! style main world_cup    switch style now
//! set status Rain delay   score update
//! status                  publish the status list
//! ```
//!
//! Run with: `cargo run --example overlay_pipeline -- [rendervisor.toml]`.
//! Ctrl-C (or end of input) stops every renderer and exits.

use std::sync::Arc;

use rendervisor::{
    EventRouter, FfmpegRenderer, LifecycleController, ScoreBoard, ScoreFileWatcher, ScoreState,
    Settings, Subscribe, Trigger, spawn_ticker,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

fn parse(line: &str) -> Option<Trigger> {
    let mut words = line.split_whitespace();
    let verb = words.next()?;
    let first = words.next().map(str::to_owned);
    let rest = words.collect::<Vec<_>>().join(" ");
    let rest = (!rest.is_empty()).then_some(rest);

    let trigger = match verb {
        "begin" => Trigger::StreamBegin { path: first? },
        "end" => Trigger::StreamEnd { path: first },
        "start" => Trigger::ManualStart {
            key: first,
            style: rest,
        },
        "image" => Trigger::ManualImageStart {
            key: first,
            template: rest,
        },
        "stop" => Trigger::ManualStop { key: first },
        "style" => Trigger::ChangeStyle {
            key: first,
            style: rest?,
        },
        "set" => Trigger::StateChanged {
            update: ScoreState::empty().with(first?, rest.unwrap_or_default()),
        },
        "status" => Trigger::StatusRequest,
        _ => return None,
    };
    Some(trigger)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(path).await?,
        None => Settings::default(),
    };
    let board = Arc::new(ScoreBoard::load(settings.files.clone()).await?);

    #[cfg(feature = "logging")]
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(rendervisor::LogWriter)];
    #[cfg(not(feature = "logging"))]
    let subs: Vec<Arc<dyn Subscribe>> = Vec::new();

    let controller = LifecycleController::builder(settings.orchestrator)
        .with_renderer(FfmpegRenderer::new(settings.ffmpeg))
        .with_subscribers(subs)
        .build();
    let router = Arc::new(EventRouter::new(controller.clone(), Arc::clone(&board)));

    let _watcher = match &settings.files.text {
        Some(path) => Some(ScoreFileWatcher::spawn(path.clone(), Arc::clone(&router))?),
        None => None,
    };
    let _ticker = spawn_ticker(Arc::clone(&router));

    let input = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match parse(&line) {
                    Some(trigger) => match router.route(trigger).await {
                        Ok(routed) => println!("[pipeline] {routed:?}"),
                        Err(e) => println!("[pipeline] {e}"),
                    },
                    None if line.trim().is_empty() => {}
                    None => println!("[pipeline] unrecognized: {line}"),
                }
            }
        })
    };

    tokio::select! {
        res = controller.run_until_signal() => res?,
        _ = input => controller.shutdown().await,
    }
    Ok(())
}
