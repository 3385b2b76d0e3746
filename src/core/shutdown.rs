//! OS termination signals for [`LifecycleController::run_until_signal`](crate::LifecycleController::run_until_signal).
//!
//! Unix: SIGINT, SIGTERM or SIGQUIT. Elsewhere: Ctrl-C.

/// Resolves on the first termination signal.
#[cfg(unix)]
pub(crate) async fn termination_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = int.recv() => "SIGINT",
        _ = term.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Resolves on the first termination signal.
#[cfg(not(unix))]
pub(crate) async fn termination_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
