//! OS signal handling.
//!
//! SIGINT (Ctrl+C) everywhere, SIGTERM on unix. Either one starts a
//! graceful shutdown.

/// Resolves when the process is asked to stop.
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            res = ctrl_c => res.map(|_| "SIGINT"),
            _ = term.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.map(|_| "SIGINT")
    }
}
