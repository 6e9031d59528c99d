use beanweb::config::Config;
use beanweb::{logger, EchoHandler, WebServer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Config file path without extension, e.g. "beanweb" for beanweb.toml
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "beanweb".to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg.logging);

    let server = WebServer::from_config(&cfg, EchoHandler)?;
    server.start()?;

    wait_for_shutdown_signal()?;
    server.close()?;
    Ok(())
}

/// Block until SIGTERM or Ctrl+C.
///
/// Uses its own small runtime; the server runtime stays private to `WebServer`.
fn wait_for_shutdown_signal() -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = signal(SignalKind::terminate())?;
            tokio::select! {
                res = tokio::signal::ctrl_c() => res?,
                _ = sigterm.recv() => {}
            }
        }

        #[cfg(not(unix))]
        tokio::signal::ctrl_c().await?;

        tracing::info!("Shutdown signal received");
        Ok::<(), std::io::Error>(())
    })
}
