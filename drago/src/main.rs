use clap::Parser;
use drago::{Application, Config, config::Args, telemetry};
use tokio::signal;
use tracing::{debug, info, warn};

/// Resolves on Ctrl+C, or SIGTERM on unix. A handler that fails to install is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let received = tokio::select! {
        _ = ctrl_c => "Ctrl+C",
        _ = terminate => "SIGTERM",
    };
    info!("Received {received}, draining connections");
}

/// One line a human can check the config against when `--validate` passes.
fn describe(config: &Config) -> String {
    format!(
        "listen {}, dashboard {}, {} CORS origin(s), device codes live {}s",
        config.bind_address(),
        config.dashboard_url,
        config.auth.security.cors.allowed_origins.len(),
        config.auth.device.code_lifetime.as_secs(),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Postgres TLS and the OTLP exporter both build rustls clients
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("a rustls crypto provider was already installed"))?;

    let args = Args::parse();
    let config = Config::load(&args)?;

    if args.validate {
        println!("Configuration is valid: {}", describe(&config));
        return Ok(());
    }

    telemetry::init_telemetry(config.enable_otel_export)?;
    debug!("{:?}", args);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        migrations = drago::migrator().iter().count(),
        "Starting drago: {}",
        describe(&config)
    );

    Application::new(config).await?.serve(shutdown_signal()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_names_listen_and_dashboard() {
        let config = Config::default();
        let line = describe(&config);
        assert!(line.contains(&format!("listen {}", config.bind_address())));
        assert!(line.contains("dashboard http://localhost:5173/"));
        assert!(line.contains("1 CORS origin(s)"));
    }
}
