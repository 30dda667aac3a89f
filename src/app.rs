use crate::config::Config;
use crate::state::AppState;
use crate::web::create_router;
use anyhow::Context;
use figment::{Figment, providers::Env};
use std::net::SocketAddr;
use std::process::ExitCode;
use tracing::{error, info};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
}

impl App {
    /// Create a new App instance with all necessary components initialized
    pub async fn new() -> Result<Self, anyhow::Error> {
        let config: Config = Figment::new()
            .merge(Env::raw())
            .extract()
            .context("Failed to load config")?;

        let app_state = AppState::new(config.clone());

        // Background sweep for sessions whose CAPTCHA was never submitted
        app_state.sessions.spawn_sweeper(config.session_timeout());
        info!(
            timeout_secs = config.session_timeout_secs,
            "Session sweeper started"
        );

        Ok(App { config, app_state })
    }

    /// Run the web server until a shutdown signal arrives.
    pub async fn run(self) -> ExitCode {
        let router = create_router(self.app_state);
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));

        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, %addr, "Failed to bind listener");
                return ExitCode::FAILURE;
            }
        };

        info!(%addr, webdriver = %self.config.webdriver_url, "Web server listening");

        let serve = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal());

        if let Err(e) = serve.await {
            error!(error = %e, "Server error");
            return ExitCode::FAILURE;
        }

        info!("Shutdown complete");
        ExitCode::SUCCESS
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
