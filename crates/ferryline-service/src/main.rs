use ferryline_service::{
    AppState,
    backend::{self, BackendUrl},
    config::Config,
    create_app,
};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing
    let filter = match "ferryline_service=debug".parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env().unwrap_or_else(|err| {
        error!(error = %err, "Invalid configuration");
        std::process::exit(1);
    });

    match &config.backend {
        BackendUrl::Hosted(_) => match backend::hosted_state(&config) {
            Ok(state) => serve(state, &config).await,
            Err(err) => {
                error!(error = %err, "Failed to set up hosted backend");
                std::process::exit(1);
            }
        },
        BackendUrl::Sqlite(_) => match backend::local_state(&config) {
            Ok(state) => serve(state, &config).await,
            Err(err) => {
                error!(error = %err, "Failed to set up SQLite backend");
                std::process::exit(1);
            }
        },
    }
}

async fn serve<S: AppState>(state: S, config: &Config) {
    let session = state.session().clone();
    tokio::spawn(async move { session.restore().await });

    let app = create_app(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(config.request_timeout)),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .unwrap_or_else(|err| {
            error!(bind_address = %config.bind_address, error = %err, "Failed to bind to address");
            std::process::exit(1);
        });

    info!(bind_address = %config.bind_address, "Server running");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    if let Err(err) = server.await {
        error!(error = %err, "Server error");
        std::process::exit(1);
    }
    info!("Graceful shutdown completed");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, finishing in-flight requests");
}
