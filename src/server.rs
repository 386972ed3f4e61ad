//! Startup sequence and the top-level supervisor.
//!
//! Order is fixed: build the router, connect to the database, bind, serve.
//! The listener is never bound unless the database answered first.

use std::{future::Future, io, net::SocketAddr, path::Path, sync::Arc};

use axum::{Router, extract::DefaultBodyLimit};
use thiserror::Error;
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::info;

use crate::auth;
use crate::config::{Config, RuntimeMode};
use crate::constants::*;
use crate::database::{Connector, UserStore};
use crate::token::TokenKeys;

#[derive(Clone)]
pub struct AppState<S> {
    pub users: S,
    pub tokens: Arc<TokenKeys>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("MongoDB connection error: {0:#}")]
    Database(anyhow::Error),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

/// Assembles middleware and routes. State is attached after the database
/// connection exists.
pub fn build_router<S>(static_dir: &Path) -> Router<AppState<S>>
where
    S: UserStore + Clone + Sync + 'static,
{
    Router::new()
        .nest(AUTH_BASE_PATH, auth::router::<S>())
        .route_service("/", ServeFile::new(static_dir.join(INDEX_FILE)))
        .fallback_service(ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub fn listen_banner(port: u16) -> String {
    format!("Server running on http://localhost:{}", port)
}

/// A connected, bound server that has not started accepting yet.
pub struct Server {
    listener: TcpListener,
    app: Router,
    mode: RuntimeMode,
}

impl Server {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn serve<F>(self, shutdown: F) -> Result<(), BootstrapError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr().map_err(BootstrapError::Serve)?;
        info!("{}", listen_banner(addr.port()));
        info!("Environment: {}", self.mode);

        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(BootstrapError::Serve)
    }
}

/// Runs startup up to the bind. A failed connection returns before any port
/// is opened.
pub async fn start<C>(
    config: &Config,
    connector: &C,
    static_dir: impl AsRef<Path>,
) -> Result<Server, BootstrapError>
where
    C: Connector,
{
    let app = build_router::<C::Store>(static_dir.as_ref());

    let users = connector
        .connect(&config.mongo_uri)
        .await
        .map_err(BootstrapError::Database)?;
    info!("Connected to MongoDB");

    let state = AppState {
        users,
        tokens: Arc::new(TokenKeys::new(&config.jwt_secret)),
    };

    let addr = config.bind_address();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| BootstrapError::Bind { addr, source })?;

    Ok(Server {
        listener,
        app: app.with_state(state),
        mode: config.node_env,
    })
}

/// Supervisor entry: every startup or serve failure comes back here as an
/// error for `main` to turn into a non-zero exit.
pub async fn run<C>(config: Config, connector: C) -> Result<(), BootstrapError>
where
    C: Connector,
{
    let server = start(&config, &connector, STATIC_DIR).await?;
    server.serve(shutdown_signal()).await?;
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
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
}
