//! Framecast server listener
//!
//! Binds the TCP listener and serves the router until shutdown.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::error::Result;
use crate::pipeline::StreamController;
use crate::server::config::ServerConfig;
use crate::server::routes::{build_router, AppState};

/// HTTP/WebSocket front end for a [`StreamController`]
pub struct FramecastServer {
    config: ServerConfig,
    controller: StreamController,
}

impl FramecastServer {
    /// Create a new server with the given configuration and controller
    pub fn new(config: ServerConfig, controller: StreamController) -> Self {
        Self { config, controller }
    }

    pub fn controller(&self) -> &StreamController {
        &self.controller
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    ///
    /// When `shutdown` resolves, open WebSocket subscribers are told to close
    /// and the stream is stopped once the listener has drained.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Framecast server listening");

        let (closing_tx, closing_rx) = watch::channel(false);
        let state = AppState::new(
            self.controller.clone(),
            self.config.max_connections,
            closing_rx,
        );
        let app = build_router(state);

        let signal = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            let _ = closing_tx.send(true);
        };

        let served = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await;

        self.controller.shutdown().await;

        served?;
        Ok(())
    }
}
