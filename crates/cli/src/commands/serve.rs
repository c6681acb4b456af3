//! Serve command handler.
//!
//! Runs the HTTP query API until interrupted.

use crate::server;
use anyhow::Context;
use clap::Args;
use incidex_core::config::AppConfig;
use incidex_retrieval::QueryService;
use std::net::SocketAddr;
use std::sync::Arc;

/// Serve the HTTP query API
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to bind (host:port); defaults to the configured address
    #[arg(short, long, env = "INCIDEX_BIND")]
    pub bind: Option<String>,

    /// Defer loading the vector store until the first query
    #[arg(long)]
    pub lazy: bool,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing serve command");

        let service = Arc::new(QueryService::from_config(config)?);

        if !self.lazy {
            // A failed load leaves the server up; /health reports it.
            if let Err(e) = service.retriever().ensure_loaded().await {
                tracing::error!(
                    error_class = e.kind(),
                    "Vector store not loaded, serving in not-ready state: {}",
                    e
                );
            }
        }

        let bind = self.bind.as_deref().unwrap_or(&config.bind);
        let addr: SocketAddr = bind
            .parse()
            .with_context(|| format!("invalid bind address {}", bind))?;

        let app = server::router(service);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        tracing::info!("Listening on http://{}", addr);
        println!("incidex listening on http://{addr}");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server shutdown")?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
