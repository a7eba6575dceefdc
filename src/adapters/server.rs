use std::sync::Arc;

use axum::Router;
use eyre::{Result, WrapErr};
use tokio::net::TcpListener;

use crate::{
    adapters::http_handler::HttpHandler, config::models::AdapterConfig,
    utils::graceful_shutdown::ShutdownToken,
};

/// One listening socket serving one adapter's router.
pub struct AdapterServer {
    name: String,
    addr: String,
    router: Router,
}

impl AdapterServer {
    pub fn new(adapter: &AdapterConfig, handler: Arc<HttpHandler>, bind_host: &str) -> Self {
        for path in handler.endpoints().paths() {
            tracing::info!(adapter = %adapter.display_name(), "Configured endpoint: {}", path);
        }

        Self {
            name: adapter.display_name(),
            addr: format!("{bind_host}:{}", adapter.port),
            router: handler.router(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Bind the configured address and serve until `shutdown` fires.
    pub async fn run(self, shutdown: ShutdownToken) -> Result<()> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .wrap_err_with(|| format!("Failed to bind adapter '{}' to {}", self.name, self.addr))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` fires.
    pub async fn serve(self, listener: TcpListener, mut shutdown: ShutdownToken) -> Result<()> {
        let local_addr = listener
            .local_addr()
            .wrap_err("Failed to get local addr")?;
        tracing::info!(adapter = %self.name, "Adapter listening on {}", local_addr);

        let name = self.name;
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let reason = shutdown.wait_for_shutdown().await;
                tracing::info!("Stopping adapter after {:?} shutdown", reason);
            })
            .await
            .wrap_err_with(|| format!("Adapter '{name}' server error"))?;

        tracing::info!(adapter = %name, "Adapter stopped");
        Ok(())
    }
}
