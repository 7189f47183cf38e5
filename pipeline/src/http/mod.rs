//! In-process stand-ins for the external services.
//!
//! An axum server that speaks the classification, risk and ingestion HTTP
//! contracts, backed by scripted [`LocalServices`]. Used by the integration
//! tests and for running the pipeline without the real model service.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  HttpGateway (reqwest)                                    │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │ HTTP
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Stub router (axum handlers)                              │
//! │  - multipart / JSON parsing, image MIME check             │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  LocalServices (scripted responses, delays, failures)     │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::StubState;

use anyhow::Context;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::remote::LocalServices;

/// A running stub server. Shuts down when dropped.
pub struct StubServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl StubServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Configuration pointing all three endpoints at this server.
    pub fn config(&self) -> PipelineConfig {
        PipelineConfig::for_base_url(&self.base_url())
    }

    /// Stop accepting connections and wait for the server task to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "stub server task failed");
            }
        }
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Serve `services` on an ephemeral port of 127.0.0.1.
pub async fn serve_stub(services: LocalServices) -> anyhow::Result<StubServer> {
    serve_stub_on(services, SocketAddr::from(([127, 0, 0, 1], 0))).await
}

/// Serve `services` on `addr`.
pub async fn serve_stub_on(services: LocalServices, addr: SocketAddr) -> anyhow::Result<StubServer> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind stub server to {}", addr))?;
    let addr = listener
        .local_addr()
        .context("failed to read stub server address")?;

    let app = create_router(StubState::new(services));
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();

    let handle = tokio::spawn(async move {
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.cancelled().await });
        if let Err(e) = server.await {
            warn!(error = %e, "stub server stopped with error");
        }
    });

    info!(%addr, "stub services listening");
    Ok(StubServer {
        addr,
        shutdown,
        handle: Some(handle),
    })
}
