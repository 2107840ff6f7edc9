//! Inbound TCP listener.
//!
//! # Responsibilities
//! - Bind the configured port on `localhost` only
//! - Report the bound address (port 0 picks an ephemeral one)

use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to the port.
    Bind { port: u16, source: std::io::Error },
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind { port, source } => {
                write!(f, "Failed to bind localhost:{}: {}", port, source)
            }
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind { source, .. } => Some(source),
        }
    }
}

/// Bind `localhost:<port>`. Never listens on all interfaces.
pub async fn bind_localhost(port: u16) -> Result<TcpListener, ListenerError> {
    let listener = TcpListener::bind(("localhost", port))
        .await
        .map_err(|source| ListenerError::Bind { port, source })?;

    let local_addr: SocketAddr = listener
        .local_addr()
        .map_err(|source| ListenerError::Bind { port, source })?;

    tracing::debug!(address = %local_addr, "Listener bound");
    Ok(listener)
}
