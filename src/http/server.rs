//! HTTP server setup and listener bootstrap.
//!
//! # Responsibilities
//! - Validate the configuration before any socket is opened
//! - Select the upstream transport once, from the target scheme
//! - Create the output directory when capture is enabled
//! - Bind localhost only and serve every path through one handler
//! - Log the startup line unless silent

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::capture;
use crate::config::{validate_config, ConfigError, ProxyConfig, Target};
use crate::http::client::UpstreamClient;
use crate::http::exchange::{raw_url, Exchange, ExchangeContext};
use crate::lifecycle::shutdown::signalled;
use crate::net::{bind_localhost, ListenerError};

/// Error type for serving.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for the capture proxy.
pub struct CaptureServer {
    router: Router,
    context: ExchangeContext,
}

impl CaptureServer {
    /// Validate `config` and prepare everything an exchange needs.
    ///
    /// Fails with a `ConfigError` on a bad scheme, capture without an output
    /// directory, TLS setup failure or an output directory that cannot be
    /// created.
    pub async fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        let target = validate_config(&config)?;
        let client = UpstreamClient::for_scheme(target.scheme, config.allow_insecure_tls)?;

        let output_directory = if config.captures() {
            let dir = config
                .output_directory
                .as_ref()
                .ok_or(ConfigError::MissingOutputDirectory)?;
            capture::ensure_dir(dir).await?;
            let dir: PathBuf = tokio::fs::canonicalize(dir).await?;
            tracing::debug!(path = %dir.display(), "Output directory ready");
            Some(Arc::new(dir))
        } else {
            None
        };

        let context = ExchangeContext {
            config: Arc::new(config),
            target: Arc::new(target),
            client,
            output_directory,
        };
        let router = Self::build_router(context.clone());

        Ok(Self { router, context })
    }

    fn build_router(context: ExchangeContext) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(context)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured port on localhost.
    pub async fn bind(&self) -> Result<TcpListener, ListenerError> {
        bind_localhost(self.context.config.port).await
    }

    /// Serve until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServeError> {
        let addr = listener.local_addr()?;
        if !self.context.config.silent {
            tracing::info!(
                address = %addr,
                target = %self.context.target.base_uri,
                "Proxy running on http://localhost:{}/ -> {}",
                addr.port(),
                self.context.target.base_uri
            );
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signalled(shutdown))
            .await?;

        tracing::debug!("HTTP server stopped");
        Ok(())
    }

    /// Bind and serve in one step.
    pub async fn listen(self, shutdown: broadcast::Receiver<()>) -> Result<(), ServeError> {
        let listener = self.bind().await?;
        self.run(listener, shutdown).await
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.context.config
    }

    pub fn target(&self) -> &Target {
        &self.context.target
    }

    /// Canonical output directory, when capturing.
    pub fn output_directory(&self) -> Option<&std::path::Path> {
        self.context.output_directory.as_deref().map(|p| p.as_path())
    }
}

/// Every inbound request, whatever its path, becomes one exchange.
async fn proxy_handler(State(context): State<ExchangeContext>, request: Request<Body>) -> Response {
    let exchange = Exchange::new(raw_url(request.uri()));
    let span = tracing::debug_span!(
        "exchange",
        id = %exchange.id(),
        method = %request.method(),
        url = %raw_url(request.uri()),
    );
    exchange.run(&context, request).instrument(span).await
}
