//! Upstream HTTP client.
//!
//! # Responsibilities
//! - Pick the transport once: plain TCP for `http`, rustls for `https`
//! - Honour the insecure-TLS switch
//!
//! # Design Decisions
//! - No pooling: every exchange opens its own upstream connection
//! - HTTP/1.1 only towards the upstream

use axum::body::Body;
use axum::http::{Request, Response};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::{Client, Error as ClientError};
use hyper_util::rt::TokioExecutor;

use crate::config::{ConfigError, Scheme};
use crate::http::tls::insecure_client_config;

/// The client used for every upstream request.
#[derive(Clone)]
pub enum UpstreamClient {
    Plain(Client<HttpConnector, Body>),
    Tls(Client<HttpsConnector<HttpConnector>, Body>),
}

impl UpstreamClient {
    /// Build the client for `scheme`.
    pub fn for_scheme(scheme: Scheme, allow_insecure_tls: bool) -> Result<Self, ConfigError> {
        let builder = || {
            let mut builder = Client::builder(TokioExecutor::new());
            builder.pool_max_idle_per_host(0);
            builder
        };

        match scheme {
            Scheme::Http => Ok(UpstreamClient::Plain(builder().build(HttpConnector::new()))),
            Scheme::Https => {
                let mut http = HttpConnector::new();
                http.enforce_http(false);

                let tls = hyper_rustls::HttpsConnectorBuilder::new();
                let tls = if allow_insecure_tls {
                    tracing::warn!("Upstream TLS certificate verification disabled");
                    tls.with_tls_config(insecure_client_config())
                } else {
                    tls.with_native_roots()
                        .map_err(|e| ConfigError::Tls(e.to_string()))?
                };
                let connector = tls.https_only().enable_http1().wrap_connector(http);

                Ok(UpstreamClient::Tls(builder().build(connector)))
            }
        }
    }

    /// Send a request and wait for the response head.
    pub async fn request(&self, request: Request<Body>) -> Result<Response<Incoming>, ClientError> {
        match self {
            UpstreamClient::Plain(client) => client.request(request).await,
            UpstreamClient::Tls(client) => client.request(request).await,
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, UpstreamClient::Tls(_))
    }
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamClient::Plain(_) => f.write_str("UpstreamClient::Plain"),
            UpstreamClient::Tls(_) => f.write_str("UpstreamClient::Tls"),
        }
    }
}
