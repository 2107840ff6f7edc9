//! Transcript replay.
//!
//! # Data Flow
//! ```text
//! Transcript bytes
//!     → parser.rs (request line, headers, raw body)
//!     → URL resolution (relative URLs against http://localhost)
//!     → http::client (plain or TLS by the URL's scheme)
//!     → response streamed to the caller's writer
//! ```

pub mod parser;

pub use parser::{parse_request, ParseError, ParsedRequest};

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{Method, Request, StatusCode, Version};
use http_body_util::BodyExt;
use hyper::ext::ReasonPhrase;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::capture::transcript::{render_request_head, render_response_head};
use crate::config::{ConfigError, Scheme};
use crate::http::exchange::error_chain;
use crate::http::{HeaderList, UpstreamClient};

const RELATIVE_BASE: &str = "http://localhost";

/// Switches for a single replay.
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Skip upstream certificate verification.
    pub insecure: bool,
    /// Echo the request before sending it.
    pub verbose: bool,
    /// Write the response status line and headers before the body.
    pub include_headers: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid method `{0}`")]
    InvalidMethod(String),

    #[error("invalid header `{name}`")]
    InvalidHeader { name: String },

    #[error(transparent)]
    Client(#[from] ConfigError),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolve a transcript URL. Relative URLs are taken against `http://localhost`.
pub fn resolve_url(raw: &str) -> Result<Url, ReplayError> {
    let invalid = |e: url::ParseError| ReplayError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    };

    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(RELATIVE_BASE)
            .and_then(|base| base.join(raw))
            .map_err(invalid),
        Err(e) => Err(invalid(e)),
    }
}

/// Re-issue the request captured in `payload` and stream the response body
/// to `out`. Returns the upstream status.
pub async fn replay<W>(
    payload: &[u8],
    options: &ReplayOptions,
    out: &mut W,
) -> Result<StatusCode, ReplayError>
where
    W: AsyncWrite + Unpin,
{
    let parsed = parse_request(payload)?;
    let mut url = resolve_url(&parsed.url)?;
    url.set_fragment(None);

    let scheme = match url.scheme() {
        "http" => Scheme::Http,
        "https" => Scheme::Https,
        other => return Err(ConfigError::UnsupportedScheme(other.to_string()).into()),
    };

    let method = Method::from_bytes(parsed.method.as_bytes())
        .map_err(|_| ReplayError::InvalidMethod(parsed.method.clone()))?;
    let version = match parsed.http_version.as_str() {
        "1.0" => Version::HTTP_10,
        _ => Version::HTTP_11,
    };
    let headers = header_list(&parsed)?;

    if options.verbose {
        out.write_all(&render_request_head(&method, url.as_str(), version, &headers))
            .await?;
        if !parsed.body.is_empty() {
            out.write_all(&parsed.body).await?;
            out.write_all(b"\r\n").await?;
        }
        out.flush().await?;
    }

    let mut request = Request::builder()
        .method(method)
        .uri(url.as_str())
        .body(Body::from(parsed.body.clone()))
        .map_err(|e| ReplayError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    *request.headers_mut() = headers.to_header_map();

    let client = UpstreamClient::for_scheme(scheme, options.insecure)?;
    tracing::debug!(url = %url, "Replaying request");
    let response = client
        .request(request)
        .await
        .map_err(|e| ReplayError::Request(error_chain(&e)))?;

    let status = response.status();
    if options.include_headers {
        let reason = response
            .extensions()
            .get::<ReasonPhrase>()
            .map(|r| r.as_bytes())
            .or_else(|| status.canonical_reason().map(str::as_bytes));
        let head = render_response_head(
            response.version(),
            status,
            reason,
            &HeaderList::from(response.headers()),
        );
        out.write_all(&head).await?;
    }

    let mut body = response.into_body();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| ReplayError::Request(error_chain(&e)))?;
        if let Ok(data) = frame.into_data() {
            out.write_all(&data).await?;
        }
    }
    out.flush().await?;

    Ok(status)
}

fn header_list(parsed: &ParsedRequest) -> Result<HeaderList, ReplayError> {
    let mut headers = HeaderList::new();
    for (name, value) in &parsed.headers {
        let invalid = || ReplayError::InvalidHeader { name: name.clone() };
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        headers.append(name, value);
    }
    Ok(headers)
}
