//! One inbound-request-to-upstream-response cycle.
//!
//! # State Machine
//! ```text
//! ReceivingRequest → Forwarding → AwaitingUpstream → RelayingResponse → Done
//!                         │               │
//!                         └───────────────┴──────────▶ Errored
//! ```
//!
//! # Responsibilities
//! - Build the outbound request from the inbound one
//! - Open request/response transcripts and fan bodies out into them
//! - Mirror the upstream status and headers onto the client response
//! - Synthesize the 500 diagnostic response when the upstream fails
//! - Reach `Done` only after the response body ended and transcripts closed

use axum::body::Body;
use axum::http::{header, request, HeaderValue, Method, Request, Response, StatusCode, Version};
use axum::response::IntoResponse;
use hyper::body::Incoming;
use hyper::ext::ReasonPhrase;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::capture::{self, fan_out, transcript, FanOutcome, TranscriptKind, TranscriptTask};
use crate::config::{ProxyConfig, Target};
use crate::http::client::UpstreamClient;
use crate::http::headers::{outbound_headers, HeaderList};

/// Lifecycle of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    ReceivingRequest,
    Forwarding,
    AwaitingUpstream,
    RelayingResponse,
    Done,
    Errored,
}

impl ExchangeState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: ExchangeState) -> bool {
        use ExchangeState::*;
        matches!(
            (self, next),
            (ReceivingRequest, Forwarding)
                | (Forwarding, AwaitingUpstream)
                | (Forwarding, Errored)
                | (AwaitingUpstream, RelayingResponse)
                | (AwaitingUpstream, Errored)
                | (RelayingResponse, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExchangeState::Done | ExchangeState::Errored)
    }
}

/// The view of the upstream request reported back on failure.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundRequestSpec {
    pub hostname: String,
    pub port: u16,
    #[serde(serialize_with = "serialize_method")]
    pub method: Method,
    pub path: String,
    pub headers: HeaderList,
    pub tls_verification: bool,
}

fn serialize_method<S: serde::Serializer>(method: &Method, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(method.as_str())
}

impl OutboundRequestSpec {
    /// Derive the outbound view of an inbound request.
    pub fn from_inbound(parts: &request::Parts, target: &Target, config: &ProxyConfig) -> Self {
        Self {
            hostname: target.hostname.clone(),
            port: target.effective_port(),
            method: parts.method.clone(),
            path: capture::combine([target.base_path.as_str(), raw_url(&parts.uri)]),
            headers: outbound_headers(&parts.headers, target, config.pass_through_compression),
            tls_verification: !config.allow_insecure_tls,
        }
    }

    /// Absolute URI the upstream client connects to.
    pub fn uri(&self, target: &Target) -> String {
        format!("{}://{}{}", target.scheme, target.host_header(), self.path)
    }
}

/// Path and query of an inbound request, as the client sent it.
pub fn raw_url(uri: &axum::http::Uri) -> &str {
    uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
}

/// Methods that forward no request body.
pub fn expects_body(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::DELETE | Method::OPTIONS | Method::TRACE
    )
}

/// Shared, read-only context every exchange runs against.
#[derive(Debug, Clone)]
pub struct ExchangeContext {
    pub config: Arc<ProxyConfig>,
    pub target: Arc<Target>,
    pub client: UpstreamClient,
    /// Canonical output directory, present when capturing.
    pub output_directory: Option<Arc<PathBuf>>,
}

impl ExchangeContext {
    fn transcript_dir(&self, kind: TranscriptKind) -> Option<&Path> {
        let enabled = match kind {
            TranscriptKind::Request => self.config.capture_requests,
            TranscriptKind::Response => self.config.capture_responses,
        };
        if enabled {
            self.output_directory.as_deref().map(|p| p.as_path())
        } else {
            None
        }
    }
}

/// Per-request state. Owned by exactly one handler invocation.
#[derive(Debug)]
pub struct Exchange {
    id: Uuid,
    state: ExchangeState,
    request_url: String,
    request_path: String,
    started_millis: u128,
}

impl Exchange {
    pub fn new(request_path: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: ExchangeState::ReceivingRequest,
            request_url: String::new(),
            request_path: request_path.to_string(),
            started_millis: capture::filename::unix_millis(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    fn advance(&mut self, next: ExchangeState) {
        if !self.state.can_advance_to(next) {
            tracing::warn!(exchange_id = %self.id, from = ?self.state, to = ?next, "Unexpected exchange transition");
        }
        tracing::debug!(exchange_id = %self.id, from = ?self.state, to = ?next, "Exchange transition");
        self.state = next;
    }

    fn transcript_path(&self, dir: &Path, kind: TranscriptKind) -> PathBuf {
        capture::allocate_at(dir, &self.request_path, kind, self.started_millis)
    }

    /// Drive the exchange up to the point the response head is known.
    ///
    /// The returned response streams the upstream body; the remaining
    /// bookkeeping runs in a detached task that ends the exchange.
    pub async fn run(mut self, ctx: &ExchangeContext, request: Request<Body>) -> Response<Body> {
        let (parts, body) = request.into_parts();
        let spec = OutboundRequestSpec::from_inbound(&parts, &ctx.target, &ctx.config);
        self.request_url = capture::combine([ctx.target.base_uri.as_str(), raw_url(&parts.uri)]);
        self.advance(ExchangeState::Forwarding);

        let request_sink = ctx.transcript_dir(TranscriptKind::Request).map(|dir| {
            let head = transcript::render_request_head(
                &parts.method,
                &self.request_url,
                parts.version,
                &spec.headers,
            );
            transcript::open(self.transcript_path(dir, TranscriptKind::Request), head)
        });
        let (request_sink, request_task) = match request_sink {
            Some((sink, task)) => (Some(sink), Some(task)),
            None => (None, None),
        };

        let forwards_body = expects_body(&parts.method);
        let outbound_body = if forwards_body {
            Body::new(fan_out(body, request_sink).0)
        } else {
            // the request transcript is complete once its head is written
            drop(request_sink);
            Body::empty()
        };

        let outbound = match build_request(&spec, &ctx.target, outbound_body, forwards_body) {
            Ok(req) => req,
            Err(e) => {
                self.advance(ExchangeState::Errored);
                return self.fail(ctx, &spec, &e, request_task);
            }
        };

        self.advance(ExchangeState::AwaitingUpstream);
        match ctx.client.request(outbound).await {
            Ok(response) => {
                self.advance(ExchangeState::RelayingResponse);
                self.relay(ctx, response, request_task)
            }
            Err(e) => {
                self.advance(ExchangeState::Errored);
                self.fail(ctx, &spec, &e, request_task)
            }
        }
    }

    fn relay(
        self,
        ctx: &ExchangeContext,
        response: Response<Incoming>,
        request_task: Option<TranscriptTask>,
    ) -> Response<Body> {
        let (parts, body) = response.into_parts();

        if !ctx.config.silent {
            tracing::info!(
                exchange_id = %self.id,
                status = parts.status.as_u16(),
                "{} - {}",
                parts.status.as_u16(),
                self.request_url
            );
        }

        let response_sink = ctx.transcript_dir(TranscriptKind::Response).map(|dir| {
            let reason = parts.extensions.get::<ReasonPhrase>().map(|r| r.as_bytes());
            let head = transcript::render_response_head(
                parts.version,
                parts.status,
                reason,
                &HeaderList::from(&parts.headers),
            );
            transcript::open(self.transcript_path(dir, TranscriptKind::Response), head)
        });
        let (response_sink, response_task) = match response_sink {
            Some((sink, task)) => (Some(sink), Some(task)),
            None => (None, None),
        };

        let (body, pump) = fan_out(body, response_sink);
        tokio::spawn(self.complete(Some(pump), request_task, response_task));

        Response::from_parts(parts, Body::new(body))
    }

    fn fail(
        self,
        ctx: &ExchangeContext,
        spec: &OutboundRequestSpec,
        error: &(dyn std::error::Error + 'static),
        request_task: Option<TranscriptTask>,
    ) -> Response<Body> {
        let detail = error_chain(error);
        if !ctx.config.silent {
            tracing::info!(exchange_id = %self.id, status = 500, "500 - {}", self.request_url);
        }
        tracing::error!(exchange_id = %self.id, error = %detail, "Upstream request failed");

        let body = error_body(spec, &detail);
        tokio::spawn(self.complete(None, request_task, None));

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
            body,
        )
            .into_response()
    }

    /// Wait for the response body and transcripts, then end the exchange.
    async fn complete(
        mut self,
        pump: Option<JoinHandle<FanOutcome>>,
        request_task: Option<TranscriptTask>,
        response_task: Option<TranscriptTask>,
    ) {
        let outcome = match pump {
            Some(pump) => pump.await.unwrap_or(FanOutcome::SourceFailed),
            None => FanOutcome::Complete,
        };

        for task in [request_task, response_task].into_iter().flatten() {
            let path = task.path().display().to_string();
            match task.finish().await {
                Ok(bytes) => tracing::debug!(exchange_id = %self.id, path = %path, bytes, "Transcript written"),
                Err(e) => tracing::warn!(exchange_id = %self.id, error = %e, "Transcript failed"),
            }
        }

        if self.state == ExchangeState::Errored {
            return;
        }
        match outcome {
            FanOutcome::Complete => {}
            FanOutcome::RelayClosed => {
                tracing::debug!(exchange_id = %self.id, "Client went away before the response completed")
            }
            FanOutcome::SourceFailed => {
                tracing::warn!(exchange_id = %self.id, "Upstream response body failed")
            }
        }
        self.advance(ExchangeState::Done);
    }
}

fn build_request(
    spec: &OutboundRequestSpec,
    target: &Target,
    body: Body,
    forwards_body: bool,
) -> Result<Request<Body>, axum::http::Error> {
    let mut request = Request::builder()
        .method(spec.method.clone())
        .uri(spec.uri(target))
        .version(Version::HTTP_11)
        .body(body)?;

    let mut headers = spec.headers.to_header_map();
    if !forwards_body {
        // framing headers would promise a body that is never sent
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::TRANSFER_ENCODING);
    }
    *request.headers_mut() = headers;
    Ok(request)
}

/// `error: cause: cause` rendering of an error and its sources.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// Body of the synthesized 500: the attempted request, then the error.
pub fn error_body(spec: &OutboundRequestSpec, detail: &str) -> String {
    let options = serde_json::to_string_pretty(spec).unwrap_or_else(|_| format!("{spec:?}"));
    format!("Error executing request\n\n{options}\n\nError: {detail}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(method: Method, uri: &str, headers: &[(&'static str, &'static str)]) -> request::Parts {
        let mut builder = Request::builder().method(method).uri(uri);
        for (n, v) in headers {
            builder = builder.header(*n, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn transition_table() {
        use ExchangeState::*;
        assert!(ReceivingRequest.can_advance_to(Forwarding));
        assert!(Forwarding.can_advance_to(AwaitingUpstream));
        assert!(AwaitingUpstream.can_advance_to(RelayingResponse));
        assert!(RelayingResponse.can_advance_to(Done));
        assert!(Forwarding.can_advance_to(Errored));
        assert!(AwaitingUpstream.can_advance_to(Errored));

        assert!(!RelayingResponse.can_advance_to(Errored));
        assert!(!ReceivingRequest.can_advance_to(Done));
        assert!(!Errored.can_advance_to(Forwarding));
        assert!(Done.is_terminal() && Errored.is_terminal());
        assert!(!AwaitingUpstream.is_terminal());
    }

    #[test]
    fn builds_outbound_spec_against_base_path() {
        let target = Target::parse("http://my.host.com/root/").unwrap();
        let config = ProxyConfig::for_target("http://my.host.com/root/");
        let parts = parts(Method::GET, "/something?x=1", &[("host", "localhost:8000"), ("accept-encoding", "gzip")]);

        let spec = OutboundRequestSpec::from_inbound(&parts, &target, &config);
        assert_eq!(spec.hostname, "my.host.com");
        assert_eq!(spec.port, 80);
        assert_eq!(spec.path, "/root/something?x=1");
        assert_eq!(spec.headers.len(), 1);
        assert_eq!(spec.headers.get(&header::HOST).unwrap(), "my.host.com");
        assert!(spec.tls_verification);
        assert_eq!(spec.uri(&target), "http://my.host.com/root/something?x=1");
    }

    #[test]
    fn body_methods() {
        assert!(expects_body(&Method::POST));
        assert!(expects_body(&Method::PUT));
        assert!(expects_body(&Method::PATCH));
        assert!(!expects_body(&Method::GET));
        assert!(!expects_body(&Method::HEAD));
        assert!(!expects_body(&Method::DELETE));
    }

    #[test]
    fn error_body_lists_request_then_error() {
        let target = Target::parse("https://my.host.com:8443/").unwrap();
        let mut config = ProxyConfig::for_target("https://my.host.com:8443/");
        config.allow_insecure_tls = true;
        let spec = OutboundRequestSpec::from_inbound(&parts(Method::POST, "/a", &[]), &target, &config);

        let body = error_body(&spec, "connection refused");
        let options_at = body.find("\"hostname\": \"my.host.com\"").unwrap();
        let error_at = body.find("Error: connection refused").unwrap();
        assert!(options_at < error_at);
        assert!(body.contains("\"port\": 8443"));
        assert!(body.contains("\"method\": \"POST\""));
        assert!(body.contains("\"tls_verification\": false"));
    }

    #[test]
    fn error_chain_walks_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let outer = crate::capture::TranscriptError::Io {
            path: "x".into(),
            source: inner,
        };
        assert_eq!(error_chain(&outer), "failed to write transcript x: refused: refused");
    }
}
