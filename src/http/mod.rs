//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (localhost)
//!     → server.rs (axum setup, single fallback handler)
//!     → exchange.rs (outbound request, transcripts, relay state machine)
//!     → headers.rs (ordered headers, host / accept-encoding rewrite)
//!     → client.rs (plain or TLS upstream client)
//!     → upstream response streamed back to the client
//! ```

pub mod client;
pub mod exchange;
pub mod headers;
pub mod server;
pub mod tls;

pub use client::UpstreamClient;
pub use exchange::{Exchange, ExchangeState, OutboundRequestSpec};
pub use headers::HeaderList;
pub use server::{CaptureServer, ServeError};
