//! Recording HTTP/HTTPS forwarding proxy.
//!
//! Listens on localhost, forwards every request to one configured target,
//! streams the response back unchanged and optionally writes wire-format
//! transcripts of both sides. Saved request transcripts can be replayed.

pub mod capture;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod replay;
pub mod store;

pub use config::schema::ProxyConfig;
pub use http::CaptureServer;
pub use lifecycle::Shutdown;
pub use replay::{replay, ReplayOptions};
pub use store::TranscriptStore;
