//! Capture subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request path
//!     → paths.rs (forwarding path + transcript URL)
//!     → filename.rs (<path>-<millis>.<req|res>)
//!     → transcript.rs (head written, writer task spawned)
//!     → fanout.rs (one pump feeds the writer and the relay independently)
//! ```
//!
//! # Design Decisions
//! - The output directory is created once, at startup
//! - Transcript failures are logged and never reach the client
//! - Partial transcripts (client went away) are left as they are

pub mod fanout;
pub mod filename;
pub mod paths;
pub mod transcript;

pub use fanout::{fan_out, ChannelBody, FanOutcome};
pub use filename::{allocate, allocate_at, TranscriptKind};
pub use paths::combine;
pub use transcript::{BodySink, TranscriptError, TranscriptTask};

use std::path::Path;

/// Create `path` and every missing parent, like `mkdir -p`. Idempotent.
pub async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(path).await
}
