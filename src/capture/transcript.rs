//! Wire-format transcripts.
//!
//! # Responsibilities
//! - Render request and response heads exactly as they travel on the wire
//! - Append body bytes to the transcript file as they arrive
//! - Close the file once, when the source stream is done with it
//!
//! # Design Decisions
//! - The head is written before the writer task reads its first body chunk,
//!   so header bytes always precede body bytes
//! - Body chunks arrive over an unbounded channel; the live relay never waits
//!   on the file system
//! - A failing sink drops its receiver; producers notice and stop feeding it

use axum::http::{Method, StatusCode, Version};
use hyper::body::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::http::headers::HeaderList;

/// A transcript sink failure. Logged by the caller, never surfaced to clients.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("failed to write transcript {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transcript writer for {path} stopped unexpectedly")]
    Aborted { path: PathBuf },
}

/// Render `METHOD url HTTP/x.y\r\n`, the headers and the blank line.
pub fn render_request_head(
    method: &Method,
    url: &str,
    version: Version,
    headers: &HeaderList,
) -> Vec<u8> {
    let mut head = format!("{} {} {}\r\n", method, url, version_str(version)).into_bytes();
    write_headers(&mut head, headers);
    head
}

/// Render `HTTP/x.y status[ reason]\r\n`, the headers and the blank line.
pub fn render_response_head(
    version: Version,
    status: StatusCode,
    reason: Option<&[u8]>,
    headers: &HeaderList,
) -> Vec<u8> {
    let mut head = format!("{} {}", version_str(version), status.as_u16()).into_bytes();
    if let Some(reason) = reason.filter(|r| !r.is_empty()) {
        head.push(b' ');
        head.extend_from_slice(reason);
    }
    head.extend_from_slice(b"\r\n");
    write_headers(&mut head, headers);
    head
}

fn write_headers(out: &mut Vec<u8>, headers: &HeaderList) {
    for (name, value) in headers.iter() {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
}

/// `HTTP/1.1` style rendering of a protocol version.
pub fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

/// Producer side of a transcript: body chunks pushed here are appended to the file.
#[derive(Debug, Clone)]
pub struct BodySink {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl BodySink {
    /// Queue a chunk. Returns `false` once the writer has gone away.
    pub fn push(&self, chunk: Bytes) -> bool {
        self.tx.send(chunk).is_ok()
    }
}

/// Handle to a running transcript writer.
#[derive(Debug)]
pub struct TranscriptTask {
    path: PathBuf,
    handle: JoinHandle<Result<u64, TranscriptError>>,
}

impl TranscriptTask {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the writer to close the file. Returns the bytes written.
    pub async fn finish(self) -> Result<u64, TranscriptError> {
        match self.handle.await {
            Ok(result) => result,
            Err(_) => Err(TranscriptError::Aborted { path: self.path }),
        }
    }
}

/// Open a transcript at `path`, write `head`, then append body chunks until
/// every `BodySink` clone has been dropped.
pub fn open(path: PathBuf, head: Vec<u8>) -> (BodySink, TranscriptTask) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(write_transcript(path.clone(), head, rx));
    (BodySink { tx }, TranscriptTask { path, handle })
}

async fn write_transcript(
    path: PathBuf,
    head: Vec<u8>,
    mut chunks: mpsc::UnboundedReceiver<Bytes>,
) -> Result<u64, TranscriptError> {
    let io_err = |source| TranscriptError::Io {
        path: path.clone(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .map_err(io_err)?;

    file.write_all(&head).await.map_err(io_err)?;
    let mut written = head.len() as u64;

    while let Some(chunk) = chunks.recv().await {
        file.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(io_err)?;
    tracing::trace!(path = %path.display(), bytes = written, "Transcript closed");
    Ok(written)
}
