//! Body fan-out.
//!
//! A pump task owns the source body and reads it at its own pace. Each data
//! frame is queued for the transcript writer and for the relay side, and each
//! side drains its own queue. A stalled client cannot hold back the
//! transcript, and a stalled or failed transcript cannot hold back the client.
//!
//! ```text
//! source body ──▶ pump ──┬──▶ BodySink ──▶ transcript writer
//!                        └──▶ ChannelBody ──▶ client / upstream connection
//! ```
//!
//! When the relay side goes away the pump stops and drops the source, which
//! aborts the connection it came from. Whatever the transcript received up to
//! that point stays on disk.

use http_body_util::BodyExt;
use hyper::body::{Body, Bytes, Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capture::transcript::BodySink;

/// How the pump finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOutcome {
    /// The source was read to its end.
    Complete,
    /// The relay side was dropped first.
    RelayClosed,
    /// The source body failed.
    SourceFailed,
}

/// Relay-side body fed by the pump.
#[derive(Debug)]
pub struct ChannelBody<E> {
    rx: mpsc::UnboundedReceiver<Result<Frame<Bytes>, E>>,
    size_hint: SizeHint,
}

impl<E> Body for ChannelBody<E> {
    type Data = Bytes;
    type Error = E;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.get_mut().rx.poll_recv(cx)
    }

    fn size_hint(&self) -> SizeHint {
        self.size_hint.clone()
    }
}

/// Start pumping `source` into `sink` (when present) and the returned body.
pub fn fan_out<B>(source: B, sink: Option<BodySink>) -> (ChannelBody<B::Error>, JoinHandle<FanOutcome>)
where
    B: Body<Data = Bytes> + Unpin + Send + 'static,
    B::Error: Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let size_hint = source.size_hint();
    let handle = tokio::spawn(pump(source, sink, tx));
    (ChannelBody { rx, size_hint }, handle)
}

async fn pump<B>(
    mut source: B,
    mut sink: Option<BodySink>,
    relay: mpsc::UnboundedSender<Result<Frame<Bytes>, B::Error>>,
) -> FanOutcome
where
    B: Body<Data = Bytes> + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = relay.closed() => return FanOutcome::RelayClosed,
            frame = source.frame() => frame,
        };

        match frame {
            None => return FanOutcome::Complete,
            Some(Ok(frame)) => {
                if let (Some(data), Some(s)) = (frame.data_ref(), sink.as_ref()) {
                    if !s.push(data.clone()) {
                        tracing::debug!("Transcript sink closed, continuing without it");
                        sink = None;
                    }
                }
                if relay.send(Ok(frame)).is_err() {
                    return FanOutcome::RelayClosed;
                }
            }
            Some(Err(e)) => {
                let _ = relay.send(Err(e));
                return FanOutcome::SourceFailed;
            }
        }
    }
}
