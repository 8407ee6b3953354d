//! # Connection I/O
//!
//! Each connection runs two tasks:
//! - **Writer**: drains the session's outbound queue into the socket through
//!   a [`FrameCodec`], so frames from any sender are written whole and in
//!   queue order.
//! - **Reader**: decodes frames with an idle timeout and hands each one to a
//!   role-specific [`FrameHandler`].
//!
//! Both stop when the session's cancellation token fires.

use crate::config::IoSettings;
use crate::event::SessionEvent;
use crate::heartbeat;
use crate::session::Session;
use codec::{Frame, FrameCodec, FrameError};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

/// Receives every frame read from the connection, in arrival order
pub(crate) trait FrameHandler: Send {
    fn on_frame(&mut self, session: &Arc<Session>, frame: Frame);
}

/// Why the read loop stopped
#[derive(Debug)]
pub(crate) enum ReadOutcome {
    /// Peer closed its side
    InputClosed,
    /// Session was closed or shut down locally
    Cancelled,
    /// Socket or framing failure
    Failed(FrameError),
}

impl ReadOutcome {
    /// Emit the error (if any) and close the session accordingly
    pub(crate) fn close(self, session: &Session) {
        match self {
            ReadOutcome::InputClosed => {
                session.close_with(SessionEvent::InputClosed);
            }
            ReadOutcome::Cancelled => {
                session.close();
            }
            ReadOutcome::Failed(err) => {
                session.emit(SessionEvent::Error(err.into()));
                session.close();
            }
        }
    }
}

pub(crate) fn spawn_writer(
    session: Arc<Session>,
    write_half: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    max_frame_len: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut framed = FramedWrite::new(write_half, FrameCodec::new(max_frame_len));
        let token = session.shutdown_token().clone();
        let mut written = 0u64;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                next = outbound.recv() => match next {
                    Some(frame) => {
                        if let Err(e) = framed.send(frame).await {
                            warn!(session = session.id(), "Write failed: {}", e);
                            session.emit(SessionEvent::Error(e.into()));
                            session.close();
                            return;
                        }
                        written += 1;
                    }
                    None => break,
                }
            }
        }

        // flush whatever was queued before the close
        while let Ok(frame) = outbound.try_recv() {
            if framed.feed(frame).await.is_err() {
                break;
            }
            written += 1;
        }
        let _ = framed.close().await;
        debug!(session = session.id(), written, "Writer stopped");
    })
}

pub(crate) async fn read_loop<H: FrameHandler>(
    session: &Arc<Session>,
    read_half: OwnedReadHalf,
    settings: IoSettings,
    handler: &mut H,
) -> ReadOutcome {
    let mut framed = FramedRead::new(read_half, FrameCodec::new(settings.max_frame_len));
    let token = session.shutdown_token().clone();

    loop {
        let next = tokio::select! {
            _ = token.cancelled() => return ReadOutcome::Cancelled,
            next = tokio::time::timeout(settings.idle_timeout, framed.next()) => next,
        };

        match next {
            Err(_elapsed) => heartbeat::on_idle(session, settings.heartbeat_on_idle),
            Ok(Some(Ok(frame))) => handler.on_frame(session, frame),
            Ok(Some(Err(err))) => return ReadOutcome::Failed(err),
            Ok(None) => return ReadOutcome::InputClosed,
        }

        if session.is_closed() {
            return ReadOutcome::Cancelled;
        }
    }
}
