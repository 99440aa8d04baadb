//! # Message Sinks
//!
//! A `MessageSink` receives every frame the ingestor reads, in arrival order,
//! one at a time. Frames are opaque JSON text; sinks never interpret them.
//! A failing delivery is reported back to the ingestor, which logs it and
//! carries on with the next frame.
//!
//! `deliver` runs on the ingestor's task, so it must not block. Output that can
//! stall (a pipe nobody reads) goes through a `ChannelSink` and `write_lines`
//! on a task of its own.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Failure while handling a single received message.
#[derive(Debug, Error)]
pub enum SinkError {
    /// A binary frame could not be forwarded as text.
    #[error("Received a binary frame that is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// The consuming side of the sink is gone.
    #[error("Message consumer has been dropped")]
    Closed,
}

/// Consumer of received frames.
pub trait MessageSink: Send + 'static {
    fn deliver(&mut self, frame: &str) -> Result<(), SinkError>;
}

impl<F> MessageSink for F
where
    F: FnMut(&str) -> Result<(), SinkError> + Send + 'static,
{
    fn deliver(&mut self, frame: &str) -> Result<(), SinkError> {
        self(frame)
    }
}

/// Forwards frames to another task over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    /// Creates the sink together with the receiver that gets every frame.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl MessageSink for ChannelSink {
    fn deliver(&mut self, frame: &str) -> Result<(), SinkError> {
        self.sender
            .send(frame.to_string())
            .map_err(|_| SinkError::Closed)
    }
}

/// Writes every frame from `frames` to `writer`, one per line, flushing after
/// each, until the channel closes or `shutdown` fires.
///
/// Shutdown also interrupts a write that is stuck on a full pipe. Frames still
/// queued at that point are dropped.
pub async fn write_lines<W>(
    mut frames: mpsc::UnboundedReceiver<String>,
    mut writer: W,
    shutdown: CancellationToken,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => return Ok(()),
            },
        };

        let write = async {
            writer.write_all(frame.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        };
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            written = write => written?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn write_lines_emits_one_line_per_frame_until_the_channel_closes() {
        let (mut sink, frames) = ChannelSink::channel();
        sink.deliver(r#"{"type":"ris_message"}"#).unwrap();
        sink.deliver(r#"{"type":"pong"}"#).unwrap();
        drop(sink);

        let mut written = Vec::new();
        write_lines(frames, &mut written, CancellationToken::new()).await.unwrap();
        assert_eq!(
            String::from_utf8(written).unwrap(),
            "{\"type\":\"ris_message\"}\n{\"type\":\"pong\"}\n"
        );
    }

    #[tokio::test]
    async fn shutdown_interrupts_a_stalled_writer() {
        // A pipe with a tiny buffer whose reader never reads.
        let (writer, _reader) = tokio::io::duplex(8);
        let (mut sink, frames) = ChannelSink::channel();
        let token = CancellationToken::new();
        let writing = tokio::spawn(write_lines(frames, writer, token.clone()));

        sink.deliver(&"x".repeat(1024)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // The ingestor side keeps accepting frames while the writer is stuck.
        sink.deliver("next").unwrap();
        assert!(!writing.is_finished());

        token.cancel();
        let result = timeout(Duration::from_secs(1), writing).await.expect("writer ignored shutdown");
        assert!(result.unwrap().is_ok());
    }

    #[test]
    fn channel_sink_reports_dropped_receiver() {
        let (mut sink, mut receiver) = ChannelSink::channel();
        sink.deliver("first").unwrap();
        assert_eq!(receiver.try_recv().unwrap(), "first");
        drop(receiver);
        assert!(matches!(sink.deliver("second"), Err(SinkError::Closed)));
    }

    #[test]
    fn closures_are_sinks() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let mut sink = move |frame: &str| -> Result<(), SinkError> {
            recorded.lock().unwrap().push(frame.len());
            Ok(())
        };
        sink.deliver("abc").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }
}
