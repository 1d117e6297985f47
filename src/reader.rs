//! The reader activity: device bytes in, frames out.
//!
//! [`LinePipeline`] chains the line assembler, the payload transformer and
//! the framer. [`run_reader`] polls a [`ByteSource`] on a blocking thread and
//! hands every completed frame to the [`Forwarder`] in line order.

use std::{thread, time::Duration};

use bytes::Bytes;
use log::{debug, info, warn};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::{
    connection::Connector,
    forwarder::Forwarder,
    frame::{Frame, MessageFramer},
    line::LineAssembler,
    metrics,
    payload::PayloadTransformer,
    serial::ByteSource,
};

/// Size of the buffer handed to each device read.
pub const READ_BUFFER_SIZE: usize = 256;

/// Default idle interval after a poll that produced no bytes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Line assembly, cleanup and framing for one device.
#[derive(Debug, Default)]
pub struct LinePipeline {
    assembler: LineAssembler,
    transformer: PayloadTransformer,
    framer: MessageFramer,
}

impl LinePipeline {
    /// Create a pipeline from its stages.
    #[must_use]
    pub fn new(assembler: LineAssembler, framer: MessageFramer) -> Self {
        Self {
            assembler,
            transformer: PayloadTransformer,
            framer,
        }
    }

    /// Feed one chunk of device bytes and return the frames it completes.
    ///
    /// Empty lines are skipped without producing a frame.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.assembler
            .feed(chunk)
            .into_iter()
            .filter(|line| !line.is_empty())
            .map(|line| self.frame_line(&line))
            .collect()
    }

    /// Bytes of the pending, unterminated line.
    #[must_use]
    pub fn pending(&self) -> &[u8] { self.assembler.buffered() }

    fn frame_line(&self, line: &Bytes) -> Frame {
        debug!("raw serial line: line={:?}", String::from_utf8_lossy(line));
        debug!(
            "cleaned serial line: line={:?}",
            String::from_utf8_lossy(self.transformer.cleaned(line))
        );
        self.framer.frame(&self.transformer.transform(line))
    }
}

/// Timing for the reader loop.
#[derive(Clone, Copy, Debug)]
pub struct ReaderOptions {
    /// Idle time after an empty poll or a failed read.
    pub poll_interval: Duration,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Poll `source` until `shutdown` is cancelled, forwarding every frame.
///
/// Must run on a thread where blocking is allowed (for example inside
/// [`tokio::task::spawn_blocking`]); `runtime` drives each send. Read errors
/// are logged and the loop continues at the next poll. The source is dropped,
/// closing the device, when the loop ends.
pub fn run_reader<S, C>(
    mut source: S,
    mut pipeline: LinePipeline,
    forwarder: &Forwarder<C>,
    options: ReaderOptions,
    shutdown: &CancellationToken,
    runtime: &Handle,
) where
    S: ByteSource,
    C: Connector,
{
    let mut buf = [0u8; READ_BUFFER_SIZE];
    while !shutdown.is_cancelled() {
        match source.read_chunk(&mut buf) {
            Ok(0) => thread::sleep(options.poll_interval),
            Ok(n) => {
                for frame in pipeline.push(&buf[..n]) {
                    runtime.block_on(forwarder.send(&frame));
                }
            }
            Err(e) => {
                warn!("serial read failed: error={e}");
                metrics::inc_read_errors();
                thread::sleep(options.poll_interval);
            }
        }
    }
    drop(source);
    info!("serial port closed");
}

#[cfg(test)]
mod tests {
    use super::LinePipeline;
    use crate::{
        frame::{ETX, MessageFramer, STX},
        line::LineAssembler,
    };

    #[test]
    fn push_frames_each_completed_line() {
        let mut pipeline = LinePipeline::default();
        let frames = pipeline.push(b"#1234\rA:B\r");
        let frames: Vec<&[u8]> = frames.iter().map(|f| f.as_bytes()).collect();
        assert_eq!(
            frames,
            [
                b"\x02STM:1:1::1234:\x03".as_slice(),
                b"\x02STM:1:1::1\\:B:\x03".as_slice(),
            ]
        );
    }

    #[test]
    fn empty_lines_produce_no_frames() {
        let mut pipeline = LinePipeline::default();
        assert!(pipeline.push(b"\r\r\r").is_empty());
    }

    #[test]
    fn non_empty_line_that_cleans_to_nothing_is_still_framed() {
        let mut pipeline = LinePipeline::new(LineAssembler::new(), MessageFramer::new("H", "F"));
        let frames = pipeline.push(b"--\r");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), [STX, b'H', b'F', ETX]);
    }

    #[test]
    fn tail_of_oversized_line_is_not_framed() {
        let mut pipeline =
            LinePipeline::new(LineAssembler::with_max_line_length(8), MessageFramer::default());
        assert!(pipeline.push(b"#123456789").is_empty());
        assert!(pipeline.push(b"ABCD\r").is_empty());

        let frames = pipeline.push(b"#1234\r");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), b"\x02STM:1:1::1234:\x03");
    }

    #[test]
    fn partial_lines_wait_for_more_bytes() {
        let mut pipeline = LinePipeline::default();
        assert!(pipeline.push(b"#12").is_empty());
        assert_eq!(pipeline.pending(), b"#12");
        assert_eq!(pipeline.push(b"34\r").len(), 1);
        assert!(pipeline.pending().is_empty());
    }
}
