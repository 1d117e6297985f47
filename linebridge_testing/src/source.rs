//! Scripted serial device.

use std::{
    collections::VecDeque,
    io::{self, Read},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

/// One read result played back by [`ScriptedSource`].
#[derive(Clone, Debug)]
pub enum ReadStep {
    /// The read returns these bytes.
    Bytes(Vec<u8>),
    /// The read fails with this error kind.
    Error(io::ErrorKind),
}

impl From<&[u8]> for ReadStep {
    fn from(bytes: &[u8]) -> Self { Self::Bytes(bytes.to_vec()) }
}

impl<const N: usize> From<&[u8; N]> for ReadStep {
    fn from(bytes: &[u8; N]) -> Self { Self::Bytes(bytes.to_vec()) }
}

/// A device that returns scripted reads, then times out forever.
///
/// Each step is returned by exactly one `read` call, so chunk boundaries are
/// preserved as long as the caller's buffer is large enough.
pub struct ScriptedSource {
    steps: VecDeque<ReadStep>,
    closed: Arc<AtomicBool>,
}

impl ScriptedSource {
    /// Create a source playing back `steps` in order.
    pub fn new<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ReadStep>,
    {
        Self {
            steps: steps.into_iter().map(Into::into).collect(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag set once the source has been dropped.
    #[must_use]
    pub fn closed_flag(&self) -> Arc<AtomicBool> { Arc::clone(&self.closed) }
}

impl Read for ScriptedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.steps.pop_front() {
            Some(ReadStep::Bytes(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.steps.push_front(ReadStep::Bytes(bytes[n..].to_vec()));
                }
                Ok(n)
            }
            Some(ReadStep::Error(kind)) => Err(kind.into()),
            None => Err(io::ErrorKind::TimedOut.into()),
        }
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) { self.closed.store(true, Ordering::SeqCst); }
}
