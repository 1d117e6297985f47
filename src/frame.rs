//! Wire framing for forwarded payloads.
//!
//! Every payload travels as `STX ‖ HEADER ‖ payload ‖ FOOTER ‖ ETX`. There is
//! no length prefix: receivers delimit frames on the STX and ETX sentinels.
//! The payload escaping only covers `\` and `:`, so a payload that carries a
//! raw sentinel byte produces an ambiguous frame. [`MessageFramer`] logs such
//! payloads but still sends them unchanged.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::warn;
use tokio_util::codec::{Decoder, Encoder};

use crate::payload::Payload;

/// Start-of-text sentinel opening every frame.
pub const STX: u8 = 0x02;
/// End-of-text sentinel closing every frame.
pub const ETX: u8 = 0x03;

/// Header used when none is configured.
pub const DEFAULT_HEADER: &str = "STM:1:1::1";
/// Footer used when none is configured.
pub const DEFAULT_FOOTER: &str = ":";

/// A complete, immutable wire frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame(Bytes);

impl Frame {
    /// Frame bytes, sentinels included.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] { &self.0 }

    /// Total length in bytes.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Always `false`; a frame carries at least its sentinels.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] { &self.0 }
}

impl From<Frame> for Bytes {
    fn from(frame: Frame) -> Self { frame.0 }
}

/// Wraps escaped payloads in the configured header and footer.
///
/// # Examples
///
/// ```
/// use linebridge::{frame::MessageFramer, payload::transform};
///
/// let framer = MessageFramer::default();
/// let frame = framer.frame(&transform(b"#1234"));
/// assert_eq!(frame.as_bytes(), b"\x02STM:1:1::1234:\x03");
/// ```
#[derive(Clone, Debug)]
pub struct MessageFramer {
    header: Bytes,
    footer: Bytes,
}

impl Default for MessageFramer {
    fn default() -> Self { Self::new(DEFAULT_HEADER, DEFAULT_FOOTER) }
}

impl MessageFramer {
    /// Create a framer with the given header and footer.
    #[must_use]
    pub fn new(header: impl Into<Bytes>, footer: impl Into<Bytes>) -> Self {
        Self {
            header: header.into(),
            footer: footer.into(),
        }
    }

    /// Number of bytes a frame adds around its payload.
    #[must_use]
    pub fn overhead(&self) -> usize { self.header.len() + self.footer.len() + 2 }

    /// Build the frame for `payload`.
    #[must_use]
    pub fn frame(&self, payload: &Payload) -> Frame {
        if payload.contains_sentinel() {
            warn!(
                "payload contains an unescaped frame sentinel: payload={:?}",
                payload.to_string()
            );
        }
        let mut dst = BytesMut::with_capacity(self.overhead() + payload.len());
        self.write_frame(payload.as_bytes(), &mut dst);
        Frame(dst.freeze())
    }

    fn write_frame(&self, payload: &[u8], dst: &mut BytesMut) {
        dst.put_u8(STX);
        dst.extend_from_slice(&self.header);
        dst.extend_from_slice(payload);
        dst.extend_from_slice(&self.footer);
        dst.put_u8(ETX);
    }
}

impl Encoder<Payload> for MessageFramer {
    type Error = io::Error;

    fn encode(&mut self, item: Payload, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(self.overhead() + item.len());
        self.write_frame(item.as_bytes(), dst);
        Ok(())
    }
}

/// Receiver-side decoder that splits a byte stream on STX/ETX.
///
/// Bytes outside a frame are discarded. Yields the frame body between the
/// sentinels (header, payload and footer). A second STX before the closing
/// ETX restarts the frame.
#[derive(Clone, Debug)]
pub struct SentinelDecoder {
    max_frame_length: usize,
}

impl Default for SentinelDecoder {
    fn default() -> Self {
        Self {
            max_frame_length: 64 * 1024,
        }
    }
}

impl SentinelDecoder {
    /// Create a decoder rejecting frame bodies longer than `max_frame_length`.
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self { Self { max_frame_length } }
}

impl Decoder for SentinelDecoder {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(first) = src.iter().position(|&b| b == STX) else {
            src.clear();
            return Ok(None);
        };
        src.advance(first);

        let Some(end) = src.iter().position(|&b| b == ETX) else {
            if let Some(last) = src.iter().rposition(|&b| b == STX) {
                src.advance(last);
            }
            if src.len() > self.max_frame_length.saturating_add(1) {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "frame too large"));
            }
            return Ok(None);
        };

        // A later STX before the ETX abandons the earlier, unterminated frame.
        let start = src[..end].iter().rposition(|&b| b == STX).unwrap_or(0);
        src.advance(start);
        let end = end - start;
        let mut frame = src.split_to(end + 1);
        frame.truncate(end);
        frame.advance(1);
        Ok(Some(frame.freeze()))
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};
    use rstest::rstest;
    use tokio_util::codec::{Decoder, Encoder};

    use super::{ETX, MessageFramer, STX, SentinelDecoder};
    use crate::payload::{Payload, transform};

    fn expected_frame(header: &[u8], payload: &[u8], footer: &[u8]) -> Vec<u8> {
        let mut bytes = vec![STX];
        bytes.extend_from_slice(header);
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(footer);
        bytes.push(ETX);
        bytes
    }

    #[rstest]
    #[case(b"#1234".as_slice(), b"234".as_slice())]
    #[case(b"A:B".as_slice(), br"\:B".as_slice())]
    #[case(b"??".as_slice(), b"".as_slice())]
    fn frames_wrap_transformed_lines(#[case] line: &[u8], #[case] payload: &[u8]) {
        let framer = MessageFramer::default();
        let frame = framer.frame(&transform(line));
        assert_eq!(
            frame.as_bytes(),
            expected_frame(b"STM:1:1::1", payload, b":").as_slice()
        );
    }

    #[test]
    fn custom_header_and_footer_are_used() {
        let framer = MessageFramer::new("HDR", "|END");
        let frame = framer.frame(&Payload::from_escaped("xyz"));
        assert_eq!(frame.as_bytes(), b"\x02HDRxyz|END\x03");
        assert_eq!(frame.len(), framer.overhead() + 3);
    }

    #[test]
    fn encoder_matches_frame() {
        let mut framer = MessageFramer::default();
        let payload = transform(b"#42");
        let mut dst = BytesMut::new();
        framer.encode(payload.clone(), &mut dst).expect("encode");
        assert_eq!(&dst[..], framer.frame(&payload).as_bytes());
    }

    #[test]
    fn sentinel_decoder_splits_consecutive_frames() {
        let mut decoder = SentinelDecoder::default();
        let mut src = BytesMut::from(&b"noise\x02one\x03\x02two\x03\x02par"[..]);

        assert_eq!(decoder.decode(&mut src).expect("decode"), Some(Bytes::from_static(b"one")));
        assert_eq!(decoder.decode(&mut src).expect("decode"), Some(Bytes::from_static(b"two")));
        assert_eq!(decoder.decode(&mut src).expect("decode"), None);
        assert_eq!(&src[..], b"\x02par");

        src.extend_from_slice(b"tial\x03");
        assert_eq!(
            decoder.decode(&mut src).expect("decode"),
            Some(Bytes::from_static(b"partial"))
        );
        assert!(src.is_empty());
    }

    #[test]
    fn sentinel_decoder_restarts_on_nested_stx() {
        let mut decoder = SentinelDecoder::default();
        let mut src = BytesMut::from(&b"\x02lost\x02kept\x03"[..]);
        assert_eq!(decoder.decode(&mut src).expect("decode"), Some(Bytes::from_static(b"kept")));
    }

    #[test]
    fn sentinel_decoder_rejects_oversized_frames() {
        let mut decoder = SentinelDecoder::new(4);
        let mut src = BytesMut::from(&b"\x02abcdefgh"[..]);
        assert!(decoder.decode(&mut src).is_err());
    }

    #[test]
    fn sentinel_decoder_accepts_unbounded_limit() {
        let mut decoder = SentinelDecoder::new(usize::MAX);
        let mut src = BytesMut::from(&b"\x02open"[..]);
        assert_eq!(decoder.decode(&mut src).expect("decode"), None);

        src.extend_from_slice(b"ed\x03");
        assert_eq!(
            decoder.decode(&mut src).expect("decode"),
            Some(Bytes::from_static(b"opened"))
        );
    }
}
