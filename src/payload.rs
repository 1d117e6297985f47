//! Legacy cleanup and escaping rules applied to each device line.
//!
//! A raw line becomes a [`Payload`] in three steps: leading
//! non-alphanumeric bytes are stripped, the first remaining byte is dropped
//! when more than one remains, and backslashes and colons are escaped so
//! they cannot collide with the `:`-delimited header and footer fields.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::frame::{ETX, STX};

/// Escaped payload ready to be embedded in a frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payload(Bytes);

impl Payload {
    /// Wrap bytes that are already escaped.
    #[must_use]
    pub fn from_escaped(bytes: impl Into<Bytes>) -> Self { Self(bytes.into()) }

    /// Escaped payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] { &self.0 }

    /// Length of the escaped payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Whether the payload contains an STX or ETX byte.
    ///
    /// Such bytes are not escaped and will confuse receivers that delimit
    /// frames on the sentinels.
    #[must_use]
    pub fn contains_sentinel(&self) -> bool { self.0.iter().any(|&b| b == STX || b == ETX) }
}

/// Lossy UTF-8 rendering for log output.
impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl From<Payload> for Bytes {
    fn from(payload: Payload) -> Self { payload.0 }
}

/// Remove every leading byte that is not ASCII alphanumeric.
///
/// ```
/// use linebridge::payload::strip_leading_non_alnum;
///
/// assert_eq!(strip_leading_non_alnum(b"#!1234"), b"1234");
/// assert_eq!(strip_leading_non_alnum(b"--"), b"");
/// ```
#[must_use]
pub fn strip_leading_non_alnum(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(u8::is_ascii_alphanumeric)
        .unwrap_or(line.len());
    &line[start..]
}

/// Drop the first byte when more than one byte remains.
///
/// Devices prefix each reading with a single marker byte; a lone byte is
/// kept as-is.
#[must_use]
pub fn drop_marker(line: &[u8]) -> &[u8] {
    if line.len() > 1 { &line[1..] } else { line }
}

/// Escape `\` as `\\` and `:` as `\:`, leaving every other byte unchanged.
///
/// ```
/// use linebridge::payload::escape;
///
/// assert_eq!(&escape(b"A:B")[..], br"A\:B");
/// assert_eq!(&escape(b"plain")[..], b"plain");
/// ```
#[must_use]
pub fn escape(text: &[u8]) -> Bytes {
    let extra = text.iter().filter(|&&b| b == b'\\' || b == b':').count();
    let mut escaped = BytesMut::with_capacity(text.len() + extra);
    for &b in text {
        if b == b'\\' || b == b':' {
            escaped.put_u8(b'\\');
        }
        escaped.put_u8(b);
    }
    escaped.freeze()
}

/// Apply the full cleanup pipeline to a raw line.
#[must_use]
pub fn transform(line: &[u8]) -> Payload {
    Payload(escape(drop_marker(strip_leading_non_alnum(line))))
}

/// Stateless transformer held by the line pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct PayloadTransformer;

impl PayloadTransformer {
    /// Derive the escaped payload for `line`. See [`transform`].
    #[must_use]
    pub fn transform(self, line: &[u8]) -> Payload { transform(line) }

    /// The cleaned but unescaped text, as logged before framing.
    #[must_use]
    pub fn cleaned(self, line: &[u8]) -> &[u8] { drop_marker(strip_leading_non_alnum(line)) }
}

#[cfg(test)]
mod tests {
    use proptest::{
        collection::vec,
        prelude::{Strategy, any},
        prop_assert,
        prop_assert_eq,
        test_runner::{Config as ProptestConfig, RngAlgorithm, TestRng, TestRunner},
    };
    use rstest::rstest;

    use super::{Payload, drop_marker, escape, strip_leading_non_alnum, transform};

    fn deterministic_runner(cases: u32) -> TestRunner {
        let config = ProptestConfig {
            cases,
            ..ProptestConfig::default()
        };
        TestRunner::new_with_rng(config, TestRng::deterministic_rng(RngAlgorithm::ChaCha))
    }

    #[rstest]
    #[case(b"#1234".as_slice(), b"234".as_slice())]
    #[case(b"A:B".as_slice(), br"\:B".as_slice())]
    #[case(b"  \t>X".as_slice(), b"X".as_slice())]
    #[case(b"!!!".as_slice(), b"".as_slice())]
    #[case(b"".as_slice(), b"".as_slice())]
    #[case(br"*a\b".as_slice(), br"\\b".as_slice())]
    #[case(b"$GP:1:2".as_slice(), br"P\:1\:2".as_slice())]
    fn transform_applies_rules_in_order(#[case] line: &[u8], #[case] expected: &[u8]) {
        assert_eq!(transform(line).as_bytes(), expected);
    }

    #[rstest]
    #[case(b"".as_slice(), b"".as_slice())]
    #[case(b"7".as_slice(), b"7".as_slice())]
    #[case(b"78".as_slice(), b"8".as_slice())]
    fn drop_marker_keeps_single_byte(#[case] input: &[u8], #[case] expected: &[u8]) {
        assert_eq!(drop_marker(input), expected);
    }

    #[test]
    fn escape_handles_colon_and_backslash() {
        assert_eq!(&escape(b"A:B")[..], br"A\:B");
        assert_eq!(&escape(br"\:")[..], br"\\\:");
    }

    #[test]
    fn sentinel_bytes_are_detected_but_not_escaped() {
        let payload = transform(b"#ab\x02c");
        assert!(payload.contains_sentinel());
        assert_eq!(payload.as_bytes(), b"b\x02c");
        assert!(!Payload::from_escaped("abc").contains_sentinel());
    }

    #[test]
    fn display_renders_invalid_utf8_lossily() {
        let payload = Payload::from_escaped(&b"ok\xff\\:"[..]);
        assert_eq!(payload.to_string(), "ok\u{fffd}\\:");
    }

    #[test]
    fn strip_removes_exactly_the_leading_run() {
        let prefix = vec(
            any::<u8>().prop_filter("non-alphanumeric", |b| !b.is_ascii_alphanumeric()),
            0..8,
        );
        let rest = (
            any::<u8>().prop_filter("alphanumeric", u8::is_ascii_alphanumeric),
            vec(any::<u8>(), 0..16),
        );
        let mut runner = deterministic_runner(256);
        runner
            .run(&(prefix, rest), |(prefix, (first, tail))| {
                let mut line = prefix.clone();
                line.push(first);
                line.extend_from_slice(&tail);

                let stripped = strip_leading_non_alnum(&line);
                prop_assert_eq!(stripped.len(), line.len() - prefix.len());
                prop_assert_eq!(stripped.first(), Some(&first));
                Ok(())
            })
            .expect("strip should only remove the leading run");
    }

    #[test]
    fn escape_is_identity_without_special_bytes() {
        let plain = vec(
            any::<u8>().prop_filter("no escapes", |b| *b != b'\\' && *b != b':'),
            0..32,
        );
        let mut runner = deterministic_runner(256);
        runner
            .run(&plain, |text| {
                prop_assert_eq!(&escape(&text)[..], &text[..]);
                Ok(())
            })
            .expect("escape should leave plain text unchanged");
    }

    #[test]
    fn escape_output_never_contains_bare_colon() {
        let mut runner = deterministic_runner(128);
        runner
            .run(&vec(any::<u8>(), 0..32), |text| {
                let escaped = escape(&text);
                let mut iter = escaped.iter();
                while let Some(&b) = iter.next() {
                    prop_assert!(b != b':', "bare colon in {escaped:?}");
                    if b == b'\\' {
                        let next = iter.next();
                        prop_assert!(matches!(next, Some(b'\\' | b':')));
                    }
                }
                Ok(())
            })
            .expect("escaped text should pair every escape");
    }
}
