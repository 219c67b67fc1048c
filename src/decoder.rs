//! Incremental UTF-8 decoding for byte streams split at arbitrary offsets.

use std::char::REPLACEMENT_CHARACTER;

/// A streaming UTF-8 decoder.
///
/// Bytes are decoded as they arrive. A multi-byte sequence cut off at the
/// end of an input is held back until the next call completes it. Invalid
/// input never fails: each maximal invalid subsequence becomes U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    /// Valid prefix of a multi-byte sequence (at most 3 bytes).
    incomplete: Vec<u8>,
}

impl Utf8Decoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `input` into `out`, keeping an incomplete trailing sequence
    /// for the next call.
    pub fn decode(&mut self, input: &[u8], out: &mut String) {
        self.decode_inner(input, out, false);
    }

    /// Decode `input` into `out` and flush. An incomplete trailing sequence
    /// is replaced with U+FFFD.
    pub fn decode_final(&mut self, input: &[u8], out: &mut String) {
        self.decode_inner(input, out, true);
    }

    /// Number of undecoded bytes held back.
    pub fn pending_len(&self) -> usize {
        self.incomplete.len()
    }

    /// Drop any held-back bytes.
    pub fn reset(&mut self) {
        self.incomplete.clear();
    }

    fn decode_inner(&mut self, mut input: &[u8], out: &mut String, last: bool) {
        let mut replaced = 0;

        if !self.incomplete.is_empty() {
            input = self.complete_pending(input, out, &mut replaced);
            if !self.incomplete.is_empty() {
                // Input ran out before the sequence completed.
                if last {
                    self.incomplete.clear();
                    out.push(REPLACEMENT_CHARACTER);
                    replaced += 1;
                }
                log_replacements(replaced);
                return;
            }
        }

        let tail = push_lossy(input, out, &mut replaced);
        if !tail.is_empty() {
            if last {
                out.push(REPLACEMENT_CHARACTER);
                replaced += 1;
            } else {
                self.incomplete.extend_from_slice(tail);
            }
        }
        log_replacements(replaced);
    }

    /// Feed just enough of `input` to finish the held-back sequence and
    /// return the unconsumed rest.
    fn complete_pending<'a>(
        &mut self,
        input: &'a [u8],
        out: &mut String,
        replaced: &mut usize,
    ) -> &'a [u8] {
        let held = self.incomplete.len();
        let needed = sequence_width(self.incomplete[0])
            .saturating_sub(held)
            .min(input.len());
        self.incomplete.extend_from_slice(&input[..needed]);

        match std::str::from_utf8(&self.incomplete) {
            Ok(decoded) => {
                out.push_str(decoded);
                self.incomplete.clear();
                &input[needed..]
            }
            Err(error) => match error.error_len() {
                None => &input[needed..],
                Some(invalid) => {
                    out.push(REPLACEMENT_CHARACTER);
                    *replaced += 1;
                    self.incomplete.clear();
                    // The held bytes were a valid prefix, so the offending
                    // byte came from `input` and must be decoded again.
                    &input[invalid.saturating_sub(held)..]
                }
            },
        }
    }
}

/// Append the decodable part of `input` to `out`, replacing invalid
/// sequences, and return a trailing incomplete sequence if there is one.
fn push_lossy<'a>(mut input: &'a [u8], out: &mut String, replaced: &mut usize) -> &'a [u8] {
    loop {
        match std::str::from_utf8(input) {
            Ok(valid) => {
                out.push_str(valid);
                return &[];
            }
            Err(error) => {
                let (valid, rest) = input.split_at(error.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match error.error_len() {
                    Some(invalid) => {
                        out.push(REPLACEMENT_CHARACTER);
                        *replaced += 1;
                        input = &rest[invalid..];
                    }
                    None => return rest,
                }
            }
        }
    }
}

/// Encoded length implied by a UTF-8 lead byte.
fn sequence_width(lead: u8) -> usize {
    match lead {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 1,
    }
}

fn log_replacements(replaced: usize) {
    if replaced > 0 {
        tracing::debug!(replaced, "replaced invalid UTF-8 in event stream");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> String {
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        let (last, rest) = chunks.split_last().unwrap();
        for chunk in rest {
            decoder.decode(chunk, &mut out);
        }
        decoder.decode_final(last, &mut out);
        out
    }

    #[test]
    fn test_ascii_passthrough() {
        assert_eq!(decode_all(&[b"hello ", b"world"]), "hello world");
    }

    #[test]
    fn test_split_multibyte_sequence() {
        // Euro sign: E2 82 AC
        let euro = "€".as_bytes();
        assert_eq!(decode_all(&[b"Price: ", &euro[..2], &euro[2..], b"100"]), "Price: €100");
        assert_eq!(decode_all(&[&euro[..1], &euro[1..2], &euro[2..]]), "€");
    }

    #[test]
    fn test_four_byte_sequence_byte_by_byte() {
        let bytes = "a😀b".as_bytes();
        let chunks: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(decode_all(&chunks), "a😀b");
    }

    #[test]
    fn test_pending_bytes_are_held_back() {
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        decoder.decode(&"é".as_bytes()[..1], &mut out);
        assert_eq!(out, "");
        assert_eq!(decoder.pending_len(), 1);

        decoder.decode(&"é".as_bytes()[1..], &mut out);
        assert_eq!(out, "é");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        assert_eq!(decode_all(&[b"Valid start \xFF\xFE end"]), "Valid start \u{FFFD}\u{FFFD} end");
    }

    #[test]
    fn test_truncated_sequence_is_one_replacement() {
        assert_eq!(decode_all(&[b"\xE2\x82A"]), "\u{FFFD}A");
    }

    #[test]
    fn test_truncated_sequence_across_chunks() {
        assert_eq!(decode_all(&[b"\xE2", b"\x82", b"A"]), "\u{FFFD}A");
        assert_eq!(decode_all(&[b"\xE2", b"AB"]), "\u{FFFD}AB");
    }

    #[test]
    fn test_incomplete_sequence_flushed_on_final() {
        assert_eq!(decode_all(&[b"abc\xF0\x9F"]), "abc\u{FFFD}");
        assert_eq!(decode_all(&[b"abc\xF0", b"\x9F", b""]), "abc\u{FFFD}");
    }

    #[test]
    fn test_reset_drops_pending() {
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        decoder.decode(b"\xE2\x82", &mut out);
        decoder.reset();
        decoder.decode_final(b"x", &mut out);
        assert_eq!(out, "x");
    }
}
