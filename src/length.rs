//! DER length octets: shortest-form short/long encoding.
//!
//! Short-vs-long dispatch and minimal byte count on encode, long-form
//! accumulation on decode, adapted to a fixed-buffer cursor rather than a
//! streaming-combinator parser, and rejecting the indefinite-length form
//! by default (DER forbids it; BER permits it).

use alloc::vec::Vec;

use crate::config::DecodeOptions;
use crate::error::{DecodeError, EncodeError};
use crate::outbuf::OutBuf;

/// Writes the shortest-form DER length for `n`.
pub fn encode_length(out: &mut OutBuf<'_>, n: usize) -> Result<(), EncodeError> {
    if n < 0x80 {
        return out.push(n as u8);
    }
    let bytes = be_minimal(n);
    out.push(0x80 | bytes.len() as u8)?;
    out.extend(&bytes)
}

fn be_minimal(mut n: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    while n != 0 {
        bytes.push((n & 0xFF) as u8);
        n >>= 8;
    }
    bytes.reverse();
    bytes
}

/// Reads a DER length. Returns `(value, bytes consumed)`.
///
/// `0x80` (indefinite length) is rejected with `DecodeError::Der` unless
/// `opts.allow_indefinite_length` opts into the lenient, non-DER behaviour
/// of treating it as a zero-length long form, as an explicit, named
/// opt-in rather than a silent fallthrough.
pub fn decode_length(input: &[u8], opts: &DecodeOptions) -> Result<(usize, usize), DecodeError> {
    let &first = input
        .first()
        .ok_or_else(|| DecodeError::der("truncated length octet"))?;

    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let k = (first & 0x7F) as usize;
    if k == 0 {
        if opts.allow_indefinite_length {
            return Ok((0, 1));
        }
        return Err(DecodeError::der(
            "indefinite length (0x80) is not valid DER",
        ));
    }

    let bytes = input
        .get(1..1 + k)
        .ok_or_else(|| DecodeError::der("truncated long-form length"))?;
    let mut value: usize = 0;
    for &b in bytes {
        value = value
            .checked_shl(8)
            .and_then(|v| v.checked_add(b as usize))
            .ok_or_else(|| DecodeError::der("length overflows usize"))?;
    }
    Ok((value, 1 + k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn roundtrip(n: usize) {
        let mut buf = [0u8; 16];
        let mut out = OutBuf::new(&mut buf);
        encode_length(&mut out, n).unwrap();
        let written = out.position();
        let opts = DecodeOptions::der();
        let (decoded, consumed) = decode_length(&buf[..written], &opts).unwrap();
        assert_eq!((decoded, consumed), (n, written));
    }

    #[test]
    fn involution_over_range() {
        for n in [0usize, 1, 127, 128, 255, 256, 65535, 65536, 1 << 20, 1 << 31] {
            roundtrip(n);
        }
    }

    #[test]
    fn shortest_form() {
        let mut buf = [0u8; 8];
        let mut out = OutBuf::new(&mut buf);
        encode_length(&mut out, 6).unwrap();
        assert_eq!(&buf[..out.position()], &[0x06]);

        let mut buf = [0u8; 8];
        let mut out = OutBuf::new(&mut buf);
        encode_length(&mut out, 256).unwrap();
        assert_eq!(&buf[..out.position()], &[0x82, 0x01, 0x00]);
    }

    #[test]
    fn indefinite_length_rejected_by_default() {
        let opts = DecodeOptions::der();
        assert!(decode_length(&[0x80], &opts).is_err());
    }

    #[test]
    fn indefinite_length_tolerated_when_enabled() {
        let opts = DecodeOptions::der().allow_indefinite_length(true);
        assert_eq!(decode_length(&[0x80], &opts).unwrap(), (0, 1));
    }
}
