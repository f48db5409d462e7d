//! OCTET STRING and TIME wire encoding.
//!
//! Both are length-prefixed raw payloads; TIME additionally carries a NUL
//! terminator in the node's logical value, mirrored on decode by
//! appending one to the returned bytes — the same null-terminate-for-
//! interop convention C-facing string types use at an FFI boundary,
//! generalized here to TIME's NUL-terminated wire-adjacent form.

use alloc::vec::Vec;

use crate::error::{DecodeError, EncodeError};
use crate::length::{decode_length, encode_length};
use crate::outbuf::OutBuf;
use crate::config::DecodeOptions;

/// Writes a length-prefixed payload (OCTET STRING content encoding).
pub fn encode_octet_string(out: &mut OutBuf<'_>, payload: &[u8]) -> Result<(), EncodeError> {
    encode_length(out, payload.len())?;
    out.extend(payload)
}

/// Reads a length-prefixed payload. Returns `(payload, bytes consumed)`.
pub fn decode_octet_string<'a>(
    input: &'a [u8],
    opts: &DecodeOptions,
) -> Result<(&'a [u8], usize), DecodeError> {
    let (len, len_consumed) = decode_length(input, opts)?;
    let payload = input
        .get(len_consumed..len_consumed + len)
        .ok_or_else(|| DecodeError::der("OCTET STRING content runs past input"))?;
    Ok((payload, len_consumed + len))
}

/// Writes a TIME value: the NUL-terminated contents of the node's value.
pub fn encode_time(out: &mut OutBuf<'_>, value: &[u8]) -> Result<(), EncodeError> {
    let payload = value.strip_suffix(&[0u8]).unwrap_or(value);
    encode_octet_string(out, payload)
}

/// Reads a TIME value, appending the terminating NUL the node's logical
/// value is expected to carry. Returns `(owned NUL-terminated bytes,
/// bytes consumed)`.
pub fn decode_time(input: &[u8], opts: &DecodeOptions) -> Result<(Vec<u8>, usize), DecodeError> {
    let (payload, consumed) = decode_octet_string(input, opts)?;
    let mut owned = Vec::with_capacity(payload.len() + 1);
    owned.extend_from_slice(payload);
    owned.push(0);
    Ok((owned, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn octet_string_roundtrip() {
        let mut buf = [0u8; 16];
        let mut out = OutBuf::new(&mut buf);
        encode_octet_string(&mut out, b"hello").unwrap();
        let written = out.position();
        let opts = DecodeOptions::der();
        let (payload, consumed) = decode_octet_string(&buf[..written], &opts).unwrap();
        assert_eq!(payload, b"hello");
        assert_eq!(consumed, written);
    }

    #[test]
    fn time_round_trip_adds_and_strips_nul() {
        let mut buf = [0u8; 32];
        let mut out = OutBuf::new(&mut buf);
        encode_time(&mut out, b"20240101Z\0").unwrap();
        let written = out.position();
        assert_eq!(&buf[..written], b"\x0920240101Z" as &[u8]);

        let opts = DecodeOptions::der();
        let (decoded, consumed) = decode_time(&buf[..written], &opts).unwrap();
        assert_eq!(decoded, b"20240101Z\0");
        assert_eq!(consumed, written);
    }
}
