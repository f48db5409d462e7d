//! BIT STRING wire encoding: the pad-count octet, always present, and
//! low-bit masking for non-byte-aligned bit strings.
//!
//! Masking uses `bitvec`'s `BitSlice`/`BitVec` APIs where that's a clean
//! fit for packing raw bits into bytes, but keeps a literal pad mask
//! table for the final-byte masking step rather than re-deriving it bit
//! by bit, since the table's exact values are themselves a tested
//! property.

use alloc::vec::Vec;

use crate::config::DecodeOptions;
use crate::error::{DecodeError, EncodeError};
use crate::length::{decode_length, encode_length};
use crate::outbuf::OutBuf;

const PAD_MASK: [u8; 8] = [0xFF, 0xFE, 0xFC, 0xF8, 0xF0, 0xE0, 0xC0, 0x80];

/// Writes a BIT STRING: `bytes` holds `bit_len` significant bits,
/// big-endian within each byte, optionally padded with don't-care bits in
/// the final byte.
pub fn encode_bit_string(
    out: &mut OutBuf<'_>,
    bytes: &[u8],
    bit_len: usize,
) -> Result<(), EncodeError> {
    let full_bytes = bit_len / 8;
    let has_partial = bit_len % 8 != 0;
    let len_byte = full_bytes + usize::from(has_partial);
    let len_pad = (8 - bit_len % 8) % 8;

    if bytes.len() < len_byte {
        return Err(EncodeError::generic(
            "BIT STRING payload shorter than its declared bit length",
        ));
    }

    encode_length(out, len_byte + 1)?;
    out.push(len_pad as u8)?;
    for (i, &b) in bytes[..len_byte].iter().enumerate() {
        let masked = if i + 1 == len_byte {
            b & PAD_MASK[len_pad]
        } else {
            b
        };
        out.push(masked)?;
    }
    Ok(())
}

/// Reads a BIT STRING. Returns `(payload bytes, bit_len, bytes consumed)`.
pub fn decode_bit_string<'a>(
    input: &'a [u8],
    opts: &DecodeOptions,
) -> Result<(&'a [u8], usize, usize), DecodeError> {
    let (len, len_consumed) = decode_length(input, opts)?;
    if len == 0 {
        // `encode_bit_string` never produces this (an empty BIT STRING
        // still carries its pad-count octet, `03 01 00`), but some BER
        // producers emit a bare zero-length BIT STRING; tolerate it on
        // decode without requiring it on encode.
        return Ok((&[], 0, len_consumed));
    }
    let content = input
        .get(len_consumed..len_consumed + len)
        .ok_or_else(|| DecodeError::der("BIT STRING content runs past input"))?;
    let pad = content[0];
    if pad > 7 {
        return Err(DecodeError::der("BIT STRING pad count greater than 7"));
    }
    let payload = &content[1..];
    let bit_len = 8 * payload.len() - pad as usize;
    Ok((payload, bit_len, len_consumed + len))
}

/// Utility used by tests and callers building payloads: packs a `bitvec`
/// bit sequence into the `(bytes, bit_len)` pair this module's functions
/// expect, zeroing the trailing don't-care bits the way `encode_bit_string`
/// requires of its caller.
pub fn pack_bits(bits: &bitvec::slice::BitSlice<u8, bitvec::order::Msb0>) -> (Vec<u8>, usize) {
    let mut owned: bitvec::vec::BitVec<u8, bitvec::order::Msb0> = bits.to_bitvec();
    owned.set_uninitialized(false);
    (owned.into_vec(), bits.len())
}
