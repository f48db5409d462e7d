//! OBJECT IDENTIFIER wire encoding: arcs as space-separated decimal in the
//! node's value, base-128 big-endian on the wire.
//!
//! Per-arc accumulation uses `num_bigint::BigUint` rather than a native
//! integer so arcs larger than `u32` (legal in ASN.1, and exercised by
//! some PKI OIDs) round-trip correctly — the same technique used
//! elsewhere in this codec's lineage for the structurally similar
//! problem of accumulating a multi-byte tag number over 7-bit
//! continuation octets, there with `num_bigint::BigInt`.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

use crate::config::DecodeOptions;
use crate::error::{DecodeError, EncodeError};
use crate::length::{decode_length, encode_length};
use crate::outbuf::OutBuf;

/// Writes an OBJECT IDENTIFIER given as a space-separated decimal arc
/// string, e.g. `"1 2 840 113549 1 1 11"`.
pub fn encode_object_identifier(out: &mut OutBuf<'_>, value: &str) -> Result<(), EncodeError> {
    let arcs = parse_arcs(value).map_err(EncodeError::generic)?;
    if arcs.len() < 2 {
        return Err(EncodeError::generic(
            "OBJECT IDENTIFIER needs at least two arcs",
        ));
    }

    let first_octet = (&arcs[0] * 40u32 + &arcs[1])
        .to_u8()
        .ok_or_else(|| EncodeError::generic("first two OID arcs overflow a single octet"))?;

    let mut content = Vec::new();
    content.push(first_octet);
    for arc in &arcs[2..] {
        encode_base128_biguint(&mut content, arc);
    }

    encode_length(out, content.len())?;
    out.extend(&content)
}

/// Reads an OBJECT IDENTIFIER, returning `(decimal arc string, bytes consumed)`.
pub fn decode_object_identifier(
    input: &[u8],
    opts: &DecodeOptions,
) -> Result<(String, usize), DecodeError> {
    let (len, len_consumed) = decode_length(input, opts)?;
    let content = input
        .get(len_consumed..len_consumed + len)
        .ok_or_else(|| DecodeError::der("OBJECT IDENTIFIER content runs past input"))?;
    if content.is_empty() {
        return Err(DecodeError::der("empty OBJECT IDENTIFIER"));
    }

    let first_octet = content[0];
    let a0 = first_octet / 40;
    let a1 = first_octet - 40 * a0;
    let mut arcs = alloc::vec![format!("{a0}"), format!("{a1}")];

    let mut rest = &content[1..];
    while !rest.is_empty() {
        let (value, consumed) = decode_base128_biguint(rest)?;
        arcs.push(value.to_string());
        rest = &rest[consumed..];
    }

    Ok((arcs.join(" "), len_consumed + len))
}

fn parse_arcs(value: &str) -> Result<Vec<BigUint>, String> {
    if value.is_empty() {
        return Err("OBJECT IDENTIFIER string is empty".into());
    }
    if value.starts_with(' ') || value.ends_with(' ') || value.contains("  ") {
        // Reject leading/trailing/doubled spaces rather than silently
        // collapsing them.
        return Err("OBJECT IDENTIFIER string has malformed spacing".into());
    }
    value
        .split(' ')
        .map(|arc| {
            arc.parse::<BigUint>()
                .map_err(|_| format!("'{arc}' is not a valid OID arc"))
        })
        .collect()
}

fn encode_base128_biguint(out: &mut Vec<u8>, value: &BigUint) {
    if value.is_zero() {
        out.push(0);
        return;
    }
    let radix = BigUint::from(128u32);
    let mut digits = Vec::new();
    let mut v = value.clone();
    while !v.is_zero() {
        let rem = (&v % &radix).to_u8().expect("remainder mod 128 fits u8");
        digits.push(rem);
        v /= &radix;
    }
    digits.reverse();
    let last = digits.len() - 1;
    for (i, d) in digits.iter().enumerate() {
        out.push(if i < last { d | 0x80 } else { *d });
    }
}

fn decode_base128_biguint(input: &[u8]) -> Result<(BigUint, usize), DecodeError> {
    let mut value = BigUint::zero();
    let mut consumed = 0usize;
    loop {
        let &byte = input
            .get(consumed)
            .ok_or_else(|| DecodeError::der("truncated OID arc"))?;
        value = (value << 7u32) + BigUint::from(byte & 0x7F);
        consumed += 1;
        if byte & 0x80 == 0 {
            break;
        }
    }
    Ok((value, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rsa_encryption_oid_matches_known_wire_bytes() {
        let mut buf = [0u8; 16];
        let mut out = OutBuf::new(&mut buf);
        encode_object_identifier(&mut out, "1 2 840 113549 1 1 11").unwrap();
        let written = out.position();
        assert_eq!(
            &buf[..written],
            &[0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B]
        );

        let opts = DecodeOptions::der();
        let (decoded, consumed) = decode_object_identifier(&buf[..written], &opts).unwrap();
        assert_eq!(decoded, "1 2 840 113549 1 1 11");
        assert_eq!(consumed, written);
    }

    #[test]
    fn rejects_malformed_spacing() {
        let mut buf = [0u8; 16];
        let mut out = OutBuf::new(&mut buf);
        assert!(encode_object_identifier(&mut out, " 1 2").is_err());
        assert!(encode_object_identifier(&mut out, "1  2").is_err());
        assert!(encode_object_identifier(&mut out, "1 2 ").is_err());
    }

    #[test]
    fn zero_arc_is_single_octet() {
        let mut buf = [0u8; 8];
        let mut out = OutBuf::new(&mut buf);
        encode_object_identifier(&mut out, "0 0").unwrap();
        assert_eq!(&buf[..out.position()], &[0x01, 0x00]);
    }
}
