//! Decode-direction traversal: walks a schema tree in step with an input
//! buffer, populating node values as it matches wire tags against what
//! the schema expects.

use alloc::vec::Vec;

use crate::config::DecodeOptions;
use crate::error::DecodeError;
use crate::leaf::{octet, oid};
use crate::length::{decode_length, encode_length};
use crate::outbuf::OutBuf;
use crate::tag::decode_tag;
use crate::tagengine::{self, peek_outer_tag, tag_children};
use crate::tree::{NodeKind, Scratch, Tree};

/// Decodes `input` into `id` and everything under it, advancing `*pos`.
/// Recursion depth is checked against `opts.max_depth`, guarding against a
/// schema tree whose `down`/`right` chain is accidentally circular.
pub fn decode_node<T: Tree>(
    tree: &mut T,
    scratch: &mut Scratch<T::Id>,
    input: &[u8],
    pos: &mut usize,
    id: T::Id,
    opts: &DecodeOptions,
) -> Result<(), DecodeError> {
    decode_node_at_depth(tree, scratch, input, pos, id, opts, 0)
}

fn decode_node_at_depth<T: Tree>(
    tree: &mut T,
    scratch: &mut Scratch<T::Id>,
    input: &[u8],
    pos: &mut usize,
    id: T::Id,
    opts: &DecodeOptions,
    depth: usize,
) -> Result<(), DecodeError> {
    if depth > opts.max_depth {
        return Err(DecodeError::der(
            "schema tree nesting exceeds the configured maximum depth",
        ));
    }
    let flags = tree.flags(id);
    let kind = tree.kind(id);

    let expected = tagengine::decode_prefix(tree, scratch, input, pos, id, opts)?;

    if let Some((class, constructed, number)) = expected {
        let remaining = input
            .get(*pos..)
            .ok_or_else(|| DecodeError::der("position past end of input"))?;
        let peek = decode_tag(remaining);
        let matches = matches!(&peek, Ok((c, cons, n, _)) if *c == class && *cons == constructed && *n == number);

        if !matches {
            if flags.is_optional {
                log::debug!("decode: optional {kind:?} absent, skipping");
                tree.set_not_used(id, true);
                return Ok(());
            }
            if flags.is_default {
                log::debug!("decode: defaulted {kind:?} absent, using default");
                tree.set_value(id, &[]);
                return Ok(());
            }
            let found = match &peek {
                Ok((c, _, n, _)) => alloc::format!("{c}:{n}"),
                Err(_) => alloc::string::String::from("truncated input"),
            };
            return Err(DecodeError::Tag {
                expected: alloc::format!("{class}:{number}"),
                found,
            });
        }

        let (_, _, _, tag_len) = peek.expect("already matched above");
        *pos += tag_len;
    }

    match kind {
        NodeKind::Null => {
            let (len, len_len) = decode_length(&input[*pos..], opts)?;
            *pos += len_len;
            if len != 0 {
                return Err(DecodeError::der("NULL with non-zero length"));
            }
        }

        NodeKind::Boolean => {
            let (len, len_len) = decode_length(&input[*pos..], opts)?;
            *pos += len_len;
            if len != 1 {
                return Err(DecodeError::der("BOOLEAN content must be exactly one octet"));
            }
            let content = input
                .get(*pos..*pos + len)
                .ok_or_else(|| DecodeError::der("BOOLEAN content runs past input"))?;
            tree.set_value(id, if content[0] == 0 { b"F" } else { b"T" });
            *pos += len;
        }

        NodeKind::Integer | NodeKind::Enumerated => {
            let (len, len_len) = decode_length(&input[*pos..], opts)?;
            let total = len_len + len;
            let raw = input
                .get(*pos..*pos + total)
                .ok_or_else(|| DecodeError::der("INTEGER/ENUMERATED content runs past input"))?;
            tree.set_value(id, raw);
            *pos += total;
        }

        NodeKind::ObjectId => {
            let (text, consumed) = oid::decode_object_identifier(&input[*pos..], opts)?;
            tree.set_value(id, text.as_bytes());
            *pos += consumed;
        }

        NodeKind::Time => {
            let (owned, consumed) = octet::decode_time(&input[*pos..], opts)?;
            tree.set_value(id, &owned);
            *pos += consumed;
        }

        // See the matching comment in `walk::encode`: BIT STRING's value
        // is stored as the raw DER content (pad octet + payload for a
        // non-empty string), same shape as OCTET STRING's content.
        NodeKind::OctetString | NodeKind::BitString => {
            let (payload, consumed) = octet::decode_octet_string(&input[*pos..], opts)?;
            tree.set_value(id, payload);
            *pos += consumed;
        }

        NodeKind::Any => {
            decode_any(tree, input, pos, id, opts)?;
        }

        NodeKind::Sequence => {
            let (len, len_len) = decode_length(&input[*pos..], opts)?;
            *pos += len_len;
            let projected_end = *pos + len;
            decode_sequence_children(tree, scratch, input, pos, id, opts, depth + 1)?;
            if *pos != projected_end {
                return Err(DecodeError::der("SEQUENCE content length mismatch"));
            }
        }

        NodeKind::Set => {
            let (len, len_len) = decode_length(&input[*pos..], opts)?;
            *pos += len_len;
            let projected_end = *pos + len;
            decode_set_children(tree, scratch, input, pos, id, projected_end, opts, depth + 1)?;
        }

        NodeKind::SequenceOf | NodeKind::SetOf => {
            let (len, len_len) = decode_length(&input[*pos..], opts)?;
            *pos += len_len;
            let projected_end = *pos + len;
            decode_repeated(tree, scratch, input, pos, id, projected_end, opts, depth + 1)?;
            if *pos != projected_end {
                return Err(DecodeError::der("SEQUENCE OF/SET OF content length mismatch"));
            }
        }

        NodeKind::Choice => {
            match decode_choice(tree, scratch, input, pos, id, opts, depth + 1) {
                Ok(()) => {}
                Err(DecodeError::Der { .. }) if flags.is_optional => {
                    tree.set_not_used(id, true);
                }
                Err(DecodeError::Der { .. }) if flags.is_default => {
                    tree.set_value(id, &[]);
                }
                Err(e) => return Err(e),
            }
        }

        NodeKind::Tag | NodeKind::Size => {}
    }

    tagengine::verify_explicit_tags_end(tree, scratch, *pos, id)?;
    Ok(())
}

fn decode_any<T: Tree>(
    tree: &mut T,
    input: &[u8],
    pos: &mut usize,
    id: T::Id,
    opts: &DecodeOptions,
) -> Result<(), DecodeError> {
    let start = *pos;
    let remaining = input
        .get(start..)
        .ok_or_else(|| DecodeError::der("position past end of input"))?;
    let (_, _, _, tag_len) = decode_tag(remaining)?;
    let (content_len, len_len) = decode_length(&remaining[tag_len..], opts)?;
    let total = tag_len + len_len + content_len;
    let full_element = input
        .get(start..start + total)
        .ok_or_else(|| DecodeError::der("ANY element runs past input"))?;

    let mut header = [0u8; 16];
    let mut header_out = OutBuf::new(&mut header);
    encode_length(&mut header_out, total)
        .map_err(|_| DecodeError::generic("ANY element is too large to re-encode a length for"))?;

    let mut value = Vec::with_capacity(header_out.position() + total);
    value.extend_from_slice(&header[..header_out.position()]);
    value.extend_from_slice(full_element);
    tree.set_value(id, &value);
    *pos = start + total;
    Ok(())
}

fn decode_sequence_children<T: Tree>(
    tree: &mut T,
    scratch: &mut Scratch<T::Id>,
    input: &[u8],
    pos: &mut usize,
    parent: T::Id,
    opts: &DecodeOptions,
    depth: usize,
) -> Result<(), DecodeError> {
    let mut child = tag_children(tree, parent).1;
    while let Some(c) = child {
        decode_node_at_depth(tree, scratch, input, pos, c, opts, depth)?;
        child = tree.right(c);
    }
    Ok(())
}

fn decode_set_children<T: Tree>(
    tree: &mut T,
    scratch: &mut Scratch<T::Id>,
    input: &[u8],
    pos: &mut usize,
    parent: T::Id,
    projected_end: usize,
    opts: &DecodeOptions,
    depth: usize,
) -> Result<(), DecodeError> {
    let mut remaining: Vec<T::Id> = Vec::new();
    let mut child = tag_children(tree, parent).1;
    while let Some(c) = child {
        remaining.push(c);
        child = tree.right(c);
    }

    while *pos < projected_end {
        let mut matched = None;
        for (i, &cand) in remaining.iter().enumerate() {
            if set_member_matches(tree, input, *pos, cand) {
                matched = Some(i);
                break;
            }
        }
        let cand = match matched {
            Some(i) => remaining.remove(i),
            None => {
                return Err(DecodeError::der(
                    "no remaining SET member matches the next wire tag",
                ))
            }
        };
        decode_node_at_depth(tree, scratch, input, pos, cand, opts, depth)?;
    }

    if *pos > projected_end {
        return Err(DecodeError::der("SET content overran its declared length"));
    }

    for cand in remaining {
        let flags = tree.flags(cand);
        if flags.is_optional {
            tree.set_not_used(cand, true);
        } else if flags.is_default {
            tree.set_value(cand, &[]);
        } else {
            return Err(DecodeError::der("required SET member is missing"));
        }
    }
    Ok(())
}

fn set_member_matches<T: Tree>(tree: &T, input: &[u8], pos: usize, id: T::Id) -> bool {
    match peek_outer_tag(tree, id) {
        None => false,
        Some((class, constructed, number)) => match decode_tag(input.get(pos..).unwrap_or(&[])) {
            Ok((c, cons, n, _)) => c == class && cons == constructed && n == number,
            Err(_) => false,
        },
    }
}

fn decode_repeated<T: Tree>(
    tree: &mut T,
    scratch: &mut Scratch<T::Id>,
    input: &[u8],
    pos: &mut usize,
    parent: T::Id,
    projected_end: usize,
    opts: &DecodeOptions,
    depth: usize,
) -> Result<(), DecodeError> {
    let mut current = tag_children(tree, parent).1;
    loop {
        if *pos >= projected_end {
            return Ok(());
        }
        let node = current.ok_or_else(|| {
            DecodeError::generic("SEQUENCE OF/SET OF has no template element to decode into")
        })?;
        decode_node_at_depth(tree, scratch, input, pos, node, opts, depth)?;
        if *pos >= projected_end {
            return Ok(());
        }
        current = Some(tree.append_sequence_set(parent));
    }
}

fn decode_choice<T: Tree>(
    tree: &mut T,
    scratch: &mut Scratch<T::Id>,
    input: &[u8],
    pos: &mut usize,
    id: T::Id,
    opts: &DecodeOptions,
    depth: usize,
) -> Result<(), DecodeError> {
    let mut alternatives = Vec::new();
    let mut child = tag_children(tree, id).1;
    while let Some(c) = child {
        alternatives.push(c);
        child = tree.right(c);
    }

    let mut chosen = None;
    for &cand in &alternatives {
        let is_any = tree.kind(cand) == NodeKind::Any;
        let matched = if is_any {
            true
        } else {
            match peek_outer_tag(tree, cand) {
                None => false,
                Some((class, constructed, number)) => {
                    matches!(
                        input.get(*pos..).map(decode_tag),
                        Some(Ok((c, cons, n, _))) if c == class && cons == constructed && n == number
                    )
                }
            }
        };
        if matched {
            chosen = Some(cand);
            break;
        }
        log::debug!("decode: CHOICE alternative rejected, trying next");
    }

    let chosen = chosen.ok_or_else(|| DecodeError::der("no CHOICE alternative matched"))?;
    let chosen_is_any = tree.kind(chosen) == NodeKind::Any;

    for &cand in &alternatives {
        if cand != chosen {
            tree.set_not_used(cand, true);
        }
    }

    decode_node_at_depth(tree, scratch, input, pos, chosen, opts, depth)?;

    if chosen_is_any {
        log::debug!("decode: CHOICE resolved to an unresolved ANY alternative");
        return Err(DecodeError::TypeAny);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Arena, NodeFlags};
    use pretty_assertions::assert_eq;

    #[test]
    fn sequence_of_two_integers_round_trips() {
        let mut tree = Arena::new();
        let seq = tree.add_root(NodeKind::Sequence, NodeFlags::default(), Some("seq"));
        let a = tree.add_child(seq, NodeKind::Integer, NodeFlags::default(), Some("a"));
        let b = tree.add_child(seq, NodeKind::Integer, NodeFlags::default(), Some("b"));

        let wire = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x00];
        let mut scratch = Scratch::new();
        let mut pos = 0;
        let opts = DecodeOptions::der();
        decode_node(&mut tree, &mut scratch, &wire, &mut pos, seq, &opts).unwrap();
        assert_eq!(pos, wire.len());
        assert_eq!(tree.value(a), Some(&[0x01, 0x01][..]));
        assert_eq!(tree.value(b), Some(&[0x01, 0x00][..]));
    }

    #[test]
    fn null_rejects_non_zero_length() {
        let mut tree = Arena::new();
        let n = tree.add_root(NodeKind::Null, NodeFlags::default(), Some("n"));
        let wire = [0x05, 0x01, 0x00];
        let mut scratch = Scratch::new();
        let mut pos = 0;
        let opts = DecodeOptions::der();
        assert!(decode_node(&mut tree, &mut scratch, &wire, &mut pos, n, &opts).is_err());
    }

    #[test]
    fn set_members_resolve_out_of_wire_order() {
        let mut tree = Arena::new();
        let set = tree.add_root(NodeKind::Set, NodeFlags::default(), Some("set"));
        let int = tree.add_child(set, NodeKind::Integer, NodeFlags::default(), Some("int"));
        let os = tree.add_child(set, NodeKind::OctetString, NodeFlags::default(), Some("os"));

        // wire has OCTET STRING before INTEGER; schema declares the reverse.
        let wire = [0x31, 0x06, 0x04, 0x01, 0xAA, 0x02, 0x01, 0x2A];
        let mut scratch = Scratch::new();
        let mut pos = 0;
        let opts = DecodeOptions::der();
        decode_node(&mut tree, &mut scratch, &wire, &mut pos, set, &opts).unwrap();
        assert_eq!(pos, wire.len());
        assert_eq!(tree.value(int), Some(&[0x01, 0x2A][..]));
        assert_eq!(tree.value(os), Some(&[0xAA][..]));
    }

    #[test]
    fn nesting_beyond_max_depth_is_rejected() {
        let mut tree = Arena::new();
        let outer = tree.add_root(NodeKind::Sequence, NodeFlags::default(), Some("outer"));
        let inner = tree.add_child(outer, NodeKind::Sequence, NodeFlags::default(), Some("inner"));
        let _n = tree.add_child(inner, NodeKind::Null, NodeFlags::default(), Some("n"));

        // SEQUENCE { SEQUENCE { NULL } }
        let wire = [0x30, 0x04, 0x30, 0x02, 0x05, 0x00];
        let mut scratch = Scratch::new();
        let mut pos = 0;
        let opts = DecodeOptions::der().max_depth(1);
        assert!(decode_node(&mut tree, &mut scratch, &wire, &mut pos, outer, &opts).is_err());

        let mut tree = Arena::new();
        let outer = tree.add_root(NodeKind::Sequence, NodeFlags::default(), Some("outer"));
        let inner = tree.add_child(outer, NodeKind::Sequence, NodeFlags::default(), Some("inner"));
        let _n = tree.add_child(inner, NodeKind::Null, NodeFlags::default(), Some("n"));
        let mut scratch = Scratch::new();
        let mut pos = 0;
        let opts = DecodeOptions::der().max_depth(2);
        decode_node(&mut tree, &mut scratch, &wire, &mut pos, outer, &opts).unwrap();
    }
}
