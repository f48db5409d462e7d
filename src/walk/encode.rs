//! Encode-direction traversal: turns a populated schema tree into DER
//! bytes written through an [`OutBuf`].

use crate::error::EncodeError;
use crate::length::encode_length;
use crate::leaf::{oid, octet};
use crate::outbuf::OutBuf;
use crate::setsort;
use crate::tagengine::{self, tag_children};
use crate::tree::{NodeKind, Scratch, Tree};
use crate::walk::Canon;

/// Encodes `id` and everything under it into `out`.
pub fn encode_node<T: Tree>(
    tree: &T,
    scratch: &mut Scratch<T::Id>,
    out: &mut OutBuf<'_>,
    id: T::Id,
) -> Result<(), EncodeError> {
    let counter_old = out.position();
    tagengine::encode_prefix(tree, scratch, out, id)?;
    let flags = tree.flags(id);
    let kind = tree.kind(id);

    log::trace!("encode: {kind:?} at offset {counter_old}");

    // BOOLEAN/INTEGER/ENUMERATED with no value and a DEFAULT flag are
    // omitted entirely: roll the cursor back past the tag bytes just
    // written and drop any explicit-wrapper marks recorded for them.
    if flags.is_default && matches!(kind, NodeKind::Boolean | NodeKind::Integer | NodeKind::Enumerated) {
        let absent = tree.value(id).map_or(true, |v| v.is_empty());
        if absent {
            out.truncate_to(counter_old);
            tagengine::discard_explicit_marks(tree, scratch, id);
            return Ok(());
        }
    }

    match kind {
        NodeKind::Null => out.push(0)?,

        NodeKind::Boolean => {
            let value = tree.value(id);
            let is_false = value.map(|v| v.first() == Some(&b'F')).unwrap_or(false);
            out.push(0x01)?;
            out.push(if is_false { 0x00 } else { 0xFF })?;
        }

        NodeKind::Integer | NodeKind::Enumerated => {
            // The node's value already includes its own length prefix; the
            // schema tree owner is responsible for building it that way
            // since arbitrary-precision integer construction belongs to
            // that collaborator, not this codec.
            let bytes = tree
                .value(id)
                .ok_or_else(|| EncodeError::generic("INTEGER/ENUMERATED node has no value"))?;
            out.extend(bytes)?;
        }

        NodeKind::ObjectId => {
            let bytes = tree
                .value(id)
                .ok_or_else(|| EncodeError::generic("OBJECT IDENTIFIER node has no value"))?;
            let text = core::str::from_utf8(bytes)
                .map_err(|_| EncodeError::generic("OBJECT IDENTIFIER value is not UTF-8"))?;
            oid::encode_object_identifier(out, text)?;
        }

        NodeKind::Time => {
            let bytes = tree
                .value(id)
                .ok_or_else(|| EncodeError::generic("TIME node has no value"))?;
            octet::encode_time(out, bytes)?;
        }

        // BIT STRING's node value is expected to already be shaped as the
        // DER content would be (pad-count octet followed by masked
        // payload, for a non-empty string) — the same convention
        // `leaf::bitstring::decode_bit_string` hands back on decode, and
        // what `leaf::bitstring::pack_bits` produces from raw bits for
        // tree-builders. So writing it is just OCTET STRING's
        // length-then-payload.
        NodeKind::BitString | NodeKind::OctetString => {
            let bytes = tree
                .value(id)
                .ok_or_else(|| EncodeError::generic("OCTET STRING/BIT STRING node has no value"))?;
            octet::encode_octet_string(out, bytes)?;
        }

        NodeKind::Any => {
            // Stored as length(full element) || full element by the
            // decoder's capture-and-requote step; re-emitting it means
            // skipping that stored length prefix and writing the
            // already-complete element straight through.
            let value = tree
                .value(id)
                .ok_or_else(|| EncodeError::generic("ANY node has no captured value"))?;
            let opts = crate::config::DecodeOptions::der();
            let (len, len_len) = crate::length::decode_length(value, &opts)
                .map_err(|_| EncodeError::generic("ANY node's stored value is malformed"))?;
            let payload = value
                .get(len_len..len_len + len)
                .ok_or_else(|| EncodeError::generic("ANY node's stored value is truncated"))?;
            out.extend(payload)?;
        }

        NodeKind::Sequence => encode_constructed(tree, scratch, out, id, Canon::None)?,
        NodeKind::SequenceOf => encode_constructed(tree, scratch, out, id, Canon::None)?,
        NodeKind::Set => encode_constructed(tree, scratch, out, id, Canon::Set)?,
        NodeKind::SetOf => encode_constructed(tree, scratch, out, id, Canon::SetOf)?,

        NodeKind::Choice => {
            let chosen = select_choice_alternative(tree, id)?;
            encode_node(tree, scratch, out, chosen)?;
        }

        NodeKind::Tag | NodeKind::Size => {}
    }

    tagengine::complete_explicit_tags(tree, scratch, out, id)?;
    Ok(())
}

fn select_choice_alternative<T: Tree>(tree: &T, id: T::Id) -> Result<T::Id, EncodeError> {
    let mut child = tag_children(tree, id).1;
    while let Some(c) = child {
        if !tree.flags(c).is_not_used {
            return Ok(c);
        }
        child = tree.right(c);
    }
    Err(EncodeError::generic("CHOICE has no selected alternative"))
}

fn encode_constructed<T: Tree>(
    tree: &T,
    scratch: &mut Scratch<T::Id>,
    out: &mut OutBuf<'_>,
    id: T::Id,
    canon: Canon,
) -> Result<(), EncodeError> {
    let marker = out.position();
    let mut child = tag_children(tree, id).1;
    while let Some(c) = child {
        encode_node(tree, scratch, out, c)?;
        child = tree.right(c);
    }
    let end = out.position();

    match canon {
        Canon::None => {}
        Canon::Set => setsort::canonicalise_set(out.slice_mut(marker, end))?,
        Canon::SetOf => setsort::canonicalise_set_of(out.slice_mut(marker, end))?,
    }

    let content_len = end - marker;
    let mut len_buf = [0u8; 16];
    let mut len_out = OutBuf::new(&mut len_buf);
    encode_length(&mut len_out, content_len)?;
    out.insert_at(marker, &len_buf[..len_out.position()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Arena, NodeFlags};
    use pretty_assertions::assert_eq;

    // An INTEGER/ENUMERATED node's value is its DER content with the
    // content's own length prefix, but no tag octet — the tag is written
    // by `encode_prefix` from the node's kind, not carried in `value`.
    fn int_value(n: i64) -> alloc::vec::Vec<u8> {
        let bytes = n.to_be_bytes();
        let mut trimmed: &[u8] = &bytes;
        while trimmed.len() > 1
            && ((trimmed[0] == 0 && trimmed[1] & 0x80 == 0)
                || (trimmed[0] == 0xFF && trimmed[1] & 0x80 != 0))
        {
            trimmed = &trimmed[1..];
        }
        let mut out = alloc::vec![trimmed.len() as u8];
        out.extend_from_slice(trimmed);
        out
    }

    #[test]
    fn sequence_of_two_integers() {
        let mut tree = Arena::new();
        let seq = tree.add_root(NodeKind::Sequence, NodeFlags::default(), Some("seq"));
        let a = tree.add_child(seq, NodeKind::Integer, NodeFlags::default(), Some("a"));
        let b = tree.add_child(seq, NodeKind::Integer, NodeFlags::default(), Some("b"));
        tree.set_value_owned(a, int_value(1));
        tree.set_value_owned(b, int_value(0));

        let mut scratch = Scratch::new();
        let mut buf = [0u8; 32];
        let mut out = OutBuf::new(&mut buf);
        encode_node(&tree, &mut scratch, &mut out, seq).unwrap();
        assert_eq!(
            out.written(),
            &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x00]
        );
    }

    #[test]
    fn set_reorders_by_tag() {
        let mut tree = Arena::new();
        let set = tree.add_root(NodeKind::Set, NodeFlags::default(), Some("set"));
        let os = tree.add_child(set, NodeKind::OctetString, NodeFlags::default(), Some("os"));
        let int = tree.add_child(set, NodeKind::Integer, NodeFlags::default(), Some("int"));
        tree.set_value_owned(os, alloc::vec![0xAA]);
        tree.set_value_owned(int, int_value(0x2A));

        let mut scratch = Scratch::new();
        let mut buf = [0u8; 32];
        let mut out = OutBuf::new(&mut buf);
        encode_node(&tree, &mut scratch, &mut out, set).unwrap();
        assert_eq!(
            out.written(),
            &[0x31, 0x06, 0x02, 0x01, 0x2A, 0x04, 0x01, 0xAA]
        );
    }

    #[test]
    fn null_encodes_as_bare_tag_and_zero_length() {
        let mut tree = Arena::new();
        let n = tree.add_root(NodeKind::Null, NodeFlags::default(), Some("n"));
        let mut scratch = Scratch::new();
        let mut buf = [0u8; 4];
        let mut out = OutBuf::new(&mut buf);
        encode_node(&tree, &mut scratch, &mut out, n).unwrap();
        assert_eq!(out.written(), &[0x05, 0x00]);
    }
}
