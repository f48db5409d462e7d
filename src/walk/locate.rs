//! Locate-direction traversal: finds the `(start, end)` byte range a node
//! occupies in an encoded buffer without materialising its value,
//! otherwise following the same tag/length bookkeeping as decode.

use crate::config::DecodeOptions;
use crate::error::DecodeError;
use crate::leaf::{octet, oid};
use crate::length::decode_length;
use crate::tag::decode_tag;
use crate::tagengine::{self, peek_outer_tag, tag_children};
use crate::tree::{NodeKind, Tree};

/// Finds the `(start, end)` byte range `target` occupies in `input`,
/// without mutating `tree` or materialising any node's value. `end` is
/// the inclusive index of the element's last byte, not one-past-the-end.
///
/// Recursion depth is checked against `opts.max_depth`, guarding against a
/// schema tree whose `down`/`right` chain is accidentally circular.
pub fn locate_node<T: Tree>(
    tree: &T,
    input: &[u8],
    id: T::Id,
    target: T::Id,
    opts: &DecodeOptions,
) -> Result<(usize, usize), DecodeError> {
    let mut pos = 0usize;
    let mut found = None;
    walk(tree, input, &mut pos, id, target, opts, &mut found, 0)?;
    found.ok_or_else(|| DecodeError::ElementNotFound {
        name: alloc::format!("{target:?}"),
    })
}

fn tag_matches_at<T: Tree>(tree: &T, input: &[u8], pos: usize, id: T::Id) -> bool {
    match peek_outer_tag(tree, id) {
        None => false,
        Some((class, constructed, number)) => match input.get(pos..).map(decode_tag) {
            Some(Ok((c, cons, n, _))) => c == class && cons == constructed && n == number,
            _ => false,
        },
    }
}

fn walk<T: Tree>(
    tree: &T,
    input: &[u8],
    pos: &mut usize,
    id: T::Id,
    target: T::Id,
    opts: &DecodeOptions,
    found: &mut Option<(usize, usize)>,
    depth: usize,
) -> Result<(), DecodeError> {
    if depth > opts.max_depth {
        return Err(DecodeError::der(
            "schema tree nesting exceeds the configured maximum depth",
        ));
    }
    let flags = tree.flags(id);
    let kind = tree.kind(id);
    let start = *pos;

    let expected = {
        // locate never writes to scratch: explicit-wrapper bookkeeping
        // isn't needed since we never back-patch or verify lengths here,
        // only track offsets, so a throwaway scratch map is fine.
        let mut throwaway = crate::tree::Scratch::new();
        tagengine::decode_prefix(tree, &mut throwaway, input, pos, id, opts)?
    };

    if let Some((class, constructed, number)) = expected {
        let remaining = input
            .get(*pos..)
            .ok_or_else(|| DecodeError::der("position past end of input"))?;
        let peek = decode_tag(remaining);
        let matches = matches!(&peek, Ok((c, cons, n, _)) if *c == class && *cons == constructed && *n == number);
        if !matches {
            if flags.is_optional || flags.is_default {
                return Ok(());
            }
            return Err(DecodeError::Tag {
                expected: alloc::format!("{class}:{number}"),
                found: match &peek {
                    Ok((c, _, n, _)) => alloc::format!("{c}:{n}"),
                    Err(_) => alloc::string::String::from("truncated input"),
                },
            });
        }
        let (_, _, _, tag_len) = peek.expect("already matched above");
        *pos += tag_len;
    }

    match kind {
        NodeKind::Null => {
            let (len, len_len) = decode_length(&input[*pos..], opts)?;
            *pos += len_len + len;
        }
        NodeKind::Boolean | NodeKind::Integer | NodeKind::Enumerated => {
            let (len, len_len) = decode_length(&input[*pos..], opts)?;
            *pos += len_len + len;
        }
        NodeKind::ObjectId => {
            let (_, consumed) = oid::decode_object_identifier(&input[*pos..], opts)?;
            *pos += consumed;
        }
        NodeKind::Time => {
            let (_, consumed) = octet::decode_time(&input[*pos..], opts)?;
            *pos += consumed;
        }
        NodeKind::OctetString | NodeKind::BitString => {
            let (_, consumed) = octet::decode_octet_string(&input[*pos..], opts)?;
            *pos += consumed;
        }
        NodeKind::Any => {
            let remaining = input
                .get(*pos..)
                .ok_or_else(|| DecodeError::der("position past end of input"))?;
            let (_, _, _, tag_len) = decode_tag(remaining)?;
            let (content_len, len_len) = decode_length(&remaining[tag_len..], opts)?;
            *pos += tag_len + len_len + content_len;
        }
        NodeKind::Sequence => {
            let (len, len_len) = decode_length(&input[*pos..], opts)?;
            *pos += len_len;
            let projected_end = *pos + len;
            let mut child = tag_children(tree, id).1;
            while let Some(c) = child {
                if *pos >= projected_end {
                    break;
                }
                walk(tree, input, pos, c, target, opts, found, depth + 1)?;
                child = tree.right(c);
            }
            *pos = projected_end;
        }
        NodeKind::Set => {
            let (len, len_len) = decode_length(&input[*pos..], opts)?;
            *pos += len_len;
            let projected_end = *pos + len;

            // wire order within a SET need not match declaration order,
            // so (unlike SEQUENCE) each remaining child is tried against
            // the current position until one matches, the same
            // pool-with-removal approach decode uses, rather than a
            // single forward pass that would permanently skip a child
            // whose turn hasn't come up yet.
            let mut remaining = alloc::vec::Vec::new();
            let mut child = tag_children(tree, id).1;
            while let Some(c) = child {
                remaining.push(c);
                child = tree.right(c);
            }
            while *pos < projected_end {
                let hit = remaining
                    .iter()
                    .position(|&c| tag_matches_at(tree, input, *pos, c));
                let c = match hit {
                    Some(i) => remaining.remove(i),
                    None => break,
                };
                walk(tree, input, pos, c, target, opts, found, depth + 1)?;
            }
            *pos = projected_end;
        }
        NodeKind::SequenceOf | NodeKind::SetOf => {
            let (len, len_len) = decode_length(&input[*pos..], opts)?;
            *pos += len_len;
            let projected_end = *pos + len;
            let template = tag_children(tree, id).1;
            if let Some(t) = template {
                while *pos < projected_end {
                    walk(tree, input, pos, t, target, opts, found, depth + 1)?;
                }
            }
            *pos = projected_end;
        }
        NodeKind::Choice => {
            let mut child = tag_children(tree, id).1;
            while let Some(c) = child {
                let matched = tree.kind(c) == NodeKind::Any || tag_matches_at(tree, input, *pos, c);
                if matched {
                    walk(tree, input, pos, c, target, opts, found, depth + 1)?;
                    break;
                }
                child = tree.right(c);
            }
        }
        NodeKind::Tag | NodeKind::Size => {}
    }

    if id == target {
        // The end offset is inclusive (the index of the element's last
        // byte), matching the convention of reporting it at the moment
        // traversal leaves the node rightward.
        *found = Some((start, pos.saturating_sub(1)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Arena, NodeFlags};
    use pretty_assertions::assert_eq;

    #[test]
    fn locates_second_sequence_member() {
        let mut tree = Arena::new();
        let seq = tree.add_root(NodeKind::Sequence, NodeFlags::default(), Some("sequence"));
        let _field1 = tree.add_child(seq, NodeKind::Integer, NodeFlags::default(), Some("field1"));
        let field2 = tree.add_child(seq, NodeKind::Integer, NodeFlags::default(), Some("field2"));

        // SEQUENCE { INTEGER 1, INTEGER 42 }
        let wire = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x2A];
        let opts = DecodeOptions::der();
        let (start, end) = locate_node(&tree, &wire, seq, field2, &opts).unwrap();
        assert_eq!((start, end), (5, 7));
    }

    #[test]
    fn locates_set_member_declared_before_its_wire_position() {
        let mut tree = Arena::new();
        let set = tree.add_root(NodeKind::Set, NodeFlags::default(), Some("set"));
        let int = tree.add_child(set, NodeKind::Integer, NodeFlags::default(), Some("int"));
        let os = tree.add_child(set, NodeKind::OctetString, NodeFlags::default(), Some("os"));

        // wire has OCTET STRING before INTEGER, reversing declaration order.
        let wire = [0x31, 0x06, 0x04, 0x01, 0xAA, 0x02, 0x01, 0x2A];
        let opts = DecodeOptions::der();
        let (start, end) = locate_node(&tree, &wire, set, int, &opts).unwrap();
        assert_eq!((start, end), (5, 7));
        let (start, end) = locate_node(&tree, &wire, set, os, &opts).unwrap();
        assert_eq!((start, end), (2, 4));
    }

    #[test]
    fn nesting_beyond_max_depth_is_rejected() {
        let mut tree = Arena::new();
        let outer = tree.add_root(NodeKind::Sequence, NodeFlags::default(), Some("outer"));
        let inner = tree.add_child(outer, NodeKind::Sequence, NodeFlags::default(), Some("inner"));
        let n = tree.add_child(inner, NodeKind::Null, NodeFlags::default(), Some("n"));

        // SEQUENCE { SEQUENCE { NULL } }
        let wire = [0x30, 0x04, 0x30, 0x02, 0x05, 0x00];
        let shallow = DecodeOptions::der().max_depth(1);
        assert!(locate_node(&tree, &wire, outer, n, &shallow).is_err());

        let deep = DecodeOptions::der().max_depth(2);
        let (start, end) = locate_node(&tree, &wire, outer, n, &deep).unwrap();
        assert_eq!((start, end), (4, 5));
    }
}
