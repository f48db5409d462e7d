//! The TAG-chain resolver: walks a node's `TAG` children to resolve
//! explicit/implicit tagging into the actual wire tag(s), and back-patches
//! explicit wrapper lengths once their content is known.
//!
//! Resolving explicit/implicit tagging over a runtime *tree of tag
//! modifiers*, rather than at compile time the way a derive-macro ASN.1
//! framework would, has no direct analogue to crib from; this module
//! keeps an `encode`-shaped and a `decode`-shaped function side by side
//! rather than unifying them behind one generic pass, the same way BER
//! encoding and decoding elsewhere in this crate's lineage live in
//! separate modules instead of a shared visitor.

use alloc::format;
use alloc::vec::Vec;

use crate::config::DecodeOptions;
use crate::error::{DecodeError, EncodeError};
use crate::length::{decode_length, encode_length};
use crate::outbuf::OutBuf;
use crate::tag::{decode_tag, encode_tag, universal_tag, Class};
use crate::tree::{NodeKind, Scratch, Tree};

/// Splits `id`'s `down`-chain into its leading `TAG` children (in
/// declaration order, `SIZE` children skipped) and the first child after
/// that chain — the node's real content child, for constructed kinds.
pub(crate) fn tag_children<T: Tree>(tree: &T, id: T::Id) -> (Vec<T::Id>, Option<T::Id>) {
    let mut tags = Vec::new();
    let mut cur = tree.down(id);
    while let Some(c) = cur {
        match tree.kind(c) {
            NodeKind::Tag => tags.push(c),
            NodeKind::Size => {}
            _ => return (tags, Some(c)),
        }
        cur = tree.right(c);
    }
    (tags, None)
}

fn tag_number<T: Tree>(tree: &T, tag_id: T::Id) -> Option<u32> {
    let bytes = tree.value(tag_id)?;
    let text = core::str::from_utf8(bytes).ok()?;
    text.trim().parse().ok()
}

/// Writes the full (possibly wrapped) tag prefix for `id` and records any
/// explicit wrapper start offsets in `scratch` for later completion by
/// [`complete_explicit_tags`].
pub(crate) fn encode_prefix<T: Tree>(
    tree: &T,
    scratch: &mut Scratch<T::Id>,
    out: &mut OutBuf<'_>,
    id: T::Id,
) -> Result<(), EncodeError> {
    let (tag_chain, _) = tag_children(tree, id);
    let mut pending: Option<(Class, u32)> = None;

    for tag_id in &tag_chain {
        let flags = tree.flags(*tag_id);
        let number = tag_number(tree, *tag_id)
            .ok_or_else(|| EncodeError::generic("TAG node missing a decimal tag number"))?;
        if flags.explicit {
            let (emit_class, emit_number) = pending.take().unwrap_or((flags.class, number));
            log::trace!(
                "encode: explicit TAG wrapper class={emit_class} number={emit_number}"
            );
            encode_tag(out, emit_class, true, emit_number)?;
            scratch.tag_marks.insert(*tag_id, out.position());
        } else if pending.is_none() {
            pending = Some((flags.class, number));
        }
    }

    let kind = tree.kind(id);
    if let Some((class, number)) = pending {
        let structured = is_constructed_kind(kind);
        log::trace!("encode: implicit tag class={class} number={number} structured={structured}");
        encode_tag(out, class, structured, number)?;
    } else if !matches!(kind, NodeKind::Choice | NodeKind::Any | NodeKind::Tag) {
        if let Some((constructed, number)) = universal_tag(kind, tree.flags(id).is_utc_time) {
            encode_tag(out, Class::Universal, constructed, number)?;
        }
    }

    Ok(())
}

/// Back-patches the length of every explicit `TAG` wrapper belonging to
/// `id` whose content has just finished. Innermost wrapper first, so an outer
/// wrapper's own back-patch insert doesn't invalidate an inner one's
/// saved offset.
pub(crate) fn complete_explicit_tags<T: Tree>(
    tree: &T,
    scratch: &mut Scratch<T::Id>,
    out: &mut OutBuf<'_>,
    id: T::Id,
) -> Result<(), EncodeError> {
    let (tag_chain, _) = tag_children(tree, id);
    for tag_id in tag_chain.iter().filter(|t| tree.flags(**t).explicit).rev() {
        if let Some(saved) = scratch.tag_marks.remove(tag_id) {
            let content_len = out.position() - saved;
            let mut len_buf = [0u8; 16];
            let mut len_out = OutBuf::new(&mut len_buf);
            encode_length(&mut len_out, content_len)?;
            let written = len_out.position();
            out.insert_at(saved, &len_buf[..written])?;
        }
    }
    Ok(())
}

/// Drops any explicit-wrapper marks recorded for `id` without writing
/// their back-patch, for when the element they belonged to turned out to
/// be an omitted DEFAULT and its tag bytes were already rolled back.
pub(crate) fn discard_explicit_marks<T: Tree>(tree: &T, scratch: &mut Scratch<T::Id>, id: T::Id) {
    let (tag_chain, _) = tag_children(tree, id);
    for tag_id in tag_chain.iter().filter(|t| tree.flags(**t).explicit) {
        scratch.tag_marks.remove(tag_id);
    }
}

fn is_constructed_kind(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Sequence | NodeKind::SequenceOf | NodeKind::Set | NodeKind::SetOf
    )
}

/// Reads (and validates) any explicit `TAG` wrapper headers for `id`,
/// advancing `*pos` past them, and returns the expected `(class,
/// constructed, number)` the node's own content tag must match — `None`
/// for `CHOICE`/`ANY`/`TAG` nodes, which have no tag of their own to
/// check here.
pub(crate) fn decode_prefix<T: Tree>(
    tree: &T,
    scratch: &mut Scratch<T::Id>,
    input: &[u8],
    pos: &mut usize,
    id: T::Id,
    opts: &DecodeOptions,
) -> Result<Option<(Class, bool, u32)>, DecodeError> {
    let (tag_chain, _) = tag_children(tree, id);
    let mut pending: Option<(Class, u32)> = None;

    for tag_id in &tag_chain {
        let flags = tree.flags(*tag_id);
        let number = tag_number(tree, *tag_id)
            .ok_or_else(|| DecodeError::generic("TAG node missing a decimal tag number"))?;
        if flags.explicit {
            let (expect_class, expect_number) = pending.take().unwrap_or((flags.class, number));
            let remaining = input
                .get(*pos..)
                .ok_or_else(|| DecodeError::der("position past end of input"))?;
            let (class, constructed, found_number, tag_len) = decode_tag(remaining)?;
            if class != expect_class || found_number != expect_number || !constructed {
                return Err(DecodeError::Tag {
                    expected: format!("{expect_class}:{expect_number}"),
                    found: format!("{class}:{found_number}"),
                });
            }
            *pos += tag_len;
            let (len, len_len) = decode_length(&input[*pos..], opts)?;
            *pos += len_len;
            log::trace!("decode: matched explicit TAG wrapper {expect_class}:{expect_number}");
            scratch.marks.insert(*tag_id, *pos + len);
        } else if pending.is_none() {
            pending = Some((flags.class, number));
        }
    }

    let kind = tree.kind(id);
    if let Some((class, number)) = pending {
        Ok(Some((class, is_constructed_kind(kind), number)))
    } else if matches!(kind, NodeKind::Choice | NodeKind::Any | NodeKind::Tag) {
        Ok(None)
    } else {
        Ok(universal_tag(kind, tree.flags(id).is_utc_time).map(|(c, n)| (Class::Universal, c, n)))
    }
}

/// Computes the outer wire tag `id` would be expected to present on the
/// wire, without consuming any input or mutating `scratch` — used to
/// decide, by peeking a single tag octet, whether a candidate `SET`
/// member or `CHOICE` alternative matches what's at the current
/// position. Returns `None` for `CHOICE`/`ANY`/`TAG` nodes, which accept
/// more than one wire tag (or none at all) and so can't be discriminated
/// this way.
pub(crate) fn peek_outer_tag<T: Tree>(tree: &T, id: T::Id) -> Option<(Class, bool, u32)> {
    let (tag_chain, _) = tag_children(tree, id);
    let mut pending: Option<(Class, u32)> = None;

    for tag_id in &tag_chain {
        let flags = tree.flags(*tag_id);
        let number = tag_number(tree, *tag_id)?;
        if flags.explicit {
            let (class, number) = pending.take().unwrap_or((flags.class, number));
            return Some((class, true, number));
        } else if pending.is_none() {
            pending = Some((flags.class, number));
        }
    }

    let kind = tree.kind(id);
    if let Some((class, number)) = pending {
        Some((class, is_constructed_kind(kind), number))
    } else if matches!(kind, NodeKind::Choice | NodeKind::Any | NodeKind::Tag) {
        None
    } else {
        universal_tag(kind, tree.flags(id).is_utc_time).map(|(c, n)| (Class::Universal, c, n))
    }
}

/// Verifies that every explicit `TAG` wrapper belonging to `id` consumed
/// exactly the content length it declared, mirroring
/// [`complete_explicit_tags`] on the decode side.
pub(crate) fn verify_explicit_tags_end<T: Tree>(
    tree: &T,
    scratch: &mut Scratch<T::Id>,
    pos: usize,
    id: T::Id,
) -> Result<(), DecodeError> {
    let (tag_chain, _) = tag_children(tree, id);
    for tag_id in tag_chain.iter().filter(|t| tree.flags(**t).explicit).rev() {
        if let Some(expected_end) = scratch.marks.remove(tag_id) {
            if expected_end != pos {
                return Err(DecodeError::der(
                    "explicit TAG wrapper length did not match its content",
                ));
            }
        }
    }
    Ok(())
}
