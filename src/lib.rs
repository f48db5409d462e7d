#![cfg_attr(not(test), no_std)]

//! A schema-tree-driven DER (Distinguished Encoding Rules) codec core.
//!
//! This crate does not parse a schema language and does not own a tree
//! type: callers bring their own schema tree (an ASN.1 module already
//! compiled down to a tree of [`tree::NodeKind`] nodes linked by
//! down/right/parent pointers) and implement [`tree::Tree`] over it. The
//! three operations this crate provides, [`encode`], [`decode`], and
//! [`locate`], walk that tree alongside a byte buffer, handling:
//!
//! - explicit/implicit `TAG` resolution and back-patching,
//! - `SET`/`SET OF` canonical ordering,
//! - `OPTIONAL`/`DEFAULT` presence and omission,
//! - `CHOICE` alternative resolution,
//! - `SEQUENCE OF`/`SET OF` repetition by cloning a template element,
//! - `ANY` capture-and-requote.
//!
//! See [`tree::Tree`] for the node shape this crate expects, and
//! [`config::DecodeOptions`] for the one behavioural knob decoding has
//! (tolerating the non-DER indefinite length form).

extern crate alloc;

pub mod config;
pub mod error;
mod length;
mod leaf;
mod outbuf;
mod setsort;
pub mod tag;
mod tagengine;
pub mod tree;
mod walk;

pub use config::{DecodeOptions, EncodeOptions};
pub use error::{DecodeError, EncodeError};
pub use tag::Class;
pub use tree::{NodeFlags, NodeKind, Tree};

use outbuf::OutBuf;
use tree::Scratch;

/// Encodes the subtree rooted at `root` into `out`, returning the number
/// of bytes written.
///
/// `_options` is accepted for forward compatibility (`EncodeOptions`
/// carries no behaviour today; DER has no encoder-side knobs).
pub fn encode<T: Tree>(
    tree: &T,
    root: T::Id,
    out: &mut [u8],
    _options: EncodeOptions,
) -> Result<usize, EncodeError> {
    if tree.flags(root).is_optional {
        return Err(EncodeError::generic(
            "root of an encode cannot itself be marked optional",
        ));
    }
    let mut scratch = Scratch::new();
    let mut cursor = OutBuf::new(out);
    walk::encode::encode_node(tree, &mut scratch, &mut cursor, root)?;
    Ok(cursor.position())
}

/// Decodes `input` into the subtree rooted at `root`, mutating `tree` in
/// place. Returns an error unless every byte of `input` is consumed by
/// `root`'s own content.
pub fn decode<T: Tree>(
    tree: &mut T,
    root: T::Id,
    input: &[u8],
    options: DecodeOptions,
) -> Result<(), DecodeError> {
    if tree.flags(root).is_optional {
        return Err(DecodeError::generic(
            "root of a decode cannot itself be marked optional",
        ));
    }
    let mut scratch = Scratch::new();
    let mut pos = 0usize;
    walk::decode::decode_node(tree, &mut scratch, input, &mut pos, root, &options)?;
    tree.delete_not_used(root);
    if pos != input.len() {
        return Err(DecodeError::der(alloc::format!(
            "{} trailing byte(s) after decoding the root element",
            input.len() - pos
        )));
    }
    Ok(())
}

/// Finds the `(start, end)` byte range a named element occupies in
/// `input`, without decoding or materialising any node's value. `end` is
/// the inclusive index of the element's last byte, not one-past-the-end.
///
/// `dotted_name` is resolved against `tree` via [`Tree::find_node`] (for
/// example `"sequence.field2"`); resolution failure and in-buffer lookup
/// failure both surface as [`DecodeError::ElementNotFound`].
pub fn locate<T: Tree>(
    tree: &T,
    root: T::Id,
    input: &[u8],
    dotted_name: &str,
    options: DecodeOptions,
) -> Result<(usize, usize), DecodeError> {
    let target = tree
        .find_node(root, dotted_name)
        .ok_or_else(|| DecodeError::ElementNotFound {
            name: dotted_name.into(),
        })?;
    if target == root {
        return Ok((0, input.len().saturating_sub(1)));
    }
    if tree.flags(root).is_optional {
        return Err(DecodeError::generic(
            "root of a locate cannot itself be marked optional",
        ));
    }
    walk::locate::locate_node(tree, input, root, target, &options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Arena, NodeFlags, NodeKind};
    use pretty_assertions::assert_eq;

    fn int_value(content: &[u8]) -> alloc::vec::Vec<u8> {
        let mut v = alloc::vec![content.len() as u8];
        v.extend_from_slice(content);
        v
    }

    #[test]
    fn sequence_of_two_integers_encodes_as_der() {
        let mut tree = Arena::new();
        let seq = tree.add_root(NodeKind::Sequence, NodeFlags::default(), Some("seq"));
        let a = tree.add_child(seq, NodeKind::Integer, NodeFlags::default(), Some("a"));
        let b = tree.add_child(seq, NodeKind::Integer, NodeFlags::default(), Some("b"));
        tree.set_value_owned(a, int_value(&[0x01]));
        tree.set_value_owned(b, int_value(&[0x00]));

        let mut buf = [0u8; 32];
        let written = encode(&tree, seq, &mut buf, EncodeOptions::der()).unwrap();
        assert_eq!(&buf[..written], &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x00]);
    }

    #[test]
    fn pre_encoded_integer_value_passes_through_unchanged() {
        let mut tree = Arena::new();
        let n = tree.add_root(NodeKind::Integer, NodeFlags::default(), Some("n"));
        tree.set_value_owned(n, alloc::vec![0x01, 0x00]);

        let mut buf = [0u8; 8];
        let written = encode(&tree, n, &mut buf, EncodeOptions::der()).unwrap();
        assert_eq!(&buf[..written], &[0x02, 0x01, 0x00]);
    }

    #[test]
    fn boolean_decodes_true_and_false_and_rejects_other_content() {
        let opts = DecodeOptions::der();

        let mut tree = Arena::new();
        let b = tree.add_root(NodeKind::Boolean, NodeFlags::default(), Some("b"));
        decode(&mut tree, b, &[0x01, 0x01, 0xFF], opts).unwrap();
        assert_eq!(tree.value(b), Some(&b"T"[..]));

        let mut tree = Arena::new();
        let b = tree.add_root(NodeKind::Boolean, NodeFlags::default(), Some("b"));
        decode(&mut tree, b, &[0x01, 0x01, 0x00], opts).unwrap();
        assert_eq!(tree.value(b), Some(&b"F"[..]));

        // a two-byte BOOLEAN content is malformed DER regardless of the
        // extra byte's value.
        let mut tree = Arena::new();
        let b = tree.add_root(NodeKind::Boolean, NodeFlags::default(), Some("b"));
        assert!(decode(&mut tree, b, &[0x01, 0x02, 0x00, 0x55], opts).is_err());
    }

    #[test]
    fn null_round_trips_and_rejects_nonzero_length() {
        let opts = DecodeOptions::der();
        let mut tree = Arena::new();
        let n = tree.add_root(NodeKind::Null, NodeFlags::default(), Some("n"));
        decode(&mut tree, n, &[0x05, 0x00], opts).unwrap();

        let mut tree = Arena::new();
        let n = tree.add_root(NodeKind::Null, NodeFlags::default(), Some("n"));
        assert!(decode(&mut tree, n, &[0x05, 0x01, 0x00], opts).is_err());
    }

    #[test]
    fn set_canonicalises_integer_before_octet_string() {
        let mut tree = Arena::new();
        let set = tree.add_root(NodeKind::Set, NodeFlags::default(), Some("set"));
        let os = tree.add_child(set, NodeKind::OctetString, NodeFlags::default(), Some("os"));
        let int = tree.add_child(set, NodeKind::Integer, NodeFlags::default(), Some("int"));
        tree.set_value_owned(os, alloc::vec![0xAA]);
        tree.set_value_owned(int, int_value(&[0x2A]));

        let mut buf = [0u8; 32];
        let written = encode(&tree, set, &mut buf, EncodeOptions::der()).unwrap();
        assert_eq!(
            &buf[..written],
            &[0x31, 0x06, 0x02, 0x01, 0x2A, 0x04, 0x01, 0xAA]
        );
    }

    #[test]
    fn locate_finds_second_sequence_member() {
        let mut tree = Arena::new();
        let seq = tree.add_root(NodeKind::Sequence, NodeFlags::default(), Some("sequence"));
        let _field1 = tree.add_child(seq, NodeKind::Integer, NodeFlags::default(), Some("field1"));
        let _field2 = tree.add_child(seq, NodeKind::Integer, NodeFlags::default(), Some("field2"));

        let wire = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x2A];
        let range = locate(&tree, seq, &wire, "sequence.field2", DecodeOptions::der()).unwrap();
        assert_eq!(range, (5, 7));
    }

    #[test]
    fn locate_on_root_itself_returns_whole_buffer_inclusive() {
        let mut tree = Arena::new();
        let seq = tree.add_root(NodeKind::Sequence, NodeFlags::default(), Some("sequence"));
        let _field1 = tree.add_child(seq, NodeKind::Integer, NodeFlags::default(), Some("field1"));

        let wire = [0x30, 0x03, 0x02, 0x01, 0x01];
        let range = locate(&tree, seq, &wire, "sequence", DecodeOptions::der()).unwrap();
        assert_eq!(range, (0, wire.len() - 1));
    }
}
