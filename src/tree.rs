//! The schema-tree seam: the node shape the codec reads values from and
//! writes decoded values into, expressed as a trait so the codec never
//! depends on a specific tree implementation.
//!
//! [`Tree::parent`] is exposed directly as a primitive rather than
//! reconstructed from sibling pointers: a node doesn't need to walk back
//! to its leftmost sibling and compare against its own parent's `down`
//! link just to answer "who is my parent", and the walker shouldn't need
//! to know that trick exists. The [`Arena`] default implementation
//! stores nodes compactly by index rather than behind `Rc<RefCell<_>>`,
//! an arena/index-based parse-tree shape common to index-arena parsers,
//! but that's an implementation detail callers of the trait never see.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::tag::Class;

/// The sixteen node kinds a schema tree is built from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeKind {
    Null,
    Boolean,
    Integer,
    Enumerated,
    ObjectId,
    Time,
    OctetString,
    BitString,
    Sequence,
    SequenceOf,
    Set,
    SetOf,
    Choice,
    Any,
    Tag,
    Size,
}

/// Flag bits carried per node. `explicit` and `class` are only
/// meaningful on `Tag` nodes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct NodeFlags {
    pub has_tag: bool,
    pub is_optional: bool,
    pub is_default: bool,
    pub is_set: bool,
    pub is_not_used: bool,
    pub is_utc_time: bool,
    pub explicit: bool,
    pub class: Class,
}

/// The schema-tree interface the codec consumes. A node's `value` is
/// schema payload for leaves and, for `Tag` nodes, the decimal tag
/// number; it is never used by this crate as scratch storage — that
/// lives in a call-local [`Scratch`] map instead, so concurrent encode
/// calls over a shared, read-only tree don't contend on it.
pub trait Tree {
    type Id: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    fn kind(&self, id: Self::Id) -> NodeKind;
    fn flags(&self, id: Self::Id) -> NodeFlags;
    fn value(&self, id: Self::Id) -> Option<&[u8]>;
    fn name_of(&self, id: Self::Id) -> Option<&str>;

    fn down(&self, id: Self::Id) -> Option<Self::Id>;
    fn right(&self, id: Self::Id) -> Option<Self::Id>;
    fn parent(&self, id: Self::Id) -> Option<Self::Id>;

    fn set_value(&mut self, id: Self::Id, bytes: &[u8]);
    fn set_not_used(&mut self, id: Self::Id, not_used: bool);

    /// Resolves a dotted path such as `"sequence.field2"` to a node,
    /// matching the leading component against `root`'s own name when
    /// present.
    fn find_node(&self, root: Self::Id, dotted_name: &str) -> Option<Self::Id>;

    /// Clones the template element under a `SEQUENCE OF`/`SET OF` node and
    /// appends it as a new trailing repetition, returning the new node.
    fn append_sequence_set(&mut self, id: Self::Id) -> Self::Id;

    /// Unlinks `id` (and its subtree) from its parent's child chain.
    fn delete_structure(&mut self, id: Self::Id);

    /// Recursively unlinks every node flagged `is_not_used` under `root`.
    fn delete_not_used(&mut self, root: Self::Id);
}

/// Opaque handle into an [`Arena`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeId(u32);

#[derive(Clone)]
struct ArenaNode {
    kind: NodeKind,
    flags: NodeFlags,
    name: Option<String>,
    value: Option<Vec<u8>>,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

/// A default in-memory schema-tree implementation, used by this crate's
/// own tests and available to callers that don't bring their own
/// schema-tree library: compiling a schema language down to a tree and
/// editing that tree are treated as someone else's problem, and this is
/// a minimal stand-in satisfying the same [`Tree`] seam.
#[derive(Clone, Default)]
pub struct Arena {
    nodes: Vec<ArenaNode>,
}

impl Arena {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn push(&mut self, node: ArenaNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn get(&self, id: NodeId) -> &ArenaNode {
        &self.nodes[id.0 as usize]
    }

    fn get_mut(&mut self, id: NodeId) -> &mut ArenaNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Creates a root node with no parent and no children yet.
    pub fn add_root(&mut self, kind: NodeKind, flags: NodeFlags, name: Option<&str>) -> NodeId {
        self.push(ArenaNode {
            kind,
            flags,
            name: name.map(Into::into),
            value: None,
            parent: None,
            first_child: None,
            next_sibling: None,
        })
    }

    /// Appends a new last child under `parent`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        flags: NodeFlags,
        name: Option<&str>,
    ) -> NodeId {
        let id = self.push(ArenaNode {
            kind,
            flags,
            name: name.map(Into::into),
            value: None,
            parent: Some(parent),
            first_child: None,
            next_sibling: None,
        });
        match self.get(parent).first_child {
            None => self.get_mut(parent).first_child = Some(id),
            Some(first) => {
                let mut last = first;
                while let Some(next) = self.get(last).next_sibling {
                    last = next;
                }
                self.get_mut(last).next_sibling = Some(id);
            }
        }
        id
    }

    pub fn set_value_owned(&mut self, id: NodeId, bytes: Vec<u8>) {
        self.get_mut(id).value = Some(bytes);
    }

    fn first_real_child(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = self.get(id).first_child;
        while let Some(c) = cur {
            if !matches!(self.get(c).kind, NodeKind::Tag | NodeKind::Size) {
                return Some(c);
            }
            cur = self.get(c).next_sibling;
        }
        None
    }

    fn clone_subtree(&mut self, src: NodeId, new_parent: Option<NodeId>) -> NodeId {
        let node = self.get(src).clone();
        let new_id = self.push(ArenaNode {
            kind: node.kind,
            flags: node.flags,
            name: node.name.clone(),
            value: node.value.clone(),
            parent: new_parent,
            first_child: None,
            next_sibling: None,
        });
        if let Some(child) = node.first_child {
            let mut src_child = Some(child);
            let mut prev_new: Option<NodeId> = None;
            while let Some(c) = src_child {
                let new_child = self.clone_subtree(c, Some(new_id));
                match prev_new {
                    None => self.get_mut(new_id).first_child = Some(new_child),
                    Some(prev) => self.get_mut(prev).next_sibling = Some(new_child),
                }
                prev_new = Some(new_child);
                src_child = self.get(c).next_sibling;
            }
        }
        new_id
    }

    fn unlink_child(&mut self, parent: NodeId, child: NodeId) {
        let first = self.get(parent).first_child;
        if first == Some(child) {
            self.get_mut(parent).first_child = self.get(child).next_sibling;
            return;
        }
        let mut cur = first;
        while let Some(c) = cur {
            if self.get(c).next_sibling == Some(child) {
                let next = self.get(child).next_sibling;
                self.get_mut(c).next_sibling = next;
                return;
            }
            cur = self.get(c).next_sibling;
        }
    }

    fn delete_not_used_rec(&mut self, id: NodeId) {
        let children: Vec<NodeId> = self.children_of(id);
        for child in children {
            if self.get(child).flags.is_not_used {
                self.unlink_child(id, child);
            } else {
                self.delete_not_used_rec(child);
            }
        }
    }

    fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.get(id).first_child;
        while let Some(c) = cur {
            out.push(c);
            cur = self.get(c).next_sibling;
        }
        out
    }
}

impl Tree for Arena {
    type Id = NodeId;

    fn kind(&self, id: Self::Id) -> NodeKind {
        self.get(id).kind
    }

    fn flags(&self, id: Self::Id) -> NodeFlags {
        self.get(id).flags
    }

    fn value(&self, id: Self::Id) -> Option<&[u8]> {
        self.get(id).value.as_deref()
    }

    fn name_of(&self, id: Self::Id) -> Option<&str> {
        self.get(id).name.as_deref()
    }

    fn down(&self, id: Self::Id) -> Option<Self::Id> {
        self.get(id).first_child
    }

    fn right(&self, id: Self::Id) -> Option<Self::Id> {
        self.get(id).next_sibling
    }

    fn parent(&self, id: Self::Id) -> Option<Self::Id> {
        self.get(id).parent
    }

    fn set_value(&mut self, id: Self::Id, bytes: &[u8]) {
        self.get_mut(id).value = Some(bytes.to_vec());
    }

    fn set_not_used(&mut self, id: Self::Id, not_used: bool) {
        self.get_mut(id).flags.is_not_used = not_used;
    }

    fn find_node(&self, root: Self::Id, dotted_name: &str) -> Option<Self::Id> {
        let mut segments: Vec<&str> = dotted_name.split('.').collect();
        if segments.is_empty() {
            return None;
        }
        let mut cur = root;
        if Some(segments[0]) == self.name_of(cur) {
            segments.remove(0);
        }
        for seg in segments {
            let mut child = self.down(cur);
            let mut found = None;
            while let Some(c) = child {
                if self.name_of(c) == Some(seg) {
                    found = Some(c);
                    break;
                }
                child = self.right(c);
            }
            cur = found?;
        }
        Some(cur)
    }

    fn append_sequence_set(&mut self, id: Self::Id) -> Self::Id {
        let template = self
            .first_real_child(id)
            .expect("SEQUENCE OF/SET OF has no template element to clone");
        let new_id = self.clone_subtree(template, self.get(template).parent);
        let mut last = template;
        while let Some(next) = self.get(last).next_sibling {
            last = next;
        }
        self.get_mut(last).next_sibling = Some(new_id);
        new_id
    }

    fn delete_structure(&mut self, id: Self::Id) {
        if let Some(parent) = self.get(id).parent {
            self.unlink_child(parent, id);
        }
    }

    fn delete_not_used(&mut self, root: Self::Id) {
        self.delete_not_used_rec(root);
    }
}

/// Per-traversal scratch state, keyed by node id. Reusing a node's own
/// `value`/`name` fields for back-patch bookkeeping would work for a
/// single-threaded encode but ties every concurrent encode of the same
/// tree to a lock; a call-local map sidesteps that entirely.
#[derive(Default)]
pub struct Scratch<Id: Eq + core::hash::Hash + Ord> {
    /// Keyed by an explicit TAG wrapper's own node id: on decode, the
    /// offset its content is expected to end at, checked by
    /// `verify_explicit_tags_end` once the wrapped element finishes.
    pub marks: BTreeMap<Id, usize>,
    /// Keyed by an explicit TAG wrapper's own node id: on encode, the
    /// buffer offset where its content began, pending back-patch by
    /// `complete_explicit_tags`.
    pub tag_marks: BTreeMap<Id, usize>,
}

impl<Id: Copy + Eq + core::hash::Hash + Ord> Scratch<Id> {
    pub fn new() -> Self {
        Self {
            marks: BTreeMap::new(),
            tag_marks: BTreeMap::new(),
        }
    }
}
