//! Flatten a Huffman tree into the fixed size records of an LZH8 table.
//!
//! Every pointer record can only skip forward `2^offset_bits` record pairs, so
//! the children of a node can't be placed just anywhere. Nodes that have been
//! referenced but not yet placed are "outstanding", and each one must still be
//! reachable from its parent when it finally gets placed. Whole subtrees are
//! placed at once when they are small enough to not push any outstanding node
//! out of reach. When nothing fits, the nearest outstanding node is split by
//! placing only its two children.
//!
//! The order of placement matches the table layout of Nintendo's compressor.

use crate::{
    errors::Lzh8Error,
    format::{FlatTable, TableKind},
};

use super::huffman::{Node, NodeIdx, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// record 0, which is never stored
    Reserved,
    /// stands in for the node whose children haven't been placed
    Unresolved(NodeIdx),
    Leaf(u16),
    Pointer {
        left_leaf: bool,
        right_leaf: bool,
        offset: u16,
    },
}

impl Slot {
    fn record(self, offset_bits: u32) -> u16 {
        match self {
            Self::Reserved | Self::Unresolved(..) => 0,
            Self::Leaf(value) => value,
            Self::Pointer {
                left_leaf,
                right_leaf,
                offset,
            } => ((left_leaf as u16) << (offset_bits + 1)) | ((right_leaf as u16) << offset_bits) | offset,
        }
    }
}

/// Flatten `tree` into a `kind` table
pub(super) fn flatten(tree: &Tree, kind: TableKind) -> Result<FlatTable, Lzh8Error> {
    let mut flat = Flattener {
        tree,
        offset_bits: kind.offset_bits(),
        slots: vec![Slot::Reserved, Slot::Unresolved(tree.root())],
        outstanding: 1,
    };

    while flat.outstanding > 0 {
        if let Some((slot, node)) = flat.find_fitting_subtree() {
            flat.place_subtree(slot, node)?;
        } else {
            match flat.slot_to_split() {
                Some((slot, node)) => flat.place_children(slot, node)?,
                None => unreachable!("{} outstanding nodes, but none in table", flat.outstanding),
            }
        }
    }

    let records = flat
        .slots
        .iter()
        .map(|slot| slot.record(flat.offset_bits))
        .collect();

    Ok(FlatTable::new(kind, records))
}

struct Flattener<'a> {
    tree: &'a Tree,
    offset_bits: u32,
    slots: Vec<Slot>,
    /// count of `Slot::Unresolved` in `slots`
    outstanding: usize,
}

impl<'a> Flattener<'a> {
    fn max_offset(&self) -> usize {
        1 << self.offset_bits
    }

    /// Find the most recently added outstanding node whose whole subtree
    /// can be placed at the end of the table right now.
    fn find_fitting_subtree(&self) -> Option<(usize, NodeIdx)> {
        self.slots
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, &slot)| match slot {
                Slot::Unresolved(node) => {
                    let size = self.tree.subtree_size(node) as usize;
                    let fits = size + self.outstanding <= self.max_offset()
                        && self.could_satisfy_outstanding(size);

                    if fits {
                        Some((i, node))
                    } else {
                        None
                    }
                }
                _ => None,
            })
    }

    /// Simulate adding `proposed_size` records to the end of the table, then every
    /// outstanding node in table order. Can each of them still be reached?
    ///
    /// A subtree's size includes its own root, which satisfies one of the outstanding
    /// nodes, and offsets count from the start of a pair. Both make this a bit
    /// cautious, which is what Nintendo's tables expect.
    fn could_satisfy_outstanding(&self, proposed_size: usize) -> bool {
        let end = self.slots.len() / 2;
        let mut proposed = proposed_size;

        for (i, _) in self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, Slot::Unresolved(..)))
        {
            if end + proposed - i / 2 > self.max_offset() {
                return false;
            }
            proposed += 1;
        }

        true
    }

    /// Pick the outstanding node to split when no subtree fits. This is in the
    /// first pair with an outstanding node, as it is closest to being out of reach.
    /// Between two siblings, the larger subtree is split, or the left one on a tie.
    fn slot_to_split(&self) -> Option<(usize, NodeIdx)> {
        (0..self.slots.len())
            .step_by(2)
            .find_map(|i| match (self.slots[i], self.slots[i + 1]) {
                (Slot::Unresolved(left), Slot::Unresolved(right)) => {
                    if self.tree.subtree_size(right) > self.tree.subtree_size(left) {
                        Some((i + 1, right))
                    } else {
                        Some((i, left))
                    }
                }
                (Slot::Unresolved(left), _) => Some((i, left)),
                (_, Slot::Unresolved(right)) => Some((i + 1, right)),
                _ => None,
            })
    }

    /// Place the whole subtree of `node` at the end of the table, breadth first
    /// and left child first.
    fn place_subtree(&mut self, slot: usize, node: NodeIdx) -> Result<(), Lzh8Error> {
        let mut next = self.slots.len();
        self.place_children(slot, node)?;

        // the table keeps growing as the subtree is expanded
        while next < self.slots.len() {
            if let Slot::Unresolved(child) = self.slots[next] {
                self.place_children(next, child)?;
            }
            next += 1;
        }

        Ok(())
    }

    /// Add the two children of `node` to the end of the table, and point
    /// the record at `parent` to them.
    fn place_children(&mut self, parent: usize, node: NodeIdx) -> Result<(), Lzh8Error> {
        let (left, right) = match self.tree.node(node) {
            Node::Internal { left, right, .. } => (left, right),
            Node::Leaf(value) => unreachable!("leaf {:x} was left outstanding", value),
        };
        debug_assert!(self.slots.len() % 2 == 0, "uneven table index");

        let pair = self.slots.len();
        let left_leaf = self.push_child(left);
        let right_leaf = self.push_child(right);

        let offset = pair / 2 - parent / 2 - 1;
        if offset >= self.max_offset() {
            return Err(Lzh8Error::TableOffsetOverflow {
                record: parent,
                offset,
                bits: self.offset_bits,
            });
        }

        self.slots[parent] = Slot::Pointer {
            left_leaf,
            right_leaf,
            offset: offset as u16,
        };
        self.outstanding -= 1;

        Ok(())
    }

    /// Add `node` to the table, and return if it was a leaf
    fn push_child(&mut self, node: NodeIdx) -> bool {
        match self.tree.node(node) {
            Node::Leaf(value) => {
                self.slots.push(Slot::Leaf(value));
                true
            }
            Node::Internal { .. } => {
                self.slots.push(Slot::Unresolved(node));
                self.outstanding += 1;
                false
            }
        }
    }
}
