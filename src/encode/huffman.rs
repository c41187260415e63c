use crate::{
    encode::{
        flatten,
        lzss::Frequencies,
        Frequency,
    },
    errors::Lzh8Error,
    format::{FlatTable, TableKind},
};
use std::{
    cmp::Reverse,
    collections::BinaryHeap,
    fmt,
    mem::size_of,
};

/// The Huffman codes and flattened table for each of the two alphabets
#[derive(Debug)]
pub(super) struct EncodedTables {
    // literal bytes and copy-back sizes
    pub lengths: CodedTable,
    // displacement bit lengths
    pub displacements: CodedTable,
}

impl EncodedTables {
    pub(super) fn new(freqs: &Frequencies) -> Result<Self, Lzh8Error> {
        let lengths = CodedTable::new(TableKind::LengthLiteral, freqs)?;
        let displacements = CodedTable::new(TableKind::Displacement, freqs)?;

        Ok(Self {
            lengths,
            displacements,
        })
    }
}

#[derive(Debug)]
pub(super) struct CodedTable {
    codes: Vec<Option<HuffCode>>,
    pub table: FlatTable,
}

impl CodedTable {
    fn new(kind: TableKind, freqs: &Frequencies) -> Result<Self, Lzh8Error> {
        match Tree::build(freqs.get(kind)) {
            Some(tree) => {
                let codes = tree.generate_codes()?;
                let table = flatten::flatten(&tree, kind)?;
                Ok(Self { codes, table })
            }
            None => Ok(Self {
                codes: vec![None; kind.symbol_count()],
                table: FlatTable::empty(kind),
            }),
        }
    }

    pub fn get(&self, symbol: u16) -> Result<HuffCode, Lzh8Error> {
        self.codes
            .get(symbol as usize)
            .copied()
            .flatten()
            .ok_or(Lzh8Error::MissingCode(symbol))
    }
}

impl fmt::Display for CodedTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.codes.iter().all(Option::is_none) {
            return writeln!(f, "empty tree");
        }

        for (symbol, code) in self.codes.iter().enumerate() {
            if let Some(code) = code {
                writeln!(f, "{:x} : {}", symbol, code)?;
            }
        }
        writeln!(f, "{}", self.table)
    }
}

/// Index of a node in a `Tree`. Leaves come first, at the index of their symbol,
/// then internal nodes in the order they were made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(super) struct NodeIdx(u16);

impl NodeIdx {
    fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Node {
    Leaf(u16),
    Internal {
        left: NodeIdx,
        right: NodeIdx,
        /// nodes needed to store this whole subtree in a table, including this one
        subtree_size: u16,
    },
}

/// An arena based Huffman tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Tree {
    nodes: Vec<Node>,
    root: NodeIdx,
}

impl Tree {
    /// Build the Huffman tree for `freqs`, with one leaf for each symbol.
    /// Returns `None` if no symbols were used.
    pub(super) fn build(freqs: &[Frequency]) -> Option<Self> {
        let mut nodes: Vec<Node> = (0..freqs.len()).map(|i| Node::Leaf(i as u16)).collect();
        // smallest frequency first, then oldest node
        let mut heap: BinaryHeap<Reverse<(Frequency, NodeIdx)>> = freqs
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f != 0)
            .map(|(i, &f)| Reverse((f, NodeIdx(i as u16))))
            .collect();

        match heap.len() {
            0 => return None,
            1 => {
                // a lone symbol still needs a one bit code,
                // so the root points to it twice
                let Reverse((_, only)) = heap.pop()?;
                let root = NodeIdx(nodes.len() as u16);
                nodes.push(Node::Internal {
                    left: only,
                    right: only,
                    subtree_size: 1,
                });
                return Some(Self { nodes, root });
            }
            _ => (),
        }

        while heap.len() >= 2 {
            let Reverse((lf, left)) = heap.pop()?;
            let Reverse((rf, right)) = heap.pop()?;

            let new = NodeIdx(nodes.len() as u16);
            let subtree_size = Self::node_size(&nodes, left) + Self::node_size(&nodes, right) + 1;
            nodes.push(Node::Internal {
                left,
                right,
                subtree_size,
            });
            heap.push(Reverse((lf + rf, new)));
        }

        let Reverse((_, root)) = heap.pop()?;

        Some(Self { nodes, root })
    }

    fn node_size(nodes: &[Node], idx: NodeIdx) -> u16 {
        match nodes[idx.idx()] {
            Node::Leaf(..) => 0,
            Node::Internal { subtree_size, .. } => subtree_size,
        }
    }

    pub(super) fn root(&self) -> NodeIdx {
        self.root
    }

    pub(super) fn node(&self, idx: NodeIdx) -> Node {
        self.nodes[idx.idx()]
    }

    pub(super) fn subtree_size(&self, idx: NodeIdx) -> u16 {
        Self::node_size(&self.nodes, idx)
    }

    /// Walk the tree to find the code of every leaf, with `0` for left and `1` for right
    pub(super) fn generate_codes(&self) -> Result<Vec<Option<HuffCode>>, Lzh8Error> {
        let leaves = self
            .nodes
            .iter()
            .take_while(|n| matches!(n, Node::Leaf(..)))
            .count();
        let mut codes = vec![None; leaves];
        self.generate_code(self.root, HuffCode::new(), &mut codes)?;

        Ok(codes)
    }

    fn generate_code(
        &self,
        idx: NodeIdx,
        prefix: HuffCode,
        codes: &mut [Option<HuffCode>],
    ) -> Result<(), Lzh8Error> {
        match self.node(idx) {
            Node::Leaf(symbol) => {
                if prefix.len() > HuffCode::MAX_SIZE {
                    return Err(Lzh8Error::CodeTooLong {
                        symbol,
                        max: HuffCode::MAX_SIZE as u32,
                    });
                }
                codes[symbol as usize] = Some(prefix);
            }
            Node::Internal { left, right, .. } => {
                if prefix.len() >= HuffCode::MAX_SIZE {
                    let symbol = self.first_leaf(idx);
                    return Err(Lzh8Error::CodeTooLong {
                        symbol,
                        max: HuffCode::MAX_SIZE as u32,
                    });
                }
                self.generate_code(left, prefix.extend(false), codes)?;
                self.generate_code(right, prefix.extend(true), codes)?;
            }
        }

        Ok(())
    }

    /// the leftmost leaf under `idx`, to name in errors
    fn first_leaf(&self, mut idx: NodeIdx) -> u16 {
        loop {
            match self.node(idx) {
                Node::Leaf(symbol) => return symbol,
                Node::Internal { left, .. } => idx = left,
            }
        }
    }
}

type BitCodeBacking = u32;
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(super) struct HuffCode {
    pub code: BitCodeBacking,
    size: u8,
}

impl HuffCode {
    /// longest code that can be written to an LZH8 bitstream
    const MAX_SIZE: usize = size_of::<BitCodeBacking>() * 8 - 1;

    #[inline(always)]
    fn len(&self) -> usize {
        self.size as usize
    }

    #[inline(always)]
    pub(super) fn bitlen(&self) -> u32 {
        self.size as u32
    }

    fn extend(self, bit: bool) -> Self {
        Self {
            code: (self.code << 1) | bit as u32,
            size: self.size + 1,
        }
    }

    fn new() -> Self {
        Self { code: 0, size: 0 }
    }
}

impl fmt::Display for HuffCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:0width$b}", self.code, width = self.len())
    }
}
