//! Information and structures for LZH8 files.
//!
//! There are four parts to an LZH8 file:
//! 1. Header
//! 2. Length/Literal Huffman Table
//! 3. Displacement Length Huffman Table
//! 4. Encoded Data
//!
//! ## Header
//! The header is one or two little endian 32-bit words. The low byte of the first
//! word is always the compression type, `0x40`. The upper 24 bits hold the size of
//! the decompressed data. If the size does not fit in 24 bits (or is zero), those
//! bits are zero and the size follows as a second little endian word.
//!
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0        | compression type (`0x40`) |
//! | 1..4     | size of decompressed data, or `0` |
//! | 4..8     | size of decompressed data (only if bytes `1..4` were `0`) |
//!
//! ## Huffman Tables
//! Both Huffman trees are stored as "flattened" tables of fixed size records, so a
//! decoder can walk the tree without rebuilding it. Each table starts with its
//! own size, as the number of 32-bit words in the table minus one (including the
//! size field itself). The length/literal table has a 16-bit little endian size
//! and 9-bit records; the displacement table has an 8-bit size and 5-bit records.
//! The records are packed MSB first into big endian 32-bit words, following the
//! size field, and the table is zero padded out to a full word.
//!
//! Record 0 is implied and never written. Record 1 is the root of the tree.
//! Every non-leaf record is a pointer to a pair of records:
//!
//! ```text
//! ┌ left child is a leaf
//! |┌ right child is a leaf
//! ||┌ offset (7 bits for length/literal, 3 bits for displacement)
//! 11 0000000
//! ```
//!
//! The children of record `i` are the two records at `2 * (i/2 + offset + 1)`.
//! A decoder reads one bit per step: `0` for the left child, `1` for the right.
//! If that child is flagged as a leaf, the child record is the decoded value.
//! Otherwise the child record is another pointer.
//!
//! For example, the single symbol tree for `'A'` is flattened as:
//! ```text
//! record 1: 11 0000000 <- both children are leaves, offset 0
//! record 2: 001000001  <- 'A'
//! record 3: 001000001  <- 'A'
//! ```
//!
//! ## Encoded Data
//! Each symbol starts with its code from the length/literal table. Values below
//! `0x100` are literal bytes. Otherwise the low eight bits are the length of a
//! copy-back minus three, and the displacement follows: first the code from the
//! displacement table, which gives the bit length `n` of `displacement - 1`, then
//! the low `n - 1` bits of that value. The highest bit is always set, so it is
//! never stored.
//!
//! ```text
//! ┌ length/literal code (0x105 => copy 8 bytes)
//! |    ┌ displacement code (2 bits)
//! |    |  ┌ low bit of displacement - 1
//! 0110 10 1 <- copy 8 bytes from 4 bytes back
//! ```

use crate::bits::WordWriter;
use crate::errors::Lzh8Error;
use bitstream_io::{BitReader, BigEndian};
use std::convert::TryInto;
use std::fmt;
use std::io::{Cursor, Read, Write};

/// The compression type stored in the low byte of every LZH8 header
pub const LZH8_TYPE: u8 = 0x40;

/// Sizes at or above this need the extended, eight byte header
const MAX_SHORT_SIZE: u64 = 0x100_0000;

/// The two Huffman tables stored in an LZH8 file
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TableKind {
    /// Literal bytes and copy-back lengths
    LengthLiteral,
    /// Bit lengths of copy-back displacements
    Displacement,
}

impl TableKind {
    /// Number of bits in one table record
    pub const fn record_bits(self) -> u32 {
        match self {
            Self::LengthLiteral => 9,
            Self::Displacement => 5,
        }
    }

    /// Number of symbols in the alphabet
    pub const fn symbol_count(self) -> usize {
        1 << self.record_bits()
    }

    /// Number of bits for the offset in a pointer record. The top two bits are the leaf flags.
    pub const fn offset_bits(self) -> u32 {
        self.record_bits() - 2
    }

    /// Number of bits for the size field at the start of the table
    pub const fn size_field_bits(self) -> u32 {
        match self {
            Self::LengthLiteral => 16,
            Self::Displacement => 8,
        }
    }

    /// The size field must be less than this
    pub const fn size_limit(self) -> usize {
        match self {
            Self::LengthLiteral => u16::MAX as usize,
            Self::Displacement => u8::MAX as usize,
        }
    }

    const fn size_field_bytes(self) -> usize {
        (self.size_field_bits() / 8) as usize
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::LengthLiteral => write!(f, "Length/Literal"),
            Self::Displacement => write!(f, "Displacement"),
        }
    }
}

/// The information stored at the start of an LZH8 file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lzh8Header {
    /// size of decompressed data
    pub size: u32,
}

impl Lzh8Header {
    /// Create a header for `len` bytes of uncompressed data
    pub(crate) fn for_length(len: u64) -> Result<Self, Lzh8Error> {
        let size = len.try_into().map_err(|_| Lzh8Error::InputTooLarge(len))?;

        Ok(Self { size })
    }

    /// Does this header need the extended size word?
    pub fn is_extended(&self) -> bool {
        self.size == 0 || u64::from(self.size) >= MAX_SHORT_SIZE
    }

    /// Read an LZH8 header from `rdr`
    pub(crate) fn read<R: Read>(rdr: &mut R) -> Result<Self, Lzh8Error> {
        let word = read_le_u32(rdr)?;
        let kind = (word & 0xFF) as u8;
        if kind != LZH8_TYPE {
            return Err(Lzh8Error::InvalidHeader(kind));
        }

        let size = match word >> 8 {
            0 => read_le_u32(rdr)?,
            size => size,
        };

        Ok(Self { size })
    }

    /// Write out `self` as little endian words to match the LZH8 format
    pub(crate) fn write<W: Write>(&self, wtr: &mut W) -> Result<(), Lzh8Error> {
        let kind = u32::from(LZH8_TYPE);
        if self.is_extended() {
            wtr.write_all(&kind.to_le_bytes())?;
            wtr.write_all(&self.size.to_le_bytes())?;
        } else {
            wtr.write_all(&((self.size << 8) | kind).to_le_bytes())?;
        }

        Ok(())
    }
}

fn read_le_u32<R: Read>(rdr: &mut R) -> Result<u32, Lzh8Error> {
    let mut buf = [0u8; 4];
    rdr.read_exact(&mut buf)?;

    Ok(u32::from_le_bytes(buf))
}

/// A Huffman tree flattened into fixed size records
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FlatTable {
    kind: TableKind,
    /// `records[0]` is the implied placeholder, and is never stored
    records: Vec<u16>,
}

impl FlatTable {
    pub(crate) fn new(kind: TableKind, records: Vec<u16>) -> Self {
        Self { kind, records }
    }

    /// A table for an alphabet with no symbols
    pub(crate) fn empty(kind: TableKind) -> Self {
        Self::new(kind, Vec::new())
    }

    #[cfg(test)]
    pub(crate) fn records(&self) -> &[u16] {
        &self.records
    }

    /// Read the size field and records of a `kind` table from `rdr`
    pub(crate) fn read<R: Read>(rdr: &mut R, kind: TableKind) -> Result<Self, Lzh8Error> {
        let mut size = [0u8; 2];
        let size_bytes = &mut size[..kind.size_field_bytes()];
        rdr.read_exact(size_bytes)?;
        let words = match kind {
            TableKind::LengthLiteral => u16::from_le_bytes(size) as usize,
            TableKind::Displacement => size[0] as usize,
        } + 1;

        let mut raw = vec![0u8; words * 4 - kind.size_field_bytes()];
        rdr.read_exact(&mut raw)?;

        // an empty alphabet is one zero word. A tree that fits in one word
        // can't have a zero root, as that points to pointers past the word
        if words == 1 && raw.iter().all(|&b| b == 0) {
            return Ok(Self::empty(kind));
        }

        let count = raw.len() * 8 / kind.record_bits() as usize;
        let mut bits = BitReader::endian(Cursor::new(&raw), BigEndian);
        let mut records = Vec::with_capacity(count + 1);
        records.push(0);
        for _ in 0..count {
            records.push(bits.read(kind.record_bits())?);
        }

        Ok(Self { kind, records })
    }

    /// Use `BitReader` `bits` to read a value out from this table
    pub(crate) fn read_value<R: Read>(&self, bits: &mut BitReader<R, BigEndian>) -> Result<u16, Lzh8Error> {
        let mut idx = 1;
        loop {
            let right = bits.read_bit()?;
            let (child, is_leaf) = self.child(idx, right)?;
            if is_leaf {
                return self.record(child);
            }
            idx = child;
        }
    }

    /// Write `self` in the LZH8 table format: the size field, then the
    /// packed records, padded to a full word.
    pub(crate) fn write<W: Write>(&self, wtr: &mut W) -> Result<(), Lzh8Error> {
        let kind = self.kind;
        let mut buf = Vec::with_capacity(self.records.len() * 2 + 4);
        {
            let mut words = WordWriter::new(&mut buf);
            // leave space for the size
            words.write_bits(0, kind.size_field_bits())?;
            for &record in self.records.iter().skip(1) {
                words.write_bits(u32::from(record), kind.record_bits())?;
            }
            words.flush()?;
        }

        let size = buf.len() / 4 - 1;
        if size >= kind.size_limit() {
            return Err(Lzh8Error::TableTooLarge {
                table: kind,
                size,
                limit: kind.size_limit(),
            });
        }
        match kind {
            TableKind::LengthLiteral => buf[..2].copy_from_slice(&(size as u16).to_le_bytes()),
            TableKind::Displacement => buf[0] = size as u8,
        }

        wtr.write_all(&buf).map_err(Into::into)
    }

    fn record(&self, idx: usize) -> Result<u16, Lzh8Error> {
        self.records
            .get(idx)
            .copied()
            .ok_or(Lzh8Error::BadTableEncoding)
    }

    /// Follow the pointer record at `idx` to its left or right child.
    /// Returns the child's index and if that child is a leaf.
    fn child(&self, idx: usize, right: bool) -> Result<(usize, bool), Lzh8Error> {
        let offset_bits = self.kind.offset_bits();
        let record = self.record(idx)?;
        let offset = (record & ((1 << offset_bits) - 1)) as usize;
        let pair = (idx / 2 + offset + 1) * 2;

        let flag = if right {
            1 << offset_bits
        } else {
            1 << (offset_bits + 1)
        };

        Ok((pair + right as usize, record & flag != 0))
    }

    fn format_child(&self, idx: usize, right: bool, f: &mut fmt::Formatter) -> fmt::Result {
        match self.child(idx, right) {
            Ok((child, true)) => match self.record(child) {
                Ok(val) => write!(f, "{}", val),
                Err(_) => write!(f, "?"),
            },
            Ok((child, false)) => self.format_node(child, f),
            Err(_) => write!(f, "?"),
        }
    }

    fn format_node(&self, idx: usize, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        self.format_child(idx, false, f)?;
        write!(f, ", ")?;
        self.format_child(idx, true, f)?;
        write!(f, ")")
    }
}

impl fmt::Display for FlatTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.records.len() < 2 {
            write!(f, "()")
        } else {
            self.format_node(1, f)
        }
    }
}
