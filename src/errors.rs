use std::io;

use thiserror::Error;

use crate::format::TableKind;

/// Possible errors that arise from attempting to compress data into LZH8,
/// or to decompress LZH8 data back out.
#[derive(Error, Debug)]
pub enum Lzh8Error {
    #[error("Input of {0} bytes is too large for an LZH8 header")]
    InputTooLarge(u64),

    #[error("Huffman code for symbol {symbol:#x} is longer than {max} bits")]
    CodeTooLong { symbol: u16, max: u32 },

    #[error("Table record {record} needs offset {offset}, which does not fit in {bits} bits")]
    TableOffsetOverflow {
        record: usize,
        offset: usize,
        bits: u32,
    },

    #[error("{table} table size {size} does not fit below {limit}")]
    TableTooLarge {
        table: TableKind,
        size: usize,
        limit: usize,
    },

    #[error("No Huffman code was generated for symbol {0:#x}")]
    MissingCode(u16),

    #[error("Invalid header for LZH8 data (compression type {0:#04x})")]
    InvalidHeader(u8),

    #[error("Huffman table is not encoded correctly")]
    BadTableEncoding,

    #[error("Bad lookback of {0} bytes with only {1} bytes decoded")]
    BadLookBack(usize, usize),

    #[error("{0}")]
    Io(#[from] io::Error),
}
