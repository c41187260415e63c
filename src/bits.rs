//! Bit output in 32-bit words.
//!
//! Every bit section of an LZH8 file (the two tables and the symbol stream)
//! is packed MSB first into 32-bit words that are stored big endian, and each
//! section is padded out to a whole word. A big endian bitstream that is
//! padded to a word boundary has exactly the same bytes, so this just counts
//! bits on top of a [`BitWriter`].

use bitstream_io::{BitWriter, BigEndian};
use std::io::{self, Write};

const WORD_BITS: u32 = 32;

pub(crate) struct WordWriter<W: Write> {
    bits: BitWriter<W, BigEndian>,
    /// bits already placed in the current word
    pending: u32,
}

impl<W: Write> WordWriter<W> {
    pub(crate) fn new(wtr: W) -> Self {
        Self {
            bits: BitWriter::endian(wtr, BigEndian),
            pending: 0,
        }
    }

    /// Write the low `count` bits of `value`, most significant bit first.
    /// Any bits of `value` above `count` are ignored.
    pub(crate) fn write_bits(&mut self, value: u32, count: u32) -> io::Result<()> {
        debug_assert!(count <= WORD_BITS);
        if count == 0 {
            return Ok(());
        }

        let masked = if count == WORD_BITS {
            value
        } else {
            value & ((1 << count) - 1)
        };
        self.bits.write(count, masked)?;
        self.pending = (self.pending + count) % WORD_BITS;

        Ok(())
    }

    /// Zero pad out to the end of the current word. Does nothing if
    /// the last word is already complete.
    pub(crate) fn flush(&mut self) -> io::Result<()> {
        if self.pending != 0 {
            let pad = WORD_BITS - self.pending;
            self.bits.write(pad, 0u32)?;
            self.pending = 0;
        }

        Ok(())
    }
}
