use crate::{
    bits::WordWriter,
    errors::Lzh8Error,
    format::Lzh8Header,
};
use smallvec::SmallVec;
use std::{
    fs::File,
    io::Write,
    io::{BufReader, BufWriter, Cursor, Read},
    path::Path,
};

mod flatten;
mod huffman;
pub(crate) mod lzss;

pub use self::lzss::LzssMode;
use self::{
    huffman::EncodedTables,
    lzss::{LzssPass, Symbol},
};

pub(crate) type Frequency = u64;
pub(crate) type LogWtr<'a> = &'a mut dyn Write;

/// Specify the encoding settings, such as the LZSS mode, logging, input, and output
///
/// To create a new `EncoderBuilder`, use [`for_reader()`], [`for_file()`], or [`for_bytes()`].
/// Then, change any of the encoding settings with `EncoderBuilder`'s helper methods.
/// Finally, encode the input data with [`encode_to_writer()`], [`encode_to_file()`], or [`encode_to_vec()`].
/// ```
/// # use lzh8::{EncoderBuilder, LzssMode};
/// let input = b"ABBACABBCADFEGABA";
/// let compressed = EncoderBuilder::for_bytes(input)
///     .mode(LzssMode::NonStrict)
///     .with_logging(&mut ::std::io::stdout())
///     .encode_to_vec();
/// ```
///
/// The default encoding settings are as follows:
/// * [`LzssMode::default()`] (strict, unless built with the `nonstrict` feature)
/// * No logging
///
/// [`for_reader()`]: EncoderBuilder::for_reader
/// [`for_file()`]: EncoderBuilder::for_file
/// [`for_bytes()`]: EncoderBuilder::for_bytes
/// [`encode_to_writer()`]: EncoderBuilder::encode_to_writer
/// [`encode_to_file()`]: EncoderBuilder::encode_to_file
/// [`encode_to_vec()`]: EncoderBuilder::encode_to_vec
pub struct EncoderBuilder<'a, R> {
    rdr: R,
    mode: LzssMode,
    log: Option<LogWtr<'a>>,
}

impl<'a, R: Read> EncoderBuilder<'a, R> {
    /// Create a new `EncoderBuilder` for the data in `rdr`.
    #[inline]
    pub fn for_reader(rdr: R) -> Self {
        Self {
            rdr,
            mode: LzssMode::default(),
            log: None,
        }
    }

    /// Set the mode used for the underlying LZSS matching. See [`LzssMode`] for more details.
    #[inline]
    pub fn mode(&mut self, mode: LzssMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Write debugging and diagnostic information to `log` while the input is
    /// being encoded.
    #[inline]
    pub fn with_logging<L: Write>(&mut self, log: &'a mut L) -> &mut Self {
        let log = Some(log as &'a mut dyn Write);
        self.log = log;
        self
    }

    /// Start the encoding and write the compressed data out to `wtr`
    #[inline]
    pub fn encode_to_writer<W: Write>(&mut self, wtr: W) -> Result<(), Lzh8Error> {
        do_encode(self, wtr)
    }

    /// Start the encoding and write the compressed data out to the newly created
    /// `File` `f`
    #[inline]
    pub fn encode_to_file<P: AsRef<Path>>(&mut self, f: P) -> Result<(), Lzh8Error> {
        let mut wtr = BufWriter::new(File::create(f)?);
        self.encode_to_writer(&mut wtr)?;
        wtr.flush().map_err(Into::into)
    }

    /// Start the encoding and return the compressed data in a `Vec<u8>`.
    #[inline]
    pub fn encode_to_vec(&mut self) -> Result<Vec<u8>, Lzh8Error> {
        let data = Vec::new();
        let mut csr = Cursor::new(data);
        self.encode_to_writer(&mut csr).map(|_| csr.into_inner())
    }
}

impl<'a> EncoderBuilder<'a, BufReader<File>> {
    /// Create a new `EncoderBuilder` for the file at `p`.
    #[inline]
    pub fn for_file<P: AsRef<Path>>(p: P) -> Result<Self, Lzh8Error> {
        let rdr = BufReader::new(File::open(p)?);
        Ok(Self::for_reader(rdr))
    }
}

impl<'a> EncoderBuilder<'a, Cursor<&'a [u8]>> {
    /// Create a new `EncoderBuilder` for the data the `bytes` slice.
    #[inline]
    pub fn for_bytes(bytes: &'a [u8]) -> Self {
        let rdr = Cursor::new(bytes);
        Self::for_reader(rdr)
    }
}

/// Compress data into an LZH8 `Vec<u8>`
///
/// This is a convenience function to encode a `Read`er without having to
/// import and set up an [`EncoderBuilder`].
pub fn encode<R: Read>(rdr: R) -> Result<Vec<u8>, Lzh8Error> {
    EncoderBuilder::for_reader(rdr).encode_to_vec()
}

fn do_encode<R: Read, W: Write>(
    opts: &mut EncoderBuilder<'_, R>,
    mut wtr: W,
) -> Result<(), Lzh8Error> {
    let EncoderBuilder { rdr, mode, log } = opts;

    let mut input = Vec::new();
    rdr.read_to_end(&mut input)?;
    // check the size before spending time on the LZSS pass
    let header = Lzh8Header::for_length(input.len() as u64)?;

    if let Some(wtr) = log.as_mut() {
        writeln!(wtr, "# Encoding {} bytes, {}", input.len(), mode)?;
    }

    let lzss = lzss::compress(&input, *mode, log)?;
    let freqs = lzss.frequencies();
    let tables = EncodedTables::new(&freqs)?;

    if let Some(wtr) = log.as_mut() {
        writeln!(wtr, "{}", &lzss)?;
        writeln!(wtr, "Length/Literal Frequencies\n{:?}", &freqs.length_literal[..])?;
        writeln!(wtr, "Displacement Frequencies\n{:?}", &freqs.displacement[..])?;
        writeln!(wtr, "Huff Lengths / Literals\n{}", tables.lengths)?;
        writeln!(wtr, "Huff Displacements\n{}", tables.displacements)?;
    }

    write_file(&mut wtr, header, &lzss, &tables)
}

fn write_file<W: Write>(
    wtr: &mut W,
    header: Lzh8Header,
    encoded_data: &LzssPass,
    tables: &EncodedTables,
) -> Result<(), Lzh8Error> {
    debug_assert_eq!(header.size as usize, encoded_data.decompressed_size);

    header.write(wtr)?;
    tables.lengths.table.write(wtr)?;
    tables.displacements.table.write(wtr)?;

    let mut out = WordWriter::new(wtr);
    for symbol in &encoded_data.buf {
        for (value, count) in symbol_fields(symbol, tables)? {
            out.write_bits(value, count)?;
        }
    }
    out.flush()?;

    Ok(())
}

/// The bit fields for `symbol`, as (value, bit count) pairs:
/// the length/literal code, then for references the displacement
/// code and the displacement bits below the leading one.
fn symbol_fields(
    symbol: &Symbol,
    tables: &EncodedTables,
) -> Result<SmallVec<[(u32, u32); 3]>, Lzh8Error> {
    let mut fields = SmallVec::new();

    let code = tables.lengths.get(symbol.length_literal())?;
    fields.push((code.code, code.bitlen()));

    if let Some(offset) = symbol.offset_field() {
        let needed_bits = count_needed_bits(offset);
        let code = tables.displacements.get(needed_bits as u16)?;
        fields.push((code.code, code.bitlen()));

        if offset > 1 {
            fields.push((offset, needed_bits - 1));
        }
    }

    Ok(fields)
}

/// calculate how many bits are needed to represent `val`
const fn count_needed_bits(val: u32) -> u32 {
    32 - val.leading_zeros()
}

#[cfg(test)]
mod test {
    use super::*;

    fn tables_for(pass: &LzssPass) -> EncodedTables {
        EncodedTables::new(&pass.frequencies()).unwrap()
    }

    #[test]
    fn needed_bits() {
        let cases = [(0, 0), (1, 1), (2, 2), (3, 2), (4, 3), (0x7FFF, 15), (0xFFFF, 16)];
        for &(val, bits) in &cases {
            assert_eq!(count_needed_bits(val), bits, "bits for {:#x}", val);
        }
    }

    #[test]
    fn reference_fields() {
        let pass = lzss::compress(b"ABCDABCDxyzxyzxyz", LzssMode::Strict, &mut None).unwrap();
        let tables = tables_for(&pass);

        let reference = pass
            .buf
            .iter()
            .find(|s| s.offset_field() == Some(3))
            .expect("ABCD should be copied from 4 bytes back");
        let fields = symbol_fields(reference, &tables).unwrap();
        assert_eq!(fields.len(), 3);
        // 3 is 0b11; the leading one is implied, the low bit is stored
        assert_eq!(fields[2], (3, 1));
    }

    #[test]
    fn short_displacements_have_no_extra_bits() {
        // "AB" repeated copies from two back, stored as one
        let pass = lzss::compress(b"ABABABABAB", LzssMode::Strict, &mut None).unwrap();
        let tables = tables_for(&pass);

        let fields = symbol_fields(&pass.buf[2], &tables).unwrap();
        assert_eq!(fields.len(), 2);
        // the only displacement gets the one bit code "1"
        assert_eq!(fields[1], (1, 1));
    }

    #[test]
    fn single_literal_file() -> Result<(), Lzh8Error> {
        let out = EncoderBuilder::for_bytes(b"A").encode_to_vec()?;
        let expected: &[u8] = &[
            0x40, 0x01, 0x00, 0x00, // header
            0x01, 0x00, 0xC0, 0x10, 0x48, 0x20, 0x00, 0x00, // length/literal table
            0x00, 0x00, 0x00, 0x00, // empty displacement table
            0x80, 0x00, 0x00, 0x00, // 'A' is "1"
        ];
        assert_eq!(out, expected);

        Ok(())
    }

    #[test]
    fn empty_file() -> Result<(), Lzh8Error> {
        let out = EncoderBuilder::for_bytes(b"").encode_to_vec()?;
        let expected: &[u8] = &[
            0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // extended header
            0x00, 0x00, 0x00, 0x00, // empty length/literal table
            0x00, 0x00, 0x00, 0x00, // empty displacement table
        ];
        assert_eq!(out, expected);

        Ok(())
    }

    #[test]
    fn logging_reports_tables() -> Result<(), Lzh8Error> {
        let mut log = Vec::new();
        EncoderBuilder::for_bytes(b"ABABABABAB")
            .mode(LzssMode::Strict)
            .with_logging(&mut log)
            .encode_to_vec()?;

        let log = String::from_utf8(log).unwrap();
        assert!(log.contains("# Encoding 10 bytes, strict"));
        assert!(log.contains("8 bytes, offset 2"));
        assert!(log.contains("Huff Displacements\n1 : 1\n(1, 1)"));

        Ok(())
    }
}
