use crate::errors::Lzh8Error;
use crate::format::{FlatTable, Lzh8Header, TableKind};
use bitstream_io::{BitReader, BigEndian};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, Cursor, Read, Write},
    path::Path,
};

type LogWtr<'a> = &'a mut dyn Write;
// [length/literal, displacement]
type RawTables = [FlatTable; 2];

const MAX_PREALLOC: usize = 1 << 20;

/// Textual representations of the two Huffman tables in LZH8 data
///
/// The tables are shown as the trees they flatten: decimal numbers are the leaves,
/// and each pair of parentheses is a node. The left branch of a node is a `0` bit
/// and the right branch is a `1` bit. So in `((65, 66), (259, (0, 10)))`, `65` has
/// the code `00` and `0` has the code `110`.
///
/// Length/literal values below 256 are literal bytes, and the rest are copy-back
/// lengths (`value - 256 + 3`). Displacement values are the bit length of
/// `displacement - 1`.
///
/// You can get a `TableInfo` by using [`lzh8_info`] or [`Decoder::tables`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub lengths: String,
    pub displacements: String,
}

impl From<&RawTables> for TableInfo {
    fn from([lengths, displacements]: &RawTables) -> Self {
        Self {
            lengths: lengths.to_string(),
            displacements: displacements.to_string(),
        }
    }
}

/// Specify the decoding settings, such as logging, input, and output.
///
/// To create a new `Decoder`, use [`for_reader()`], [`for_bytes()`], or
/// [`for_file()`]. Then, change any of the decoder settings.
/// Finally, decode the input data with [`decode()`].
/// ```
/// # use lzh8::{EncoderBuilder, Decoder};
/// let original = b"ABBACABBACD";
/// let compressed = EncoderBuilder::for_bytes(original)
///     .encode_to_vec()
///     .unwrap();
/// let decompressed = Decoder::for_bytes(&compressed)
///     .decode()
///     .unwrap();
/// assert_eq!(&original[..], decompressed);
/// ```
/// You can use a `Decoder` to get the [`Lzh8Header`] with [`header()`]
///  or [`TableInfo`] with [`tables()`]:
/// ```
/// # use lzh8::{EncoderBuilder, Decoder};
/// # let original = b"ABBACABBACD";
/// # let compressed = EncoderBuilder::for_bytes(original).encode_to_vec().unwrap();
/// let mut decoder = Decoder::for_bytes(&compressed);
/// let size = decoder.header().unwrap().size as usize;
/// assert_eq!(size, original.len());
/// ```
/// [`for_reader()`]: Decoder::for_reader
/// [`for_bytes()`]: Decoder::for_bytes
/// [`for_file()`]: Decoder::for_file
/// [`decode()`]: Decoder::decode
/// [`header()`]: Decoder::header
/// [`tables()`]: Decoder::tables
pub struct Decoder<'a, R: Read> {
    src: R,
    log: Option<LogWtr<'a>>,
    info: Option<(Lzh8Header, RawTables)>,
}

impl<'a, R: Read> Decoder<'a, R> {
    #[inline]
    pub fn for_reader(rdr: R) -> Self {
        Self {
            src: rdr,
            log: None,
            info: None,
        }
    }

    #[inline]
    pub fn with_logging<W: Write>(&mut self, wtr: &'a mut W) -> &mut Self {
        self.log = Some(wtr as LogWtr);
        self
    }

    #[inline]
    pub fn header(&mut self) -> Result<Lzh8Header, Lzh8Error> {
        self.get_file_info().map(|(hdr, _)| *hdr)
    }

    #[inline]
    pub fn tables(&mut self) -> Result<TableInfo, Lzh8Error> {
        self.get_file_info().map(|(_, t)| t.into())
    }

    #[inline]
    pub fn decode(&mut self) -> Result<Vec<u8>, Lzh8Error> {
        do_decode(self)
    }

    fn get_file_info(&mut self) -> Result<&(Lzh8Header, RawTables), Lzh8Error> {
        if self.info.is_none() {
            let hdr = Lzh8Header::read(&mut self.src)?;
            let lengths = FlatTable::read(&mut self.src, TableKind::LengthLiteral)?;
            let displacements = FlatTable::read(&mut self.src, TableKind::Displacement)?;

            self.info = Some((hdr, [lengths, displacements]));
        }

        self.info.as_ref().ok_or(Lzh8Error::BadTableEncoding)
    }
}

impl<'a> Decoder<'a, Cursor<&'a [u8]>> {
    #[inline]
    pub fn for_bytes(bytes: &'a [u8]) -> Self {
        let rdr = Cursor::new(bytes);
        Self::for_reader(rdr)
    }
}

impl<'a> Decoder<'a, BufReader<File>> {
    #[inline]
    pub fn for_file<P: AsRef<Path>>(p: P) -> Result<Self, Lzh8Error> {
        File::open(p)
            .map(BufReader::new)
            .map(Self::for_reader)
            .map_err(Into::into)
    }
}

/// Decompress LZH8 data into a `Vec<u8>`
///
/// This is a convenience function to decode a `Read`er without
/// having to import and set up a [`Decoder`]
pub fn decode<R: Read>(rdr: R) -> Result<Vec<u8>, Lzh8Error> {
    Decoder::for_reader(rdr).decode()
}

/// Extract the [`Lzh8Header`] and [`TableInfo`] from LZH8 data
///
/// This is a convenience function to extract information about LZH8 data without having
/// to set up a [`Decoder`]
pub fn lzh8_info<R: Read>(rdr: R) -> Result<(Lzh8Header, TableInfo), Lzh8Error> {
    let mut decoder = Decoder::for_reader(rdr);

    decoder
        .header()
        .and_then(|hdr| decoder.tables().map(|t| (hdr, t)))
}

fn do_decode<R: Read>(opt: &mut Decoder<R>) -> Result<Vec<u8>, Lzh8Error> {
    opt.get_file_info()?;
    let Decoder { src, log, info } = opt;
    let (header, [lengths, displacements]) = match info {
        Some(info) => info,
        None => return Err(Lzh8Error::BadTableEncoding),
    };

    // set up the log with a map to store the bitsizes of the displacements
    let mut log = log.as_mut().map(|l| (l, BTreeMap::<u32, u32>::new()));

    if let Some((wtr, _)) = &mut log {
        writeln!(wtr, "# Header\n{:?}", &header)?;
        writeln!(wtr, "## Length / Literal Table\n{}", lengths)?;
        writeln!(wtr, "## Displacement Table\n{}", displacements)?;
        writeln!(wtr)?;
    }

    let output_size = header.size as usize;
    // the header size is unchecked until the data runs out
    let mut output: Vec<u8> = Vec::with_capacity(output_size.min(MAX_PREALLOC));
    let mut bits = BitReader::endian(src, BigEndian);

    while output.len() < output_size {
        let value = lengths.read_value(&mut bits)?;
        if value < 0x100 {
            let byte = value as u8;
            output.push(byte);

            if let Some((wtr, _)) = &mut log {
                writeln!(wtr, "{:04x} - Uncoded: {:02x}", output.len() - 1, byte)?;
            }
            continue;
        }

        let size = (value & 0xFF) as usize + 3;
        let disp_bits = u32::from(displacements.read_value(&mut bits)?);
        let stored = match disp_bits {
            0 | 1 => disp_bits,
            n => (1 << (n - 1)) | bits.read::<u32>(n - 1)?,
        };
        let move_back = stored as usize + 1;

        if move_back > output.len() {
            return Err(Lzh8Error::BadLookBack(move_back, output.len()));
        }
        let start = output.len() - move_back;

        if let Some((wtr, map)) = &mut log {
            writeln!(
                wtr,
                "{:04x} - Encoded [Copyback]: size: {} mb: {} ({} bits) | start: {:04x}",
                output.len(),
                size,
                move_back,
                disp_bits,
                start
            )?;
            *map.entry(disp_bits).or_insert(0) += 1;
        }

        // copies can overlap their own output
        for i in start..start + size {
            let byte = output[i];
            output.push(byte);
        }
    }

    // a copy-back can run past the end of the data
    output.truncate(output_size);

    if let Some((wtr, map)) = &mut log {
        writeln!(wtr, "\n# Displacement bit lengths\n{:?}", map)?;
    }

    Ok(output)
}
