use std::{collections::VecDeque, fmt, io::Write};

use slice_deque::SliceDeque;

use crate::{errors::Lzh8Error, format::TableKind};

use super::{count_needed_bits, Frequency, LogWtr};

/// Configure the LZSS matching that underlies LZH8 compression
///
/// Both modes use the same [LZSS parameters] for match lengths (3 to 258 bytes),
/// and the same 1024 bucket hash for finding candidate matches.
///
/// | Mode        | Window | Match one byte back |
/// | ----------- | :----: | :-----------------: |
/// | `Strict`    | 32768  | no                  |
/// | `NonStrict` | 65536  | yes                 |
///
/// `Strict` reproduces the output of Nintendo's encoder byte for byte.
/// `NonStrict` compresses slightly better, and is still readable by any LZH8
/// decoder. The [`default`](LzssMode::default) is `Strict`, unless this crate is
/// built with the `nonstrict` feature.
///
/// [LZSS parameters]: https://michaeldipperstein.github.io/lzss.html
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum LzssMode {
    Strict,
    NonStrict,
}

impl LzssMode {
    pub(crate) const MIN_MATCH: usize = 3;
    pub(crate) const MAX_MATCH: usize = (1 << 8) - 1 + Self::MIN_MATCH;

    /// number of input offsets that can be matched against
    pub const fn window_size(self) -> usize {
        match self {
            Self::Strict => 1 << 15,
            Self::NonStrict => 1 << 16,
        }
    }

    /// Nintendo's encoder never starts a match at the byte right before the
    /// current position
    const fn skips_previous_byte(self) -> bool {
        match self {
            Self::Strict => true,
            Self::NonStrict => false,
        }
    }
}

impl Default for LzssMode {
    fn default() -> Self {
        if cfg!(feature = "nonstrict") {
            Self::NonStrict
        } else {
            Self::Strict
        }
    }
}

impl fmt::Display for LzssMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict ({} byte window)", self.window_size()),
            Self::NonStrict => write!(f, "nonstrict ({} byte window)", self.window_size()),
        }
    }
}

/// One step of the LZSS pass: either a byte to copy, or a copy-back
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Symbol {
    Literal(u8),
    Reference { length: u16, displacement: u32 },
}

impl Symbol {
    /// the code for this symbol in the length/literal alphabet
    pub(crate) fn length_literal(&self) -> u16 {
        match *self {
            Self::Literal(byte) => u16::from(byte),
            Self::Reference { length, .. } => 0x100 | (length - LzssMode::MIN_MATCH as u16),
        }
    }

    /// the stored displacement value (`displacement - 1`) of a reference
    pub(crate) fn offset_field(&self) -> Option<u32> {
        match *self {
            Self::Literal(..) => None,
            Self::Reference { displacement, .. } => Some(displacement - 1),
        }
    }

    /// total number of bytes this symbol encodes from the uncoded input
    pub(crate) fn size(&self) -> usize {
        match *self {
            Self::Literal(..) => 1,
            Self::Reference { length, .. } => length as usize,
        }
    }
}

/// Symbol frequencies for the two LZH8 alphabets
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Frequencies {
    pub length_literal: Vec<Frequency>,
    pub displacement: Vec<Frequency>,
}

impl Frequencies {
    pub(crate) fn get(&self, kind: TableKind) -> &[Frequency] {
        match kind {
            TableKind::LengthLiteral => &self.length_literal,
            TableKind::Displacement => &self.displacement,
        }
    }
}

#[derive(Debug)]
pub(crate) struct LzssPass {
    pub buf: Vec<Symbol>,
    pub decompressed_size: usize,
}

impl LzssPass {
    fn new(input_size: usize) -> Self {
        Self {
            buf: Vec::with_capacity(input_size / 2),
            decompressed_size: input_size,
        }
    }

    /// Count how often each length/literal code and each displacement
    /// bit length is used
    pub(crate) fn frequencies(&self) -> Frequencies {
        let mut freqs = Frequencies {
            length_literal: vec![0; TableKind::LengthLiteral.symbol_count()],
            displacement: vec![0; TableKind::Displacement.symbol_count()],
        };

        for symbol in &self.buf {
            freqs.length_literal[symbol.length_literal() as usize] += 1;
            if let Some(offset) = symbol.offset_field() {
                freqs.displacement[count_needed_bits(offset) as usize] += 1;
            }
        }

        freqs
    }
}

impl fmt::Display for LzssPass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "# LZSS Encoded File")?;
        let mut position = 0;
        for (i, symbol) in self.buf.iter().enumerate() {
            write!(f, "{:08x} symbol {}: ", position, i)?;
            match symbol {
                Symbol::Literal(b) => writeln!(f, "literal {:02X}", b),
                Symbol::Reference {
                    length,
                    displacement,
                } => writeln!(f, "{} bytes, offset {}", length, displacement),
            }?;
            position += symbol.size();
        }

        Ok(())
    }
}

const HASH_BUCKETS: usize = 1024;
const PROGRESS_INTERVAL: usize = 0x40000;

/// The hash from Sadakane and Imai, as recommended by Michael Dipperstein.
/// Nintendo's output depends on the exact bucket order, so don't change this.
fn hash(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .fold(0, |key, &b| ((key << 5) ^ b as usize) % HASH_BUCKETS)
}

/// Offsets of every 3-byte string in the dictionary, bucketed by hash
#[derive(Debug)]
struct HashWindow {
    capacity: usize,
    /// most recent offset at the front of each bucket
    buckets: Vec<VecDeque<usize>>,
    /// (offset, bucket) for every entry, oldest first
    queue: SliceDeque<(usize, usize)>,
}

impl HashWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buckets: vec![VecDeque::new(); HASH_BUCKETS],
            queue: SliceDeque::with_capacity(capacity),
        }
    }

    /// candidate offsets for `key`, newest first
    fn candidates(&self, key: usize) -> impl Iterator<Item = usize> + '_ {
        self.buckets[key].iter().copied()
    }

    fn is_full(&self) -> bool {
        self.queue.len() == self.capacity
    }

    /// Drop the oldest string from the dictionary
    fn evict(&mut self) {
        if let Some((offset, key)) = self.queue.pop_front() {
            let oldest = self.buckets[key].pop_back();
            debug_assert_eq!(oldest, Some(offset), "oldest entry must end its bucket");
        }
    }

    fn insert(&mut self, offset: usize, key: usize) {
        debug_assert!(!self.is_full(), "window overflow");
        self.buckets[key].push_front(offset);
        self.queue.push_back((offset, key));
    }
}

/// Compress `input` into a series of literal bytes and copy-backs.
/// Progress will be printed to `log` if present.
pub(crate) fn compress(
    input: &[u8],
    mode: LzssMode,
    log: &mut Option<LogWtr>,
) -> Result<LzssPass, Lzh8Error> {
    let min = LzssMode::MIN_MATCH;
    let mut window = HashWindow::new(mode.window_size());
    let mut output = LzssPass::new(input.len());
    let mut last_report: Option<usize> = None;

    let mut done = 0;
    while done < input.len() {
        if let Some(wtr) = log.as_mut() {
            if last_report.map_or(true, |last| done - last >= PROGRESS_INTERVAL) {
                let pct = done as f64 / input.len() as f64 * 100.0;
                writeln!(wtr, "{} bytes done ({:.0}%)", done, pct)?;
                last_report = Some(done);
            }
        }

        let symbol = match find_match(input, done, &window, mode) {
            Some((length, start)) => Symbol::Reference {
                length: length as u16,
                displacement: (done - start) as u32,
            },
            None => Symbol::Literal(input[done]),
        };
        output.buf.push(symbol);

        // one dictionary entry for each byte passed over
        for _ in 0..symbol.size() {
            if window.is_full() {
                window.evict();
            }
            if input.len() - done >= min {
                window.insert(done, hash(&input[done..done + min]));
            }
            done += 1;
        }
    }

    Ok(output)
}

/// Search the dictionary for the longest match for the bytes at `pos`.
/// Among matches of the same length, the most recent wins.
/// Returns the match length and the offset where it starts.
fn find_match(
    input: &[u8],
    pos: usize,
    window: &HashWindow,
    mode: LzssMode,
) -> Option<(usize, usize)> {
    let min = LzssMode::MIN_MATCH;
    if pos + min > input.len() {
        return None;
    }

    let end = input.len().min(pos + LzssMode::MAX_MATCH);
    let ahead = &input[pos..end];
    let mut best: Option<(usize, usize)> = None;

    for candidate in window.candidates(hash(&input[pos..pos + min])) {
        if mode.skips_previous_byte() && candidate + 1 == pos {
            continue;
        }

        let length = input[candidate..]
            .iter()
            .zip(ahead)
            .take_while(|(s, d)| s == d)
            .count();

        if length > best.map_or(0, |(l, _)| l) {
            best = Some((length, candidate));
        }
    }

    best.filter(|&(length, _)| length >= min)
}
