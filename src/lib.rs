//! Compress and decompress data in Nintendo's LZH8 format
//!
//! LZH8 is an LZSS pass whose output is then Huffman coded, with both Huffman
//! trees stored as flattened tables at the start of the file. See the [`format`]
//! module for the details.
//!
//! In the default [`LzssMode::Strict`] mode, the compressed output is byte for byte
//! the same as the output of Nintendo's own encoder.
//!
//! ```
//! let input = b"ABABABABAB - ABABABABAB";
//! let compressed = lzh8::encode(&input[..]).unwrap();
//! let decompressed = lzh8::decode(&compressed[..]).unwrap();
//! assert_eq!(&input[..], &decompressed[..]);
//! ```

mod bits;
mod decode;
mod encode;
mod errors;
pub mod format;

pub use decode::{decode, lzh8_info, Decoder, TableInfo};
pub use encode::{encode, EncoderBuilder, LzssMode};
pub use errors::Lzh8Error;
pub use format::{Lzh8Header, TableKind};
