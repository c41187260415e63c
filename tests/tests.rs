use std::io::Cursor;

use lzh8::{Decoder, EncoderBuilder, Lzh8Error, LzssMode};
use proptest::prelude::*;

const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod \
    tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis nostrud \
    exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat. Duis aute irure dolor \
    in reprehenderit in voluptate velit esse cillum dolore eu fugiat nulla pariatur. Excepteur \
    sint occaecat cupidatat non proident, sunt in culpa qui officia deserunt mollit anim id est \
    laborum. Lorem ipsum dolor sit amet, consectetur adipiscing elit.";

/// xorshift bytes, so the "random" tests are repeatable
fn noise(len: usize, mut state: u32) -> Vec<u8> {
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

fn round_trip(input: &[u8], mode: LzssMode) -> Vec<u8> {
    let compressed = EncoderBuilder::for_bytes(input)
        .mode(mode)
        .encode_to_vec()
        .unwrap();
    let decompressed = Decoder::for_bytes(&compressed).decode().unwrap();
    assert_eq!(input.len(), decompressed.len(), "{} round trip length", mode);
    assert!(input == &decompressed[..], "{} round trip data", mode);

    compressed
}

#[test]
fn empty_input() {
    let compressed = lzh8::encode(Cursor::new(b"")).unwrap();
    assert_eq!(compressed.len(), 16);
    assert_eq!(&compressed[..8], &[0x40, 0, 0, 0, 0, 0, 0, 0]);

    let (header, info) = lzh8::lzh8_info(&compressed[..]).unwrap();
    assert_eq!(header.size, 0);
    assert!(header.is_extended());
    assert_eq!(info.lengths, "()");
    assert_eq!(info.displacements, "()");

    assert!(lzh8::decode(&compressed[..]).unwrap().is_empty());
}

#[test]
fn single_byte() {
    let compressed = lzh8::encode(&b"A"[..]).unwrap();
    let expected: &[u8] = &[
        0x40, 0x01, 0x00, 0x00, 0x01, 0x00, 0xC0, 0x10, 0x48, 0x20, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x80, 0x00, 0x00, 0x00,
    ];
    assert_eq!(compressed, expected);
    assert_eq!(lzh8::decode(&compressed[..]).unwrap(), b"A");
}

fn matches_fixture(input: &[u8], fixture: &[u8], mode: LzssMode) {
    let compressed = EncoderBuilder::for_bytes(input)
        .mode(mode)
        .encode_to_vec()
        .unwrap();
    assert_eq!(compressed.len(), fixture.len(), "{} compressed length", mode);
    assert!(compressed == fixture, "{} compressed data", mode);

    let decompressed = lzh8::decode(&fixture[..]).unwrap();
    assert!(decompressed == input, "{} fixture decodes", mode);
}

#[test]
fn lorem_fixture() {
    let lorem = include_bytes!("lorem.txt");
    let lorem_lzh8 = include_bytes!("lorem.lzh8");
    let lorem_nonstrict = include_bytes!("lorem-nonstrict.lzh8");

    matches_fixture(lorem, lorem_lzh8, LzssMode::Strict);
    matches_fixture(lorem, lorem_nonstrict, LzssMode::NonStrict);
}

#[test]
fn mixed_fixture() {
    // skewed literals, long runs, and copies of many lengths and distances.
    // Deep enough trees that flattening has to split subtrees
    let mixed = include_bytes!("mixed.bin");
    let mixed_lzh8 = include_bytes!("mixed.lzh8");
    let mixed_nonstrict = include_bytes!("mixed-nonstrict.lzh8");

    matches_fixture(mixed, mixed_lzh8, LzssMode::Strict);
    matches_fixture(mixed, mixed_nonstrict, LzssMode::NonStrict);
    assert!(mixed_nonstrict.len() < mixed_lzh8.len());
}

#[test]
fn repeating_pair_tables() {
    let compressed = lzh8::encode(&b"ABABABABAB"[..]).unwrap();
    let mut decoder = Decoder::for_bytes(&compressed);

    assert_eq!(decoder.header().unwrap().size, 10);
    let tables = decoder.tables().unwrap();
    // 'A', 'B', and a copy of 8 bytes (0x105)
    assert_eq!(tables.lengths, "(261, (65, 66))");
    assert_eq!(tables.displacements, "(1, 1)");

    // the header and tables are only read once
    assert_eq!(decoder.decode().unwrap(), b"ABABABABAB");
}

#[test]
fn text() {
    for &mode in &[LzssMode::Strict, LzssMode::NonStrict] {
        let compressed = round_trip(LOREM.as_bytes(), mode);
        assert!(compressed.len() < LOREM.len());
    }
}

#[test]
fn repeated_byte() {
    let input = vec![b'A'; 1000];
    for &mode in &[LzssMode::Strict, LzssMode::NonStrict] {
        let compressed = round_trip(&input, mode);
        assert!(compressed.len() < 64, "{} bytes with {}", compressed.len(), mode);
    }
}

#[test]
fn incompressible() {
    let input = noise(5000, 0x1234_5678);
    round_trip(&input, LzssMode::Strict);
    round_trip(&input, LzssMode::NonStrict);
}

#[test]
fn every_byte_and_length() {
    // every literal value, and runs of every copy length
    let mut input: Vec<u8> = (0..=255).collect();
    for len in 3..=300 {
        input.extend((0..len).map(|i| (i % 7) as u8 + b'a'));
        input.push((len % 256) as u8);
    }
    round_trip(&input, LzssMode::Strict);
    round_trip(&input, LzssMode::NonStrict);
}

#[test]
fn beyond_the_window() {
    // the repeat of `block` is only in reach of the 64 KiB window, and the
    // input is long enough that old hash entries have to be evicted
    let block = noise(20_000, 0xDEAD_BEEF);
    let mut input = block.clone();
    input.extend(noise(30_000, 0x0BAD_F00D));
    input.extend_from_slice(&block);
    input.extend_from_slice(&block[..5000]);

    let strict = round_trip(&input, LzssMode::Strict);
    let nonstrict = round_trip(&input, LzssMode::NonStrict);
    assert!(nonstrict.len() + 10_000 < strict.len());
}

#[test]
fn structured_data() {
    let input: Vec<u8> = (0..100_000u32)
        .flat_map(|i| {
            let record = i / 16;
            vec![(record & 0xFF) as u8, (record >> 8) as u8, 0, (i % 3) as u8]
        })
        .collect();
    round_trip(&input, LzssMode::Strict);
}

#[test]
fn deterministic() {
    let input = noise(3000, 42)
        .into_iter()
        .map(|b| b % 4)
        .collect::<Vec<_>>();
    let first = lzh8::encode(&input[..]).unwrap();
    let second = lzh8::encode(&input[..]).unwrap();
    assert_eq!(first, second);
}

#[test]
fn default_mode() {
    let input = LOREM.as_bytes();
    let default = EncoderBuilder::for_bytes(input).encode_to_vec().unwrap();
    let explicit = EncoderBuilder::for_bytes(input)
        .mode(LzssMode::default())
        .encode_to_vec()
        .unwrap();
    assert_eq!(default, explicit);

    if cfg!(feature = "nonstrict") {
        assert_eq!(LzssMode::default(), LzssMode::NonStrict);
    } else {
        assert_eq!(LzssMode::default(), LzssMode::Strict);
    }
}

#[test]
fn files() -> Result<(), Lzh8Error> {
    let dir = std::env::temp_dir();
    let original = dir.join(format!("lzh8-test-{}.txt", std::process::id()));
    let compressed = original.with_extension("lzh8");
    std::fs::write(&original, LOREM)?;

    EncoderBuilder::for_file(&original)?.encode_to_file(&compressed)?;
    let decoded = Decoder::for_file(&compressed)?.decode()?;
    assert_eq!(decoded, LOREM.as_bytes());

    std::fs::remove_file(&original)?;
    std::fs::remove_file(&compressed)?;

    Ok(())
}

#[test]
fn logging() {
    let input = vec![0u8; 0x50000];
    let mut log = Vec::new();
    let compressed = EncoderBuilder::for_bytes(&input)
        .mode(LzssMode::Strict)
        .with_logging(&mut log)
        .encode_to_vec()
        .unwrap();
    let log = String::from_utf8(log).unwrap();
    assert!(log.contains("0 bytes done (0%)"));
    assert!(log.contains("Huff Lengths / Literals"));

    let mut log = Vec::new();
    let decoded = Decoder::for_bytes(&compressed)
        .with_logging(&mut log)
        .decode()
        .unwrap();
    assert_eq!(decoded, input);
    let log = String::from_utf8(log).unwrap();
    assert!(log.starts_with("# Header"));
    assert!(log.contains("Encoded [Copyback]"));
}

#[test]
fn decode_bad_file() {
    let mut bad = lzh8::encode(LOREM.as_bytes()).unwrap();
    bad[0] = 0x10;

    match lzh8::decode(&bad[..]) {
        Err(Lzh8Error::InvalidHeader(0x10)) => {}
        other => panic!("Expected a bad header, got {:?}", other),
    }
}

#[test]
fn decode_truncated_file() {
    let compressed = lzh8::encode(LOREM.as_bytes()).unwrap();
    let truncated = &compressed[..compressed.len() - 8];

    assert!(lzh8::decode(truncated).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_round_trip(data in proptest::collection::vec(any::<u8>(), 0..4000)) {
        let compressed = lzh8::encode(&data[..]).unwrap();
        let decoded = lzh8::decode(&compressed[..]).unwrap();
        prop_assert_eq!(decoded, data);
    }

    #[test]
    fn prop_round_trip_small_alphabet(
        data in proptest::collection::vec(0u8..4, 0..8000),
        nonstrict in any::<bool>(),
    ) {
        let mode = if nonstrict { LzssMode::NonStrict } else { LzssMode::Strict };
        let compressed = EncoderBuilder::for_bytes(&data).mode(mode).encode_to_vec().unwrap();
        let decoded = lzh8::decode(&compressed[..]).unwrap();
        prop_assert_eq!(decoded, data);
    }
}
