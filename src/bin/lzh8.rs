//! lzh8 CLI - compress or decompress a file in Nintendo's LZH8 format

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use lzh8::{Decoder, EncoderBuilder, LzssMode};

/// Compress a file to LZH8, or decompress an LZH8 file with `-d`.
#[derive(Parser, Debug)]
#[command(name = "lzh8")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to read
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// File to create
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Decompress INPUT instead of compressing it
    #[arg(short, long)]
    decompress: bool,

    /// LZSS matching mode (defaults to the mode this tool was built with)
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Write diagnostics to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// 32 KiB window, identical to Nintendo's output
    Strict,
    /// 64 KiB window, slightly smaller output
    Nonstrict,
}

impl From<ModeArg> for LzssMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Strict => LzssMode::Strict,
            ModeArg::Nonstrict => LzssMode::NonStrict,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let stderr = io::stderr();
    let mut log = stderr.lock();

    if args.decompress {
        let mut decoder = Decoder::for_file(&args.input)?;
        if args.verbose {
            decoder.with_logging(&mut log);
        }
        let output = decoder.decode()?;
        fs::write(&args.output, &output)?;

        if args.verbose {
            writeln!(io::stderr(), "Decompressed {} bytes", output.len())?;
        }
    } else {
        let mut encoder = EncoderBuilder::for_file(&args.input)?;
        encoder.mode(args.mode.map_or_else(LzssMode::default, Into::into));
        if args.verbose {
            encoder.with_logging(&mut log);
        }
        encoder.encode_to_file(&args.output)?;

        if args.verbose {
            let size = fs::metadata(&args.output)?.len();
            writeln!(io::stderr(), "Compressed to {} bytes", size)?;
        }
    }

    Ok(())
}
