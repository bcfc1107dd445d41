use chd::{Chd, ChdBuilder};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Error, ErrorKind, Result, Write};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Info(args) => run_info(args),
        Command::Convert(args) => run_convert(args),
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "chd utility for inspecting and creating CHD hash table files",
    subcommand_required = true,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect a CHD file and print basic information
    Info(InfoArgs),
    /// Convert a JSON key-value file into a CHD binary file
    Convert(ConvertArgs),
}

#[derive(clap::Args)]
struct InfoArgs {
    /// Path to the CHD binary file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Optional key to look up in the table
    #[arg(short, long)]
    key: Option<String>,

    /// Print the first N entries in slot order
    #[arg(short, long, value_name = "N")]
    limit: Option<usize>,
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// JSON file holding an object of strings or an array of [key, value]
    /// pairs, where keys and values are strings or arrays of bytes
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Path to the CHD binary file to produce
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Seed of the hash function generator
    #[arg(long, value_name = "SEED", default_value_t = 0)]
    seed: u64,

    /// Buckets per key
    #[arg(long, value_name = "RATIO", default_value_t = chd::ChdConfig::DEFAULT_BUCKET_RATIO)]
    bucket_ratio: f64,

    /// Fresh seeds tried per bucket before restarting
    #[arg(long, value_name = "COUNT", default_value_t = chd::ChdConfig::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u64,

    /// Writer buffer size in bytes
    #[arg(long, value_name = "BYTES", default_value_t = 16 << 20)]
    buffer_size: usize,
}

fn run_info(args: InfoArgs) -> Result<()> {
    // Reading the whole file stands in for a memory map: the table aliases
    // this buffer without copying keys or values.
    let bytes = std::fs::read(&args.input)?;
    let table = Chd::mmap(&bytes).map_err(to_io)?;

    let json = serde_json::to_string_pretty(&table.info())
        .map_err(|e| Error::other(format!("Failed to format JSON: {e}")))?;
    println!("{}", json);

    if let Some(key) = args.key {
        let value = table.get(key.as_bytes()).map(String::from_utf8_lossy);
        println!("{}: {:?}", key, value);
    }

    if let Some(limit) = args.limit {
        for (slot, (key, value)) in table.iter().take(limit).enumerate() {
            println!(
                "{slot}: {} => {}",
                String::from_utf8_lossy(key),
                String::from_utf8_lossy(value)
            );
        }
    }

    Ok(())
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    let entries = load_entries_from_json(&args.input)?;

    let mut builder = ChdBuilder::default()
        .with_seed(args.seed)
        .with_bucket_ratio(args.bucket_ratio)
        .with_max_attempts(args.max_attempts);
    builder.extend(entries);
    let table = builder.build().map_err(to_io)?;

    let mut writer = BufWriter::with_capacity(args.buffer_size, File::create(&args.output)?);
    table.write(&mut writer).map_err(to_io)?;
    writer.flush()?;

    let json = serde_json::to_string_pretty(&table.info())
        .map_err(|e| Error::other(format!("Failed to format JSON: {e}")))?;
    println!("{}", json);

    Ok(())
}

/// A key or value given either as text or as an array of byte values.
#[derive(Deserialize)]
#[serde(untagged)]
enum Bytes {
    Text(String),
    Raw(Vec<u8>),
}

impl From<Bytes> for Vec<u8> {
    fn from(bytes: Bytes) -> Self {
        match bytes {
            Bytes::Text(text) => text.into_bytes(),
            Bytes::Raw(raw) => raw,
        }
    }
}

/// Input file: `{"key": "value", ...}` or `[[key, value], ...]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Entries {
    Object(BTreeMap<String, Bytes>),
    Pairs(Vec<(Bytes, Bytes)>),
}

fn load_entries_from_json(path: &Path) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let reader = BufReader::new(File::open(path)?);
    let entries: Entries = serde_json::from_reader(reader).map_err(|e| {
        Error::new(
            ErrorKind::InvalidData,
            format!("expected an object of strings or an array of [key, value] pairs: {e}"),
        )
    })?;

    Ok(match entries {
        Entries::Object(map) => map
            .into_iter()
            .map(|(key, value)| (key.into_bytes(), value.into()))
            .collect(),
        Entries::Pairs(pairs) => pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect(),
    })
}

fn to_io(error: chd::Error) -> Error {
    match error {
        chd::Error::Io(e) => e,
        other => Error::new(ErrorKind::InvalidData, other),
    }
}
