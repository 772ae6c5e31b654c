//! Command driver for exercising a B+ tree index.
//!
//! Reads whitespace-separated commands from a file (or stdin):
//!
//! ```text
//! insert <low> <high>
//! scan <low> <high>
//! delete <low> <high>
//! print
//! stats
//! quit
//! ```
//!
//! A bound of `-1` means unbounded for `scan` and `delete`.
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use pagetree::common::config::{DEFAULT_POOL_SIZE, DEFAULT_TREE_ORDER};
use pagetree::{BTreeConfig, BTreeIndex, BufferPool, DiskManager, Key, PageId, RecordId};
use tracing_subscriber::EnvFilter;

const INDEX_NAME: &str = "BTreeIndex";

#[derive(Parser, Debug)]
#[command(
    name = "btree",
    version,
    about = "Run B+ tree index commands from a file or stdin"
)]
struct Cli {
    #[arg(value_name = "COMMAND_FILE", help = "Command file; stdin when omitted")]
    commands: Option<PathBuf>,

    #[arg(long, default_value = "btdb", help = "Database file to create")]
    db: PathBuf,

    #[arg(long, default_value_t = DEFAULT_POOL_SIZE, help = "Buffer pool size (frames)")]
    pool_size: usize,

    #[arg(long, default_value_t = DEFAULT_TREE_ORDER, help = "Minimum entries per non-root node")]
    order: usize,

    #[arg(long, help = "Keep the index and database file instead of destroying them")]
    keep: bool,
}

fn main() {
    install_tracing_subscriber();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn install_tracing_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let input = match &cli.commands {
        Some(path) => fs::read_to_string(path)
            .map_err(|err| format!("failed to open {}: {err}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    if cli.db.exists() {
        fs::remove_file(&cli.db)?;
    }
    let dm = DiskManager::create(&cli.db)?;
    let pool = Arc::new(BufferPool::new(cli.pool_size, dm));
    let config = BTreeConfig::new(cli.order)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "Create B+tree.")?;
    let mut tree = BTreeIndex::create(Arc::clone(&pool), INDEX_NAME, config)?;
    writeln!(out, "  Success.")?;

    run_commands(&mut tree, &input, &mut out)?;

    if cli.keep {
        tree.close()?;
    } else {
        writeln!(out, "Destroy B+tree.")?;
        tree.destroy()?;
        drop(pool);
        fs::remove_file(&cli.db)?;
    }
    Ok(())
}

/// Execute every command in `input` against `tree`.
///
/// Tree errors are reported and the next command runs; only output
/// failures abort.
fn run_commands<W: Write>(tree: &mut BTreeIndex, input: &str, out: &mut W) -> io::Result<()> {
    let mut tokens = input.split_whitespace();

    while let Some(command) = tokens.next() {
        let result = match command {
            "insert" | "scan" | "delete" => match read_range(&mut tokens) {
                Some((low, high)) => match command {
                    "insert" => insert_range(tree, low, high, out),
                    "scan" => scan_range(tree, low, high, out),
                    _ => delete_range(tree, low, high, out),
                },
                None => {
                    writeln!(out, "Error: {command} expects <low> <high>")?;
                    continue;
                }
            },
            "print" => print_tree(tree, out),
            "stats" => print_stats(tree, out),
            "quit" => break,
            other => {
                writeln!(out, "Error: Unrecognized command: {other}")?;
                continue;
            }
        };

        if let Err(err) = result {
            writeln!(out, "  Error: {err}")?;
        }
    }
    Ok(())
}

fn read_range<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Option<(Key, Key)> {
    let low = tokens.next()?.parse().ok()?;
    let high = tokens.next()?.parse().ok()?;
    Some((low, high))
}

/// `-1` stands for an open bound.
fn bound(value: Key) -> Option<Key> {
    (value != -1).then_some(value)
}

fn insert_range<W: Write>(
    tree: &mut BTreeIndex,
    low: Key,
    high: Key,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    writeln!(out, "Inserting: ({low} to {high})")?;
    for (i, key) in (low..=high).enumerate() {
        let rid = record_id_for(i)?;
        writeln!(out, "  Insert: {key} @{rid}")?;
        tree.insert(key, rid)?;
    }
    writeln!(out, "  Success.")?;
    Ok(())
}

/// Synthetic record id for the `i`th key of an insert range.
fn record_id_for(i: usize) -> Result<RecordId, Box<dyn Error>> {
    let page = u32::try_from(i).map_err(|_| format!("record page {i} out of range"))?;
    let slot = u16::try_from(i + 1)
        .map_err(|_| format!("record slot {} out of range, split the insert", i + 1))?;
    Ok(RecordId::new(PageId::new(page), slot))
}

fn scan_range<W: Write>(
    tree: &BTreeIndex,
    low: Key,
    high: Key,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    writeln!(out, "Scanning ({low} to {high}):")?;
    let mut count = 0;
    for item in tree.open_scan(bound(low), bound(high))? {
        let (rid, key) = item?;
        writeln!(out, "  Scanned @{rid} key={key}")?;
        count += 1;
    }
    writeln!(out, "  {count} records found.")?;
    writeln!(out, "  Success.")?;
    Ok(())
}

fn print_tree<W: Write>(tree: &BTreeIndex, out: &mut W) -> Result<(), Box<dyn Error>> {
    tree.print(out)?;
    Ok(())
}

fn print_stats<W: Write>(tree: &BTreeIndex, out: &mut W) -> Result<(), Box<dyn Error>> {
    let stats = tree.statistics()?;
    writeln!(out, "{stats}")?;
    Ok(())
}

/// Delete by repeatedly taking the first entry in range, since a cursor
/// cannot outlive a modification.
fn delete_range<W: Write>(
    tree: &mut BTreeIndex,
    low: Key,
    high: Key,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    writeln!(out, "Deleting ({low}-{high}):")?;
    let mut count = 0;
    loop {
        let first = tree.open_scan(bound(low), bound(high))?.get_next()?;
        let Some((rid, key)) = first else {
            break;
        };
        writeln!(out, "  Delete {rid} key={key}")?;
        tree.delete(key, rid)?;
        count += 1;
    }
    writeln!(out, "  {count} records deleted.")?;
    writeln!(out, "  Success.")?;
    Ok(())
}
