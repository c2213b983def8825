//! blocklog loader
//!
//! Copies a file into a device-backed log in fixed-size appends, reads it
//! back and checks the CRC32 of both sides.

use std::fs;
use std::path::{Path, PathBuf};

use blocklog::{BlockDevice, Config, FileDevice, LogEngine, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// blocklog loader
#[derive(Parser, Debug)]
#[command(name = "blocklog")]
#[command(about = "Append files to a block-device log and verify them")]
#[command(version)]
struct Args {
    /// Device image path
    #[arg(short, long)]
    device: PathBuf,

    /// Device block size in bytes
    #[arg(short, long, default_value = "4096")]
    block_size: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Append a file to a fresh log and verify the read-back
    Load {
        /// File to append
        input: PathBuf,

        /// Bytes per append call
        #[arg(short, long, default_value = "1000")]
        chunk: usize,

        /// Create (or truncate) the image with this many blocks first
        #[arg(long)]
        create_blocks: Option<u64>,

        /// Write buffer size in blocks
        #[arg(long, default_value = "32")]
        write_blocks: usize,

        /// Read cache size in blocks
        #[arg(long, default_value = "256")]
        read_blocks: usize,
    },

    /// Print device geometry
    Info,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,blocklog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("blocklog v{}", blocklog::VERSION);
    tracing::info!("Device: {}", args.device.display());

    let result = match args.command {
        Commands::Info => info(&args.device, args.block_size),
        Commands::Load {
            ref input,
            chunk,
            create_blocks,
            write_blocks,
            read_blocks,
        } => {
            let config = Config::builder()
                .device_path(&args.device)
                .block_size(args.block_size)
                .write_cache_blocks(write_blocks)
                .read_cache_blocks(read_blocks)
                .build();
            load(config, input, chunk, create_blocks)
        }
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn info(device: &Path, block_size: u64) -> Result<()> {
    let dev = FileDevice::open(device, block_size)?;
    println!("block size: {}", dev.block_size());
    println!("capacity:   {} bytes", dev.size());
    println!("blocks:     {}", dev.size() / dev.block_size());
    Ok(())
}

fn load(config: Config, input: &Path, chunk: usize, create_blocks: Option<u64>) -> Result<()> {
    let data = fs::read(input)?;
    let chunk = chunk.max(1);

    let device = match create_blocks {
        Some(blocks) => FileDevice::create(&config.device_path, config.block_size, blocks)?,
        None => FileDevice::open(&config.device_path, config.block_size)?,
    };
    let log = LogEngine::with_device(device, config)?;

    for piece in data.chunks(chunk) {
        log.append(piece)?;
    }
    log.flush()?;

    let back = log.read_bytes(0, data.len())?;
    let expected = crc32fast::hash(&data);
    let actual = crc32fast::hash(&back);

    let stats = log.stats();
    tracing::info!(
        device_limit = stats.device_limit,
        flush_rounds = stats.flush_rounds,
        merges = stats.merges,
        "load complete"
    );
    log.close()?;

    println!("appended {} bytes in {}-byte chunks", data.len(), chunk);
    println!("crc32 written {expected:08x} read {actual:08x}");
    if expected != actual {
        return Err(blocklog::LogError::InvalidArgument(
            "read-back does not match input".to_string(),
        ));
    }
    Ok(())
}
