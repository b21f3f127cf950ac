//! binstack CLI - inspect array files, recover serialized buffers and run
//! the RLE codec.

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// binstack - guarded stack buffers and binary records.
#[derive(Parser)]
#[command(name = "binstack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show an array file's header and records
    Inspect {
        /// Path to the array file
        file: PathBuf,

        /// Scan for guard words instead of trusting length words
        #[arg(short, long)]
        recover: bool,
    },

    /// Find a framed serialized buffer in a raw dump and recover its records
    Scan {
        /// Path to the dump
        file: PathBuf,

        /// Trust length words when they fit, instead of guard positions
        #[arg(long)]
        prefer_reported: bool,
    },

    /// Run-length encode or decode a binary image file
    Rle {
        /// Input file
        input: PathBuf,

        /// Output file
        output: PathBuf,

        /// Decode instead of encode
        #[arg(short, long)]
        decode: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&logging::LoggingConfig::from_verbosity(cli.verbose))?;

    match cli.command {
        Commands::Inspect { file, recover } => commands::inspect::run(&file, recover),
        Commands::Scan {
            file,
            prefer_reported,
        } => commands::scan::run(&file, prefer_reported),
        Commands::Rle {
            input,
            output,
            decode,
        } => commands::rle::run(&input, &output, decode),
        Commands::Version => {
            println!("binstack {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
