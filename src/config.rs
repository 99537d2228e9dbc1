//! Configuration module.
//!
//! This module defines the command-line interface (CLI) for the loader using `clap`.

use clap::Parser;
use std::path::PathBuf;

use crate::loader::DEFAULT_NAME_LIMIT;

/// Loads an SN ProDG relocatable DLL (SNR2) and lists its segments,
/// exported symbols and relocation targets.
///
/// Optionally exports the result as an ELF relocatable object.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Input SNR2 file (usually *.REL)
    pub input: PathBuf,

    /// Also write the loaded module as an ELF object
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Maximum number of bytes scanned for each name
    #[arg(long, default_value_t = DEFAULT_NAME_LIMIT)]
    pub name_limit: usize,

    /// Reject tables that declare more entries than this (no limit by default)
    #[arg(long)]
    pub max_table_entries: Option<u32>,

    /// Do not print the listing
    #[arg(short, long)]
    pub quiet: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", help = "Set the logging level")]
    pub log_level: String,
}
