//! Entry point for the snrel loader.
//!
//! This file handles high-level application flow:
//! 1. Parse command-line arguments using `clap`.
//! 2. Set up logging from `--log-level`.
//! 3. Map the input file into memory.
//! 4. Load it with the R5900 backend into a listing (and the ELF writer, if requested).
//!
//! Error handling is done via `anyhow`.

use anyhow::{Context, Result};
use clap::Parser;
use memmap2::Mmap;
use std::fs::File;
use tracing_subscriber::EnvFilter;

use snrel::arch::r5900::R5900;
use snrel::config::Config;
use snrel::listing::Listing;
use snrel::loader::Loader;
use snrel::sink::Tee;
use snrel::writer::ElfWriter;

fn main() -> Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("invalid log level {:?}", config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let file = File::open(&config.input)
        .with_context(|| format!("failed to open {}", config.input.display()))?;
    // The mapping lives until the end of main, whether the load succeeds or not.
    let mmap = unsafe { Mmap::map(&file)? };

    let mut loader = Loader::new(R5900).with_name_limit(config.name_limit);
    if let Some(limit) = config.max_table_entries {
        loader = loader.with_max_table_entries(limit);
    }

    tracing::info!("SN ProDG relocatable DLL loader");

    let mut listing = Listing::new();
    let report = match &config.output {
        Some(path) => {
            let mut writer = ElfWriter::new(loader.arch(), &mmap);
            let report = loader
                .load(&mmap, Tee(&mut listing, &mut writer))
                .with_context(|| format!("failed to load {}", config.input.display()))?;
            writer.write(path)?;
            report
        }
        None => loader
            .load(&mmap, &mut listing)
            .with_context(|| format!("failed to load {}", config.input.display()))?,
    };

    if !config.quiet {
        print!("{}", listing);
    }

    println!(
        "Loaded {}: {} exports, {} functions, {} relocations annotated",
        report.image_name.as_deref().unwrap_or("module"),
        report.table_entries,
        report.function_count(),
        report.annotated_relocations
    );
    Ok(())
}
