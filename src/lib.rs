//! SN ProDG relocatable DLL (SNR2) loader.
//!
//! This library provides the core components for the `snrel` tool.
//! It is organized into several modules:
//! - `reader`: Zero-filling byte cursor over the image.
//! - `format`: Magic check, header and table decoding.
//! - `layout`: Code/data boundary inference and segments.
//! - `symbol`: Classification of exported names.
//! - `arch`: Target processor and compiler ABI.
//! - `sink`: Output interface the loader writes into.
//! - `loader`: The main load orchestration.
//! - `listing`: Recording sink used for printing.
//! - `writer`: ELF export sink.
//! - `config`: CLI configuration.

pub mod arch;
pub mod config;
pub mod error;
pub mod format;
pub mod layout;
pub mod listing;
pub mod loader;
pub mod reader;
pub mod sink;
pub mod symbol;
pub mod writer;
