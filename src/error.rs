//! Fatal load errors.
//!
//! Anything listed here aborts the whole load. Per-record problems
//! (truncated tables, bad relocation indices, unterminated names) are
//! logged and counted by the loader instead.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The first four bytes are not `SNR2`.
    #[error("unrecognized format: expected magic \"SNR2\", got {actual:02x?}")]
    UnrecognizedFormat { actual: [u8; 4] },

    /// No table or name address was non-zero, so the code region has no end.
    #[error("cannot infer segment boundary: no non-zero data address in header or function table")]
    UndefinedSegmentBoundary,

    /// A declared table count is above a limit the caller asked for.
    /// Loads without a limit never produce this.
    #[error("{table} table declares {count} entries (limit {limit})")]
    TableTooLarge {
        table: &'static str,
        count: u32,
        limit: u32,
    },
}
