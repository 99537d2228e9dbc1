//! Symbol classification.
//!
//! Decides what an exported name stands for once it is bound to an
//! address.

/// Sentinel names for the global constructor/destructor tables.
pub const CTOR_LIST: &str = "__CTOR_LIST__";
pub const DTOR_LIST: &str = "__DTOR_LIST__";

/// How a named address should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// A callable entry point.
    Function,
    /// A named location that must not be turned into a function.
    Data,
}

/// Classifies an exported name.
///
/// Compiler-generated names carrying `$` and the ctor/dtor table
/// sentinels point at data, not code.
pub fn classify(name: &str) -> SymbolKind {
    if name.contains('$') || name.contains(CTOR_LIST) || name.contains(DTOR_LIST) {
        SymbolKind::Data
    } else {
        SymbolKind::Function
    }
}

/// A name bound to an address during a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundSymbol {
    pub name: String,
    pub address: u32,
    pub kind: SymbolKind,
}
