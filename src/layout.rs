//! Segment layout.
//!
//! The SNR2 header never says where code stops. What it does give is a
//! handful of pointers that are known to point at data (the image name,
//! both tables, every function name), and code never overlaps those, so
//! the lowest of them bounds the code region from above.
//!
//! The image is then split into three segments:
//! `.sndata` `[0, 0x100)`, `.text` `[0x100, extent)` and
//! `.sndata2` `[extent, size)`.

use object::SectionKind;

use crate::format::Module;

/// End of the fixed leading data area.
pub const HEADER_REGION_END: u32 = 0x100;

/// Tracks the smallest non-zero address offered so far.
///
/// Zero means "no address" everywhere in the format and never becomes
/// a candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LowestAddress(Option<u32>);

impl LowestAddress {
    pub fn new() -> Self {
        Self(None)
    }

    pub fn consider(&mut self, address: u32) {
        if address == 0 {
            return;
        }
        match self.0 {
            Some(current) if current <= address => {}
            _ => self.0 = Some(address),
        }
    }

    pub fn get(&self) -> Option<u32> {
        self.0
    }
}

/// Computes where the trailing data region begins.
///
/// Candidates are taken in this order: image name, relocation table,
/// function table, then each function name in table order. Returns
/// `None` when every candidate is zero.
pub fn infer_data_extent(module: &Module) -> Option<u32> {
    let header = &module.header;
    let mut lowest = LowestAddress::new();
    lowest.consider(header.image_name_address);
    lowest.consider(header.reloc_table_address);
    lowest.consider(header.func_table_address);
    for func in &module.functions {
        lowest.consider(func.name_address);
    }
    lowest.get()
}

/// A contiguous region of the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Name of the segment (e.g. ".text", ".sndata").
    pub name: &'static str,
    /// First byte of the segment.
    pub start: u32,
    /// One past the last byte.
    pub end: u32,
    /// `SectionKind::Text` for code, `SectionKind::Data` otherwise.
    pub kind: SectionKind,
}

impl Segment {
    pub fn new(name: &'static str, start: u32, end: u32, kind: SectionKind) -> Self {
        Self {
            name,
            start,
            end,
            kind,
        }
    }

    pub fn contains(&self, address: u32) -> bool {
        self.start <= address && address < self.end
    }

    pub fn is_code(&self) -> bool {
        self.kind == SectionKind::Text
    }
}

/// The three segments covering an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Inferred extent, before clamping.
    pub data_extent: u32,
    pub segments: [Segment; 3],
}

impl Layout {
    /// Splits an image of `file_size` bytes at `data_extent`.
    ///
    /// The split points are clamped into the file so the segments stay
    /// ordered and contiguous; a malformed extent below 0x100 yields an
    /// empty code segment.
    pub fn new(data_extent: u32, file_size: u32) -> Self {
        let header_end = HEADER_REGION_END.min(file_size);
        let code_end = data_extent.clamp(header_end, file_size);
        if code_end != data_extent {
            tracing::warn!(
                "data extent 0x{:x} lies outside 0x{:x}..=0x{:x}, clamped to 0x{:x}",
                data_extent,
                header_end,
                file_size,
                code_end
            );
        }
        Self {
            data_extent,
            segments: [
                Segment::new(".sndata", 0, header_end, SectionKind::Data),
                Segment::new(".text", header_end, code_end, SectionKind::Text),
                Segment::new(".sndata2", code_end, file_size, SectionKind::Data),
            ],
        }
    }
}
