//! SNR2 container format.
//!
//! SN ProDG relocatable DLLs (`*.REL`) start with a fixed 60-byte header
//! pointing at two tables: exported functions and relocation sites. All
//! addresses are absolute file offsets and are only meaningful when
//! non-zero. Everything is little-endian (the target is the R5900).

use anyhow::Result;

use crate::error::LoadError;
use crate::reader::{BinaryReader, Fields, Record};

pub const MAGIC: [u8; 4] = *b"SNR2";

/// Token returned by [`recognize`] for files this crate can load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Snr2,
}

impl Format {
    pub fn description(&self) -> &'static str {
        match self {
            Format::Snr2 => "SN ProDG relocatable DLL",
        }
    }
}

/// Checks the magic at offset 0.
///
/// Reads exactly four bytes and puts the cursor back where it was.
pub fn recognize(reader: &mut BinaryReader<'_>) -> Option<Format> {
    sniff(reader).1
}

/// Like [`recognize`], but also hands back the bytes that were compared.
pub(crate) fn sniff(reader: &mut BinaryReader<'_>) -> ([u8; 4], Option<Format>) {
    let saved = reader.position();
    reader.seek(0);
    let mut magic = [0u8; 4];
    reader.read_into(&mut magic);
    reader.seek(saved);
    let format = (magic == MAGIC).then_some(Format::Snr2);
    (magic, format)
}

/// The fixed header at offset 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    pub magic: [u8; 4],
    pub reloc_table_address: u32,
    pub reloc_table_count: u32,
    pub func_table_address: u32,
    pub func_table_count: u32,
    /// Offset of the name the module was built under.
    pub image_name_address: u32,
    pub global_ctors_address: u32,
    pub global_dtors_address: u32,
    pub exports_address: u32,
    pub exports_count: u32,
    pub unk28: u32,
    pub file_size: u32,
    pub unk30: u32,
    pub unk_addr34: u32,
    pub unk_addr38: u32,
}

impl Record for Header {
    const SIZE: usize = 0x3c;

    fn decode(f: &mut Fields<'_>) -> Self {
        Self {
            magic: f.bytes(),
            reloc_table_address: f.u32(),
            reloc_table_count: f.u32(),
            func_table_address: f.u32(),
            func_table_count: f.u32(),
            image_name_address: f.u32(),
            global_ctors_address: f.u32(),
            global_dtors_address: f.u32(),
            exports_address: f.u32(),
            exports_count: f.u32(),
            unk28: f.u32(),
            file_size: f.u32(),
            unk30: f.u32(),
            unk_addr34: f.u32(),
            unk_addr38: f.u32(),
        }
    }
}

/// One exported symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionEntry {
    /// Offset of the null-terminated name.
    pub name_address: u32,
    /// Where the symbol lives; zero for entries with no code.
    pub code_address: u32,
    pub unk8: u16,
    pub kind: u8,
    pub unk_b: u8,
}

impl Record for FunctionEntry {
    const SIZE: usize = 12;

    fn decode(f: &mut Fields<'_>) -> Self {
        Self {
            name_address: f.u32(),
            code_address: f.u32(),
            unk8: f.u16(),
            kind: f.u8(),
            unk_b: f.u8(),
        }
    }
}

/// One relocation site. Packed, no padding between fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelocationEntry {
    pub code_address: u32,
    pub reloc_type: u8,
    /// Zero-based index into the function table.
    pub function_index: u16,
    pub unk7: u16,
    pub unk9: u8,
    pub unk_a: u8,
    pub unk_b: u8,
}

impl Record for RelocationEntry {
    const SIZE: usize = 12;

    fn decode(f: &mut Fields<'_>) -> Self {
        Self {
            code_address: f.u32(),
            reloc_type: f.u8(),
            function_index: f.u16(),
            unk7: f.u16(),
            unk9: f.u8(),
            unk_a: f.u8(),
            unk_b: f.u8(),
        }
    }
}

/// Header plus both tables, in file order.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub header: Header,
    pub functions: Vec<FunctionEntry>,
    pub relocations: Vec<RelocationEntry>,
}

impl Module {
    /// Reads the header and both tables.
    ///
    /// Does not check the magic; call [`recognize`] first. Tables that run
    /// past the end of the image come back zero-filled, but still with
    /// exactly the declared number of entries. When `max_entries` is set,
    /// counts above it are rejected before anything is allocated.
    pub fn parse(reader: &mut BinaryReader<'_>, max_entries: Option<u32>) -> Result<Self> {
        reader.seek(0);
        let header: Header = reader.read_record();
        tracing::debug!(
            "header: funcs {}@0x{:x}, relocs {}@0x{:x}, image name 0x{:x}, file size 0x{:x}",
            header.func_table_count,
            header.func_table_address,
            header.reloc_table_count,
            header.reloc_table_address,
            header.image_name_address,
            header.file_size
        );

        let functions = read_table(
            reader,
            "function",
            header.func_table_address,
            header.func_table_count,
            max_entries,
        )?;
        let relocations = read_table(
            reader,
            "relocation",
            header.reloc_table_address,
            header.reloc_table_count,
            max_entries,
        )?;

        Ok(Self {
            header,
            functions,
            relocations,
        })
    }
}

fn read_table<T: Record>(
    reader: &mut BinaryReader<'_>,
    table: &'static str,
    address: u32,
    count: u32,
    max_entries: Option<u32>,
) -> Result<Vec<T>> {
    if let Some(limit) = max_entries.filter(|&limit| count > limit) {
        return Err(LoadError::TableTooLarge {
            table,
            count,
            limit,
        }
        .into());
    }

    let end = u64::from(address) + u64::from(count) * T::SIZE as u64;
    if end > reader.size() {
        tracing::warn!(
            "{} table 0x{:x}..0x{:x} runs past end of file (0x{:x}), tail is zero-filled",
            table,
            address,
            end,
            reader.size()
        );
    }

    reader.seek(u64::from(address));
    let entries: Vec<T> = (0..count).map(|_| reader.read_record()).collect();
    tracing::debug!("read {} {} entries at 0x{:x}", entries.len(), table, address);
    Ok(entries)
}
