//! Core loader logic.
//!
//! This module contains the `Loader` struct which drives a whole load:
//! 1. Recognition: checks the `SNR2` magic.
//! 2. Target: hands processor and ABI settings to the sink.
//! 3. Parsing: reads the header and both tables.
//! 4. Layout: infers the code/data split and creates the segments.
//! 5. Binding: names exported addresses and marks function entry points.
//! 6. Relocations: annotates each relocation site with its target name.

use anyhow::Result;
use std::collections::HashSet;

use crate::arch::Architecture;
use crate::error::LoadError;
use crate::format::{self, Module};
use crate::layout::{self, Layout};
use crate::reader::BinaryReader;
use crate::sink::{AnnotationPosition, Sink};
use crate::symbol::{self, BoundSymbol, SymbolKind};

/// Default scan cap for exported names.
pub const DEFAULT_NAME_LIMIT: usize = 256;

/// Summary of a finished load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Name the module was built under, when the header points at one.
    pub image_name: Option<String>,
    /// Inferred start of the trailing data region (unclamped).
    pub data_extent: u32,
    /// Entries in the function table, including unusable ones.
    pub table_entries: usize,
    /// Names bound to an address.
    pub symbols: Vec<BoundSymbol>,
    /// Relocation sites that received an annotation.
    pub annotated_relocations: usize,
    /// Relocation sites skipped because their index or name was unusable.
    pub skipped_relocations: usize,
}

impl LoadReport {
    /// Symbols marked as function entry points.
    pub fn function_count(&self) -> usize {
        self.symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Function)
            .count()
    }
}

pub struct Loader<A: Architecture> {
    arch: A,
    name_limit: usize,
    max_table_entries: Option<u32>,
}

impl<A: Architecture> Loader<A> {
    pub fn new(arch: A) -> Self {
        Self {
            arch,
            name_limit: DEFAULT_NAME_LIMIT,
            max_table_entries: None,
        }
    }

    pub fn with_name_limit(mut self, name_limit: usize) -> Self {
        self.name_limit = name_limit;
        self
    }

    /// Rejects tables declaring more than `max_table_entries` entries.
    ///
    /// Without a limit every declared entry is read, zero-filled past EOF.
    pub fn with_max_table_entries(mut self, max_table_entries: u32) -> Self {
        self.max_table_entries = Some(max_table_entries);
        self
    }

    pub fn arch(&self) -> &A {
        &self.arch
    }

    /// Loads one image into `sink`.
    ///
    /// Fails without touching the sink if the magic does not match, and
    /// before creating any segment if no data boundary can be inferred.
    pub fn load<S: Sink>(&self, data: &[u8], mut sink: S) -> Result<LoadReport> {
        let mut reader = BinaryReader::new(data);

        let (magic, recognized) = format::sniff(&mut reader);
        let recognized = recognized
            .ok_or(LoadError::UnrecognizedFormat { actual: magic })?;
        tracing::info!("loading {}", recognized.description());

        let file_size = u32::try_from(reader.size()).unwrap_or(u32::MAX);

        sink.configure_target(&self.arch.target_config())?;

        let module = Module::parse(&mut reader, self.max_table_entries)?;
        tracing::info!(
            "found {} functions, {} relocations",
            module.functions.len(),
            module.relocations.len()
        );
        if module.header.file_size != 0 && module.header.file_size != file_size {
            tracing::warn!(
                "header file size 0x{:x} differs from actual size 0x{:x}",
                module.header.file_size,
                file_size
            );
        }

        let image_name_address = u64::from(module.header.image_name_address);
        let image_name = (image_name_address != 0)
            .then(|| reader.read_cstr_at(image_name_address, self.name_limit));
        if let Some(name) = &image_name {
            tracing::info!("original image: {}", name);
        }

        let data_extent = layout::infer_data_extent(&module)
            .ok_or(LoadError::UndefinedSegmentBoundary)?;
        let layout = Layout::new(data_extent, file_size);
        tracing::debug!("data extent 0x{:x}", data_extent);
        for segment in &layout.segments {
            sink.create_region(segment)?;
        }

        let mut report = LoadReport {
            image_name,
            data_extent,
            table_entries: module.functions.len(),
            ..Default::default()
        };

        let names = self.bind_functions(&mut reader, &module, &mut sink, &mut report)?;
        self.bind_table_sentinels(&module, &mut sink, &mut report)?;
        self.annotate_relocations(&module, &names, &mut sink, &mut report)?;

        tracing::info!(
            "bound {} symbols ({} functions), annotated {} relocations, skipped {}",
            report.symbols.len(),
            report.function_count(),
            report.annotated_relocations,
            report.skipped_relocations
        );
        Ok(report)
    }

    /// Reads every function name and binds the ones with code.
    ///
    /// Returns the names in table order so relocations can look them up
    /// by ordinal.
    fn bind_functions<S: Sink>(
        &self,
        reader: &mut BinaryReader<'_>,
        module: &Module,
        sink: &mut S,
        report: &mut LoadReport,
    ) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(module.functions.len());
        for (index, entry) in module.functions.iter().enumerate() {
            let name = if entry.name_address == 0 {
                tracing::debug!("function {} has no name", index);
                String::new()
            } else {
                reader.read_cstr_at(u64::from(entry.name_address), self.name_limit)
            };

            if entry.code_address != 0 {
                let kind = if name.is_empty() {
                    SymbolKind::Function
                } else {
                    sink.set_name(entry.code_address, &name)?;
                    symbol::classify(&name)
                };
                if kind == SymbolKind::Function {
                    sink.mark_function(entry.code_address)?;
                }
                tracing::trace!(
                    "0x{:08x} = {} ({:#x} - {:#x} - {:#x})",
                    entry.code_address,
                    name,
                    entry.unk8,
                    entry.kind,
                    entry.unk_b
                );
                report.symbols.push(BoundSymbol {
                    name: name.clone(),
                    address: entry.code_address,
                    kind,
                });
            }

            names.push(name);
        }
        Ok(names)
    }

    /// Names the ctor/dtor tables the header points at, unless an export
    /// already covers them.
    fn bind_table_sentinels<S: Sink>(
        &self,
        module: &Module,
        sink: &mut S,
        report: &mut LoadReport,
    ) -> Result<()> {
        let bound: HashSet<u32> = report.symbols.iter().map(|s| s.address).collect();
        let tables = [
            (module.header.global_ctors_address, symbol::CTOR_LIST),
            (module.header.global_dtors_address, symbol::DTOR_LIST),
        ];
        for (address, name) in tables {
            if address == 0 || bound.contains(&address) {
                continue;
            }
            sink.set_name(address, name)?;
            report.symbols.push(BoundSymbol {
                name: name.to_string(),
                address,
                kind: SymbolKind::Data,
            });
        }
        Ok(())
    }

    fn annotate_relocations<S: Sink>(
        &self,
        module: &Module,
        names: &[String],
        sink: &mut S,
        report: &mut LoadReport,
    ) -> Result<()> {
        for (index, reloc) in module.relocations.iter().enumerate() {
            let target = usize::from(reloc.function_index);
            let Some(name) = names.get(target) else {
                tracing::warn!(
                    "relocation {} at 0x{:08x} refers to function {} but only {} exist, skipped",
                    index,
                    reloc.code_address,
                    target,
                    names.len()
                );
                report.skipped_relocations += 1;
                continue;
            };
            if name.is_empty() {
                tracing::debug!(
                    "relocation {} at 0x{:08x} targets an unnamed function",
                    index,
                    reloc.code_address
                );
                report.skipped_relocations += 1;
                continue;
            }
            sink.add_annotation(reloc.code_address, name, AnnotationPosition::Repeatable)?;
            report.annotated_relocations += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::r5900::R5900;
    use crate::listing::{Event, Listing};

    /// Builds SNR2 images for tests.
    #[derive(Default)]
    struct Image {
        data: Vec<u8>,
    }

    impl Image {
        fn new(size: usize) -> Self {
            let mut data = vec![0u8; size];
            data[..4].copy_from_slice(b"SNR2");
            Self { data }
        }

        fn u32(&mut self, at: usize, v: u32) -> &mut Self {
            self.data[at..at + 4].copy_from_slice(&v.to_le_bytes());
            self
        }

        fn u16(&mut self, at: usize, v: u16) -> &mut Self {
            self.data[at..at + 2].copy_from_slice(&v.to_le_bytes());
            self
        }

        fn str(&mut self, at: usize, s: &str) -> &mut Self {
            self.data[at..at + s.len()].copy_from_slice(s.as_bytes());
            self.data[at + s.len()] = 0;
            self
        }

        fn funcs(&mut self, at: u32, entries: &[(u32, u32)]) -> &mut Self {
            self.u32(0x0c, at).u32(0x10, entries.len() as u32);
            for (i, &(name, code)) in entries.iter().enumerate() {
                let base = at as usize + i * 12;
                self.u32(base, name).u32(base + 4, code);
            }
            self
        }

        fn relocs(&mut self, at: u32, entries: &[(u32, u16)]) -> &mut Self {
            self.u32(0x04, at).u32(0x08, entries.len() as u32);
            for (i, &(code, func)) in entries.iter().enumerate() {
                let base = at as usize + i * 12;
                self.u32(base, code).u16(base + 5, func);
            }
            self
        }
    }

    fn load(data: &[u8]) -> Result<(LoadReport, Listing)> {
        let mut listing = Listing::new();
        let report = Loader::new(R5900).load(data, &mut listing)?;
        Ok((report, listing))
    }

    #[test]
    fn single_function_and_relocation() {
        let mut img = Image::new(0x400);
        img.str(0x120, "foo")
            .funcs(0x340, &[(0x120, 0x200)])
            .relocs(0x380, &[(0x300, 0)]);

        let (report, listing) = load(&img.data).unwrap();

        assert_eq!(listing.name_at(0x200), Some("foo"));
        assert!(listing.is_function(0x200));
        assert_eq!(
            listing.annotations().collect::<Vec<_>>(),
            vec![(0x300, "foo")]
        );
        assert_eq!(report.data_extent, 0x120);
        assert_eq!(report.annotated_relocations, 1);

        let regions: Vec<_> = listing.regions().map(|s| (s.start, s.end)).collect();
        assert_eq!(regions, vec![(0, 0x100), (0x100, 0x120), (0x120, 0x400)]);
        let Event::Target(target) = &listing.events[0] else {
            panic!("first event is {:?}", listing.events[0]);
        };
        assert_eq!(target.processor, "r5900l");
    }

    #[test]
    fn relocation_annotation_is_repeatable() {
        let mut img = Image::new(0x400);
        img.str(0x120, "foo")
            .funcs(0x340, &[(0x120, 0x200)])
            .relocs(0x380, &[(0x300, 0)]);
        let (_, listing) = load(&img.data).unwrap();
        assert!(listing.events.contains(&Event::Annotation {
            address: 0x300,
            text: "foo".to_string(),
            position: AnnotationPosition::Repeatable,
        }));
    }

    #[test]
    fn zero_code_address_is_not_bound() {
        let mut img = Image::new(0x400);
        img.str(0x120, "data_only")
            .str(0x130, "bar")
            .funcs(0x340, &[(0x120, 0), (0x130, 0x210)])
            .relocs(0x380, &[(0x300, 0)]);

        let (report, listing) = load(&img.data).unwrap();

        assert!(!listing.is_function(0));
        assert_eq!(listing.name_at(0), None);
        assert!(listing.is_function(0x210));
        // name still usable by relocations
        assert_eq!(
            listing.annotations().collect::<Vec<_>>(),
            vec![(0x300, "data_only")]
        );
        assert_eq!(report.symbols.len(), 1);
    }

    #[test]
    fn excluded_names_are_named_but_not_functions() {
        let mut img = Image::new(0x400);
        img.str(0x120, "_vt$3Foo")
            .str(0x130, "__CTOR_LIST__")
            .str(0x140, "real")
            .funcs(0x340, &[(0x120, 0x200), (0x130, 0x204), (0x140, 0x208)]);

        let (report, listing) = load(&img.data).unwrap();

        assert_eq!(listing.name_at(0x200), Some("_vt$3Foo"));
        assert_eq!(listing.name_at(0x204), Some("__CTOR_LIST__"));
        assert!(!listing.is_function(0x200));
        assert!(!listing.is_function(0x204));
        assert!(listing.is_function(0x208));
        assert_eq!(report.function_count(), 1);
    }

    #[test]
    fn bad_relocation_index_is_skipped() {
        let mut img = Image::new(0x400);
        img.str(0x120, "foo")
            .funcs(0x340, &[(0x120, 0x200)])
            .relocs(0x380, &[(0x300, 7), (0x304, 0), (0x308, 1)]);

        let (report, listing) = load(&img.data).unwrap();

        assert_eq!(
            listing.annotations().collect::<Vec<_>>(),
            vec![(0x304, "foo")]
        );
        assert_eq!(report.skipped_relocations, 2);
        assert_eq!(report.annotated_relocations, 1);
    }

    #[test]
    fn wrong_magic_leaves_sink_untouched() {
        let mut img = Image::new(0x100);
        img.data[..4].copy_from_slice(b"ELF\0");
        let mut listing = Listing::new();
        let err = Loader::new(R5900)
            .load(&img.data, &mut listing)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<LoadError>(),
            Some(&LoadError::UnrecognizedFormat { actual: *b"ELF\0" })
        );
        assert!(listing.events.is_empty());
    }

    #[test]
    fn missing_boundary_is_fatal() {
        let img = Image::new(0x100);
        let mut listing = Listing::new();
        let err = Loader::new(R5900)
            .load(&img.data, &mut listing)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<LoadError>(),
            Some(&LoadError::UndefinedSegmentBoundary)
        );
        assert_eq!(listing.regions().count(), 0);
    }

    #[test]
    fn image_name_and_table_sentinels() {
        let mut img = Image::new(0x400);
        img.str(0x110, "r100.rel")
            .u32(0x14, 0x110)
            .u32(0x18, 0x180)
            .u32(0x1c, 0x190)
            .str(0x120, "__DTOR_LIST__")
            .funcs(0x340, &[(0x120, 0x190)]);

        let (report, listing) = load(&img.data).unwrap();

        assert_eq!(report.image_name.as_deref(), Some("r100.rel"));
        assert_eq!(report.data_extent, 0x110);
        assert_eq!(listing.name_at(0x180), Some("__CTOR_LIST__"));
        // already named by the export table, not named twice
        let dtor_names = listing
            .events
            .iter()
            .filter(|e| matches!(e, Event::Name { address: 0x190, .. }))
            .count();
        assert_eq!(dtor_names, 1);
        assert!(!listing.is_function(0x180));
    }

    #[test]
    fn names_are_capped() {
        let mut img = Image::new(0x400);
        img.str(0x120, "abcdefghij").funcs(0x340, &[(0x120, 0x200)]);
        let mut listing = Listing::new();
        Loader::new(R5900)
            .with_name_limit(4)
            .load(&img.data, &mut listing)
            .unwrap();
        assert_eq!(listing.name_at(0x200), Some("abcd"));
    }

    #[test]
    fn truncated_function_table_still_loads() {
        let mut img = Image::new(0x200);
        img.str(0x120, "foo").funcs(0x1f8, &[(0x120, 0x150)]);
        // declare more entries than fit; the rest read as zero
        img.u32(0x10, 4);

        let (report, listing) = load(&img.data).unwrap();
        assert_eq!(report.table_entries, 4);
        assert!(listing.is_function(0x150));
        assert_eq!(report.symbols.len(), 1);
    }

    #[test]
    fn huge_declared_count_on_short_file_loads() {
        let mut img = Image::new(0x400);
        img.str(0x380, "foo").funcs(0x340, &[(0x380, 0x200)]);
        img.u32(0x10, 2_000_000);

        let (report, listing) = load(&img.data).unwrap();

        assert_eq!(report.table_entries, 2_000_000);
        assert_eq!(report.data_extent, 0x340);
        assert_eq!(listing.regions().count(), 3);
        assert_eq!(listing.name_at(0x200), Some("foo"));
        assert!(listing.is_function(0x200));
    }

    #[test]
    fn explicit_table_limit_is_enforced() {
        let mut img = Image::new(0x400);
        img.str(0x380, "foo").funcs(0x340, &[(0x380, 0x200)]);
        img.u32(0x10, 2_000_000);

        let mut listing = Listing::new();
        let err = Loader::new(R5900)
            .with_max_table_entries(1 << 20)
            .load(&img.data, &mut listing)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::TableTooLarge { count: 2_000_000, .. })
        ));
        assert_eq!(listing.regions().count(), 0);
    }

    #[test]
    fn regions_use_real_size_over_header_size() {
        let mut img = Image::new(0x400);
        img.str(0x120, "foo").funcs(0x340, &[(0x120, 0x200)]);
        // header claims a larger file than the one on disk
        img.u32(0x2c, 0x800);

        let (report, listing) = load(&img.data).unwrap();

        let regions: Vec<_> = listing.regions().map(|s| (s.start, s.end)).collect();
        assert_eq!(regions, vec![(0, 0x100), (0x100, 0x120), (0x120, 0x400)]);
        assert_eq!(report.data_extent, 0x120);
        assert!(listing.is_function(0x200));
    }
}
