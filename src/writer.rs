//! ELF export.
//!
//! A sink that turns a loaded module into an ELF32 relocatable object so
//! tools that know nothing about SNR2 can open it. Each segment becomes a
//! section holding the original bytes, every bound name becomes a symbol
//! (section-relative, since relocatable sections have no load address)
//! and relocation annotations are collected as `address\ttext` lines in a
//! non-allocated `.annotations` section.

use anyhow::{Context, Result};
use object::write::{Object, SectionId, Symbol, SymbolSection};
use object::{BinaryFormat, FileFlags, SectionKind, SymbolFlags, SymbolKind, SymbolScope};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::Path;

use crate::arch::{Architecture, TargetConfig};
use crate::layout::Segment;
use crate::sink::{AnnotationPosition, Sink};

const ANNOTATIONS_SECTION: &str = ".annotations";

/// Collects sink calls and writes them out as ELF.
pub struct ElfWriter<'data> {
    image: &'data [u8],
    object: Object<'data>,
    sections: Vec<(Segment, SectionId)>,
    names: BTreeMap<u32, String>,
    functions: BTreeSet<u32>,
    annotations: String,
}

impl<'data> ElfWriter<'data> {
    pub fn new<A: Architecture>(arch: &A, image: &'data [u8]) -> Self {
        let mut object = Object::new(
            BinaryFormat::Elf,
            arch.object_architecture(),
            arch.endianness(),
        );
        object.flags = FileFlags::Elf {
            os_abi: object::elf::ELFOSABI_SYSV,
            abi_version: 0,
            e_flags: arch.elf_flags(),
        };
        Self {
            image,
            object,
            sections: Vec::new(),
            names: BTreeMap::new(),
            functions: BTreeSet::new(),
            annotations: String::new(),
        }
    }

    /// Emits the symbol table and serializes the object.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let mut addresses: Vec<u32> = self.names.keys().copied().collect();
        for &address in &self.functions {
            if !self.names.contains_key(&address) {
                addresses.push(address);
            }
        }
        addresses.sort_unstable();

        for address in addresses {
            let is_function = self.functions.contains(&address);
            let name = self
                .names
                .get(&address)
                .cloned()
                .unwrap_or_else(|| format!("sub_{:X}", address));
            let (section, value) = match self.section_containing(address) {
                Some((segment, id)) => (
                    SymbolSection::Section(*id),
                    u64::from(address - segment.start),
                ),
                None => {
                    tracing::debug!("symbol {} at 0x{:x} lies outside the image", name, address);
                    (SymbolSection::Absolute, u64::from(address))
                }
            };
            let kind = if is_function {
                SymbolKind::Text
            } else {
                SymbolKind::Data
            };
            self.object.add_symbol(Symbol {
                name: name.into_bytes(),
                value,
                size: 0,
                kind,
                scope: SymbolScope::Linkage,
                weak: false,
                section,
                flags: SymbolFlags::None,
            });
        }

        if !self.annotations.is_empty() {
            let id = self.object.add_section(
                Vec::new(),
                ANNOTATIONS_SECTION.as_bytes().to_vec(),
                SectionKind::Other,
            );
            self.object
                .set_section_data(id, self.annotations.into_bytes(), 1);
        }

        self.object.write().context("failed to serialize ELF object")
    }

    /// Exported section whose segment holds `address`.
    fn section_containing(&self, address: u32) -> Option<&(Segment, SectionId)> {
        self.sections.iter().find(|(s, _)| s.contains(address))
    }

    /// Serializes the object and writes it to `path`.
    pub fn write(self, path: &Path) -> Result<()> {
        let bytes = self.finish()?;
        std::fs::write(path, &bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

impl<'data> Sink for ElfWriter<'data> {
    fn configure_target(&mut self, target: &TargetConfig) -> Result<()> {
        tracing::debug!("exporting {} module as ELF", target.processor);
        Ok(())
    }

    fn create_region(&mut self, segment: &Segment) -> Result<()> {
        let start = segment.start as usize;
        let end = (segment.end as usize).min(self.image.len());
        let data = self.image.get(start..end).unwrap_or(&[]);
        let id = self
            .object
            .add_section(Vec::new(), segment.name.as_bytes().to_vec(), segment.kind);
        let align = if segment.is_code() { 16 } else { 4 };
        self.object.set_section_data(id, data, align);
        self.sections.push((segment.clone(), id));
        Ok(())
    }

    fn set_name(&mut self, address: u32, name: &str) -> Result<()> {
        self.names.insert(address, name.to_string());
        Ok(())
    }

    fn mark_function(&mut self, address: u32) -> Result<()> {
        self.functions.insert(address);
        Ok(())
    }

    fn add_annotation(
        &mut self,
        address: u32,
        text: &str,
        _position: AnnotationPosition,
    ) -> Result<()> {
        writeln!(self.annotations, "{:08x}\t{}", address, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::r5900::R5900;
    use crate::layout::Layout;
    use object::{Object as _, ObjectSection, ObjectSymbol};

    fn export(image: &[u8], layout: &Layout) -> Vec<u8> {
        let mut writer = ElfWriter::new(&R5900, image);
        writer.configure_target(&R5900.target_config()).unwrap();
        for segment in &layout.segments {
            writer.create_region(segment).unwrap();
        }
        writer.set_name(0x200, "foo").unwrap();
        writer.mark_function(0x200).unwrap();
        writer.set_name(0x380, "_vt$3Foo").unwrap();
        writer.mark_function(0x210).unwrap();
        writer.set_name(0x900, "far").unwrap();
        writer
            .add_annotation(0x300, "foo", AnnotationPosition::Repeatable)
            .unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn exports_mips_elf() {
        let image: Vec<u8> = (0..0x400u32).map(|i| i as u8).collect();
        let layout = Layout::new(0x340, 0x400);
        let bytes = export(&image, &layout);

        let obj = object::File::parse(&*bytes).unwrap();
        assert_eq!(obj.architecture(), object::Architecture::Mips);
        assert!(obj.is_little_endian());
        assert!(!obj.is_64());

        let text = obj.section_by_name(".text").unwrap();
        assert_eq!(text.kind(), SectionKind::Text);
        assert_eq!(text.data().unwrap(), &image[0x100..0x340]);
        assert_eq!(obj.section_by_name(".sndata2").unwrap().size(), 0xc0);

        let foo = obj.symbols().find(|s| s.name() == Ok("foo")).unwrap();
        assert_eq!(foo.kind(), SymbolKind::Text);
        assert_eq!(foo.address(), 0x100);
        assert_eq!(foo.section_index(), Some(text.index()));

        let vt = obj.symbols().find(|s| s.name() == Ok("_vt$3Foo")).unwrap();
        assert_eq!(vt.kind(), SymbolKind::Data);
        assert_eq!(vt.address(), 0x40);

        assert!(obj.symbols().any(|s| s.name() == Ok("sub_210")));

        // past the end of the image: kept, but not tied to a section
        let far = obj.symbols().find(|s| s.name() == Ok("far")).unwrap();
        assert_eq!(far.address(), 0x900);
        assert_eq!(far.section_index(), None);

        let notes = obj.section_by_name(ANNOTATIONS_SECTION).unwrap();
        assert_eq!(notes.data().unwrap(), b"00000300\tfoo\n");
    }
}
