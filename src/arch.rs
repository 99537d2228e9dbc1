//! Target description.
//!
//! This module defines the `Architecture` trait, which holds everything
//! about the target that does not come from the file: processor name,
//! compiler ABI and the ELF identity used when exporting. The format
//! itself carries no machine field, so the loader is handed one.

use object::Endianness;

pub mod r5900;

/// Compiler family used to build the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compiler {
    Gnu,
}

/// Pointer model (low bits of the model byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerModel {
    Unknown = 0x00,
    Near16Far32 = 0x02,
    Near32Far48 = 0x03,
}

/// Memory model (bits 2-3 of the model byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryModel {
    /// Near code, near data.
    NearNear = 0x00,
    FarFar = 0x04,
}

/// Calling convention (high nibble of the model byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    Cdecl = 0x30,
    Stdcall = 0x50,
    Fastcall = 0x70,
}

/// C/C++ ABI the host should assume when typing code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerAbi {
    pub compiler: Compiler,
    pub pointer_model: PointerModel,
    pub memory_model: MemoryModel,
    pub calling_convention: CallingConvention,
    /// Default structure alignment; 0 lets the host decide.
    pub default_align: u8,
    pub size_int: u8,
    pub size_bool: u8,
    pub size_enum: u8,
    pub size_short: u8,
    pub size_long: u8,
    pub size_long_long: u8,
    pub size_long_double: u8,
}

impl CompilerAbi {
    /// Packs the three model fields into a single byte.
    pub fn model_flags(&self) -> u8 {
        self.pointer_model as u8 | self.memory_model as u8 | self.calling_convention as u8
    }
}

/// Processor and ABI configuration handed to a sink once per load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    /// Host processor module name.
    pub processor: &'static str,
    pub endianness: Endianness,
    pub abi: CompilerAbi,
}

/// A trait representing a target processor family.
pub trait Architecture {
    /// Byte order of code and data in the image.
    fn endianness(&self) -> Endianness;

    /// Processor and compiler settings for the host.
    fn target_config(&self) -> TargetConfig;

    /// The `object` architecture used when exporting to ELF.
    fn object_architecture(&self) -> object::Architecture;

    /// `e_flags` for exported ELF files.
    fn elf_flags(&self) -> u32;
}
