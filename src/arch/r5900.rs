//! Emotion Engine (MIPS R5900) backend.
//!
//! The PS2 main CPU runs little-endian; SN's toolchain is GCC based.

use super::{
    Architecture, CallingConvention, Compiler, CompilerAbi, MemoryModel, PointerModel, TargetConfig,
};
use object::Endianness;

// binutils' E_MIPS_MACH_5900, not exported by the object crate
const EF_MIPS_MACH_5900: u32 = 0x0092_0000;

/// The R5900 backend.
pub struct R5900;

impl Architecture for R5900 {
    fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    fn target_config(&self) -> TargetConfig {
        TargetConfig {
            processor: "r5900l",
            endianness: self.endianness(),
            abi: CompilerAbi {
                compiler: Compiler::Gnu,
                pointer_model: PointerModel::Near32Far48,
                memory_model: MemoryModel::NearNear,
                calling_convention: CallingConvention::Cdecl,
                default_align: 0,
                size_int: 4,
                size_bool: 1,
                size_enum: 4,
                size_short: 2,
                size_long: 4,
                size_long_long: 8,
                size_long_double: 8,
            },
        }
    }

    fn object_architecture(&self) -> object::Architecture {
        object::Architecture::Mips
    }

    fn elf_flags(&self) -> u32 {
        object::elf::EF_MIPS_ARCH_3 | EF_MIPS_MACH_5900
    }
}
