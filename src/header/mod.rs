//! Typed ELF file structure headers and records

pub mod dynamic;
pub mod elf;
pub mod program;
pub mod relocation;
pub mod section;
pub mod symbol;
