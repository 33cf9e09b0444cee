//! Hook surface for an external CPU translator. The translator is linked in
//! separately; only its entry point signature is exposed here so tooling can
//! link against it.

#[repr(C)]
/// Opaque CPU execution environment owned by the external translator
pub struct CpuEnvironment {
    _opaque: [u8; 0],
}

#[repr(C)]
/// Opaque translation block owned by the external translator
pub struct TranslationBlock {
    _opaque: [u8; 0],
}

extern "C" {
    /// Entry point invoked by the external CPU translator to lower a
    /// translation block to intermediate code. Declared here for linkage
    /// only; this crate never calls it.
    pub fn gen_intermediate_code(env: *mut CpuEnvironment, tb: *mut TranslationBlock);
}
