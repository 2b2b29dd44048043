//! Read-only collaborator views of a parsed binary.
//!
//! The payload builders never parse ELF data themselves; they consume two
//! narrow interfaces implemented by whatever holds the parsed image. This
//! keeps the builders pure: each call only reads these views and allocates
//! fresh output buffers.

/// Symbol-side view of an image, implemented by the libc the payload
/// resolves against.
pub trait SymbolTable {
    /// Offset of a defined dynamic symbol from the image base.
    fn symbol_offset(&self, name: &str) -> Option<u64>;

    /// Address of the first gadget matching the exact instruction sequence
    /// (e.g. `["pop rdi", "ret"]`).
    fn gadget_addr(&self, insns: &[String]) -> Option<u64>;
}

/// Section-side view of an image, implemented by the target binary.
pub trait SectionTable {
    /// Address of the GOT slot backing a PLT-called function.
    fn got_entry(&self, name: &str) -> Option<u64>;

    /// Virtual address of a section, by name (e.g. `".plt"`).
    fn section_addr(&self, name: &str) -> Option<u64>;
}

/// What the link-map resolver should make the linker compute.
///
/// All three variants reduce to a libc offset; `Offset` skips the lookup,
/// `Symbol` goes through the symbol table, `Gadget` through the
/// instruction-list search.
#[derive(Debug, Clone)]
pub enum Target {
    /// A raw offset from the libc base.
    Offset(u64),
    /// A symbol name resolved via the libc symbol table.
    Symbol(String),
    /// An instruction sequence resolved via gadget search.
    Gadget(Vec<String>),
}

impl From<u64> for Target {
    fn from(offset: u64) -> Self {
        Target::Offset(offset)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Symbol(name.to_string())
    }
}
