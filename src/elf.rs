//! `object`-backed implementation of the collaborator views.
//!
//! Wraps a parsed 64-bit ELF and precomputes the two lookups the payload
//! builders need: the GOT map (JMP_SLOT relocation offsets keyed by symbol
//! name) and the defined dynamic symbol offsets. Section addresses and the
//! gadget search read through to the `object` file on demand.

use anyhow::{bail, Context, Result};
use object::read::{Object, ObjectSection, ObjectSymbol};
use object::{elf, RelocationFlags, RelocationTarget, SectionKind};
use std::collections::HashMap;

use crate::image::{SectionTable, SymbolTable};

/// A parsed ELF image exposing the views the payload builders consume.
pub struct ElfImage<'a> {
    file: object::File<'a>,
    got: HashMap<String, u64>,
    symbols: HashMap<String, u64>,
}

impl<'a> ElfImage<'a> {
    /// Parses a 64-bit ELF image from raw bytes.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let file = object::File::parse(data).context("failed to parse ELF image")?;
        if file.format() != object::BinaryFormat::Elf || !file.is_64() {
            bail!("only 64-bit ELF images are supported");
        }

        let mut symbols = HashMap::new();
        let mut names_by_index = HashMap::new();
        for sym in file.dynamic_symbols() {
            let name = sym.name()?;
            if name.is_empty() {
                continue;
            }
            names_by_index.insert(sym.index(), name.to_string());
            if !sym.is_undefined() {
                // First definition wins, matching lookup order.
                symbols.entry(name.to_string()).or_insert_with(|| sym.address());
            }
        }

        // GOT slots come from the JMP_SLOT dynamic relocations: r_offset is
        // the slot address, the relocation symbol names the function.
        let mut got = HashMap::new();
        if let Some(relocations) = file.dynamic_relocations() {
            for (offset, reloc) in relocations {
                let jmp_slot = matches!(
                    reloc.flags(),
                    RelocationFlags::Elf { r_type } if r_type == elf::R_X86_64_JUMP_SLOT
                );
                if !jmp_slot {
                    continue;
                }
                if let RelocationTarget::Symbol(index) = reloc.target() {
                    if let Some(name) = names_by_index.get(&index) {
                        got.insert(name.clone(), offset);
                    }
                }
            }
        }
        tracing::debug!(
            "parsed image: {} dynamic symbols, {} GOT entries",
            symbols.len(),
            got.len()
        );

        Ok(Self { file, got, symbols })
    }
}

impl SymbolTable for ElfImage<'_> {
    fn symbol_offset(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).copied()
    }

    fn gadget_addr(&self, insns: &[String]) -> Option<u64> {
        let pattern = encode_gadget(insns)?;
        for section in self.file.sections() {
            if section.kind() != SectionKind::Text {
                continue;
            }
            let Ok(data) = section.data() else { continue };
            if let Some(pos) = find_subslice(data, &pattern) {
                let addr = section.address() + pos as u64;
                tracing::trace!("gadget {:?} at 0x{:x}", insns, addr);
                return Some(addr);
            }
        }
        None
    }
}

impl SectionTable for ElfImage<'_> {
    fn got_entry(&self, name: &str) -> Option<u64> {
        self.got.get(name).copied()
    }

    fn section_addr(&self, name: &str) -> Option<u64> {
        self.file.section_by_name(name).map(|s| s.address())
    }
}

/// Encodes an instruction list as the exact byte sequence to search for.
/// Only the handful of single-byte-operand mnemonics a resolver chain needs;
/// anything else makes the whole lookup fail.
fn encode_gadget(insns: &[String]) -> Option<Vec<u8>> {
    let mut pattern = Vec::new();
    for insn in insns {
        match insn.as_str() {
            "ret" => pattern.push(0xc3),
            "leave" => pattern.push(0xc9),
            "syscall" => pattern.extend_from_slice(&[0x0f, 0x05]),
            "pop rax" => pattern.push(0x58),
            "pop rbx" => pattern.push(0x5b),
            "pop rcx" => pattern.push(0x59),
            "pop rdx" => pattern.push(0x5a),
            "pop rbp" => pattern.push(0x5d),
            "pop rsi" => pattern.push(0x5e),
            "pop rdi" => pattern.push(0x5f),
            _ => return None,
        }
    }
    if pattern.is_empty() { None } else { Some(pattern) }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(insns: &[&str]) -> Vec<String> {
        insns.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn encodes_known_instruction_lists() {
        assert_eq!(encode_gadget(&spec(&["pop rdi", "ret"])), Some(vec![0x5f, 0xc3]));
        assert_eq!(
            encode_gadget(&spec(&["pop rsi", "pop rdx", "ret"])),
            Some(vec![0x5e, 0x5a, 0xc3])
        );
        assert_eq!(encode_gadget(&spec(&["syscall"])), Some(vec![0x0f, 0x05]));
    }

    #[test]
    fn unknown_mnemonics_fail_the_lookup() {
        assert_eq!(encode_gadget(&spec(&["pop r13", "ret"])), None);
        assert_eq!(encode_gadget(&[]), None);
    }

    #[test]
    fn subslice_search_finds_first_match() {
        let text = [0x90, 0x5f, 0xc3, 0x5f, 0xc3];
        assert_eq!(find_subslice(&text, &[0x5f, 0xc3]), Some(1));
        assert_eq!(find_subslice(&text, &[0x5a]), None);
    }
}
