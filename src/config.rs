//! Configuration module.
//!
//! This module defines the command-line interface (CLI) for the companion
//! inspection tool using `clap`. The library itself takes no configuration;
//! these options only drive the one-shot payload dump in `main`.

use clap::Parser;
use std::path::PathBuf;

/// Builds ret2dlresolve payloads for x86_64 ELF binaries.
///
/// With `--libc`, builds the fake-link-map variant against that libc image;
/// without it, builds the direct fake-table variant resolved by the real
/// linker search order. The ROP chain and fake data are printed as hex.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Target binary
    pub binary: PathBuf,

    /// libc image (selects the fake-link-map variant)
    #[arg(long)]
    pub libc: Option<PathBuf>,

    /// Address where the fake data / link map will be planted
    #[arg(long, value_parser = parse_addr)]
    pub addr: u64,

    /// GOT entry to resolve through (must be PLT-called by the binary)
    #[arg(long)]
    pub got_func: String,

    /// Function to resolve: a symbol name, or a 0x-prefixed libc offset
    /// (offsets require --libc)
    #[arg(long)]
    pub target: String,

    /// Write the resolved address here instead of back to the GOT slot
    /// (requires --libc)
    #[arg(long, value_parser = parse_addr)]
    pub write_addr: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", help = "Set the logging level")]
    pub log_level: String,
}

/// Parses an address argument, accepting `0x`-prefixed hex or decimal.
pub fn parse_addr(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{s}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_decimal_addresses() {
        assert_eq!(parse_addr("0x404100"), Ok(0x404100));
        assert_eq!(parse_addr("64"), Ok(64));
        assert!(parse_addr("0xzz").is_err());
        assert!(parse_addr("").is_err());
    }
}
