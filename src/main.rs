//! Entry point for the dlresolve inspection tool.
//!
//! This file handles high-level application flow:
//! 1. Parse command-line arguments using `clap`.
//! 2. Memory-map and parse the target binary (and libc, if given).
//! 3. Build the requested payload variant.
//! 4. Print the ROP chain and fake data as hex.
//!
//! Error handling is done via `anyhow`.

use anyhow::{Context, Result};
use clap::Parser;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

use dlresolve::config::{parse_addr, Config};
use dlresolve::elf::ElfImage;
use dlresolve::image::Target;
use dlresolve::utils::hex;
use dlresolve::{direct, linkmap};

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

fn main() -> Result<()> {
    let config = Config::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .context("invalid log level")?,
        )
        .init();

    let binary_map = map_file(&config.binary)?;
    let binary = ElfImage::parse(&binary_map)
        .with_context(|| format!("failed to parse {}", config.binary.display()))?;

    let (rop, data) = match &config.libc {
        Some(libc_path) => {
            let libc_map = map_file(libc_path)?;
            let libc = ElfImage::parse(&libc_map)
                .with_context(|| format!("failed to parse {}", libc_path.display()))?;
            let target = if config.target.starts_with("0x") {
                Target::Offset(parse_addr(&config.target).map_err(anyhow::Error::msg)?)
            } else {
                Target::Symbol(config.target.clone())
            };
            linkmap::resolve(
                &binary,
                &libc,
                config.addr,
                &config.got_func,
                &target,
                config.write_addr.is_none(),
                config.write_addr.unwrap_or(0),
            )?
        }
        None => {
            anyhow::ensure!(
                config.write_addr.is_none(),
                "--write-addr requires --libc (fake-link-map variant)"
            );
            anyhow::ensure!(
                !config.target.starts_with("0x"),
                "offset targets require --libc (fake-link-map variant)"
            );
            direct::resolve(&binary, config.addr, &config.got_func, &config.target)?
        }
    };

    println!("rop:  {}", hex(&rop));
    println!("data: {}", hex(&data));
    Ok(())
}
