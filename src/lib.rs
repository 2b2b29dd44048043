//! ret2dlresolve payload construction.
//!
//! This library builds the fake dynamic-linker bookkeeping structures and the
//! small ROP chains needed to make `_dl_runtime_resolve` call an arbitrary
//! libc function, without a leaked libc base. It is organized into several
//! modules:
//! - `image`: read-only collaborator views of a parsed binary.
//! - `elf`: `object`-backed implementation of those views.
//! - `linkmap`: resolution through a fully fake link map.
//! - `direct`: resolution through fake entries appended after the real tables.
//! - `config`: CLI configuration for the companion inspection tool.

pub mod config;
pub mod direct;
pub mod elf;
pub mod image;
pub mod linkmap;
pub mod utils;
