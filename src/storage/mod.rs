//! Key-value storage for Foundry.
//!
//! This module provides the persistent JSON key-value store behind
//! workspace progression and navigation state, with file-based and
//! in-memory backends.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileKvStore;
pub use memory::MemoryKvStore;
pub use traits::{KvStore, KvStoreExt};
