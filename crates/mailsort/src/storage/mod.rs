//! Durable storage for the local mirror
//!
//! The sync engine commits through the [`MirrorStore`] trait so that it can
//! run against the zstd file store in production and an in-memory store in
//! tests.

mod file;
mod memory;
mod traits;

pub use file::{FileMirrorStore, MIRROR_FILE};
pub use memory::InMemoryMirrorStore;
pub use traits::MirrorStore;
