mod collection;
mod engine;

pub use collection::MemoryCollection;
pub use engine::MemoryStorageEngine;
