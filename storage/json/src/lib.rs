mod collection;
mod engine;

pub use collection::JsonCollection;
pub use engine::JsonStorageEngine;
