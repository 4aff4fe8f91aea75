// vocab/mod.rs

pub mod store;
pub mod embedding;

pub use embedding::WordEmbedding;
pub use store::{SlotTag, WordVectorStore};
