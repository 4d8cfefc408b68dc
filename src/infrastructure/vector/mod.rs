//! Vector index implementations

mod in_memory;
mod qdrant;

pub use in_memory::InMemoryVectorIndex;
pub use qdrant::{DEFAULT_QDRANT_URL, QdrantIndex};
