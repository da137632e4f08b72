// Retrieval over the index snapshot

pub mod engine;
pub mod expansion;
pub mod rag;
