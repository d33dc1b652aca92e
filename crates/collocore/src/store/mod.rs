//! The single-file, memory-mappable collocation store: a writer that
//! publishes a complete file atomically, and a reader that memory-maps
//! it and resolves a head lemma to its entry in O(1).

mod format;
mod reader;
mod writer;

pub use format::StoreHeader;
pub use reader::StoreReader;
pub use writer::StoreWriter;
