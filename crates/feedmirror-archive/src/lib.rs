//! Streaming decompression of mirrored feed archives.
//!
//! - `format.rs` - Compression detection from the file suffix
//! - `decompress.rs` - Archive to sibling-file decompression

pub use decompress::{decompress, decompressed_path};
pub use error::{Error, Result};
pub use format::Compression;

mod decompress;
mod error;
mod format;
