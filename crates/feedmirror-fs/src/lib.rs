//! Atomic file placement primitives.
//!
//! Writers stage their output in a hidden sibling of the destination and
//! rename it into place once complete. A staged file that is dropped without
//! being committed is removed, so a failed download or decompression never
//! clobbers the previous copy.

mod error;
mod staging;

pub use error::{Error, Result};
pub use staging::StagedFile;
