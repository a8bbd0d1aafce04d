//! Content verification for mirrored feed payloads.
//!
//! Digests are computed incrementally while bytes stream through a
//! [`VerifiedReader`], so a multi-hundred-megabyte feed file is never held in
//! memory. Feed sidecars publish SHA-256 as uppercase hexadecimal; the helpers
//! here render and compare in that form.
//!
//! # Example
//!
//! ```
//! use feedmirror_verify::{Sha256Hasher, VerifiedReader};
//! use std::io::Read;
//!
//! let data = b"hello world";
//! let mut reader = VerifiedReader::new(&data[..], Sha256Hasher::new());
//! let mut sink = Vec::new();
//! reader.read_to_end(&mut sink).unwrap();
//!
//! let expected = hex::decode("B94D27B9934D3E08A52E52D7DA7DABFAC484EFE37A5380EE9088F7ACE2EFCDE9").unwrap();
//! reader.finish(&expected).unwrap();
//! ```

pub use self::error::{Result, VerificationError};
pub use self::file::{Sha256Verifier, Verifier, sha256_file_hex};
pub use self::hasher::{Hasher, Sha256Hasher};
pub use self::reader::VerifiedReader;

mod error;
mod file;
mod hasher;
mod reader;
