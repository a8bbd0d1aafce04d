use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use tracing::debug;

use crate::{Result, Sha256Hasher, VerificationError, VerifiedReader};

type FileDigest = VerifiedReader<BufReader<File>, Sha256Hasher>;

/// Read the whole file at `path` through a SHA-256 reader.
fn digest_file(path: &Path) -> Result<FileDigest> {
    let read_error = |source| VerificationError::Read {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(read_error)?;
    let mut reader = VerifiedReader::new(BufReader::new(file), Sha256Hasher::new());
    io::copy(&mut reader, &mut io::sink()).map_err(read_error)?;
    Ok(reader)
}

/// Uppercase hex SHA-256 of the file at `path`.
pub fn sha256_file_hex(path: &Path) -> Result<String> {
    Ok(hex::encode_upper(digest_file(path)?.into_digest()))
}

/// Checks a local payload against a published checksum.
pub trait Verifier {
    fn verify(&self, payload: &Path, expected_hex: &str) -> Result<()>;
}

/// SHA-256 comparison against a hex checksum in either case.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Verifier;

impl Verifier for Sha256Verifier {
    fn verify(&self, payload: &Path, expected_hex: &str) -> Result<()> {
        let expected_hex = expected_hex.trim();
        let reader = digest_file(payload)?;
        debug!(path = %payload.display(), expected = %expected_hex, "checking payload digest");
        match hex::decode(expected_hex) {
            Ok(expected) => reader.finish(&expected),
            // Not hex at all: nothing can match it.
            Err(_) => Err(VerificationError::Mismatch {
                expected: expected_hex.to_ascii_uppercase(),
                actual:   hex::encode_upper(reader.into_digest()),
            }),
        }
    }
}
