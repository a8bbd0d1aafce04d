use std::io::{self, Read};

use crate::{Hasher, Result, VerificationError};

/// Streaming reader that hashes data as it passes through.
pub struct VerifiedReader<R, H> {
    reader: R,
    hasher: H,
}

impl<R, H> VerifiedReader<R, H> {
    pub fn new(reader: R, hasher: H) -> Self { Self { reader, hasher } }
}

impl<R: Read, H: Hasher> Read for VerifiedReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
        }
        Ok(n)
    }
}

impl<R: Read, H: Hasher> VerifiedReader<R, H> {
    /// Digest of everything read so far.
    pub fn into_digest(self) -> Vec<u8> { self.hasher.finalize() }

    /// Compare the digest of everything read so far with `expected`.
    pub fn finish(self, expected: &[u8]) -> Result<()> {
        let actual = self.into_digest();
        if actual != expected {
            return Err(VerificationError::Mismatch {
                expected: hex::encode_upper(expected),
                actual:   hex::encode_upper(actual),
            });
        }
        Ok(())
    }
}
