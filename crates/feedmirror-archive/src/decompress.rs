use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use feedmirror_fs::StagedFile;
use tracing::info;

use crate::{Compression, Error, Result};

/// Sibling path of `archive` with its compression suffix removed.
///
/// Returns `None` when the file name carries no known suffix.
pub fn decompressed_path(archive: &Path) -> Option<PathBuf> {
    let codec = Compression::from_path(archive)?;
    let name = archive.file_name()?.to_str()?;
    let stem = name.strip_suffix(codec.suffix())?;
    Some(archive.with_file_name(stem))
}

/// Decompress `archive` next to itself and return the output path.
///
/// The output is staged and renamed into place only after the whole stream
/// decoded cleanly, so a truncated archive leaves any previous output intact.
pub fn decompress(archive: &Path) -> Result<PathBuf> {
    let codec = Compression::from_path(archive).ok_or_else(|| Error::UnsupportedFormat {
        path: archive.to_path_buf(),
    })?;
    let output = decompressed_path(archive).ok_or_else(|| Error::UnsupportedFormat {
        path: archive.to_path_buf(),
    })?;

    let input = File::open(archive).map_err(|source| Error::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let mut decoder = codec.decoder(BufReader::new(input));

    let staged = StagedFile::new(&output)?;
    let out = File::create(staged.path()).map_err(|source| Error::Write {
        path: staged.path().to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(out);

    copy_decoded(&mut decoder, &mut writer, archive, staged.path())?;
    writer
        .into_inner()
        .map_err(|e| e.into_error())
        .and_then(|file| file.sync_all())
        .map_err(|source| Error::Write {
            path: staged.path().to_path_buf(),
            source,
        })?;

    let output = staged.commit()?;
    info!(path = %output.display(), "uncompressed");
    Ok(output)
}

fn copy_decoded(
    decoder: &mut dyn io::Read,
    writer: &mut impl Write,
    archive: &Path,
    staging: &Path,
) -> Result<u64> {
    let mut buffer = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = match decoder.read(&mut buffer) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(Error::Corrupted {
                    path: archive.to_path_buf(),
                    source,
                });
            }
        };
        writer
            .write_all(&buffer[..n])
            .map_err(|source| Error::Write {
                path: staging.to_path_buf(),
                source,
            })?;
        total += n as u64;
    }
}
