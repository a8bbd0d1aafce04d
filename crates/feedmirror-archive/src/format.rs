use std::io::Read;
use std::path::Path;

/// Compression codec of a downloaded archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    Gzip,
}

impl Compression {
    /// Detect the codec from the file name suffix.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        Self::ALL
            .iter()
            .copied()
            .find(|codec| name.len() > codec.suffix().len() && name.ends_with(codec.suffix()))
    }

    const ALL: &'static [Self] = &[Self::Gzip];

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Gzip => ".gz",
        }
    }

    pub fn decoder<'a, R: Read + 'a>(self, reader: R) -> Box<dyn Read + 'a> {
        match self {
            Self::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_gzip_suffix() {
        assert_eq!(
            Compression::from_path(Path::new("out/nvdcve-1.1-2021.json.gz")),
            Some(Compression::Gzip)
        );
    }

    #[test]
    fn test_plain_files_are_not_archives() {
        assert_eq!(Compression::from_path(Path::new("out/nvdcve-1.1-2021.meta")), None);
        assert_eq!(Compression::from_path(Path::new("out/nvdcve-2.0-2021.xml")), None);
        assert_eq!(Compression::from_path(Path::new("out/.gz")), None);
    }
}
