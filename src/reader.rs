//! Dump file access: picks a decompressor by file extension.

use anyhow::{bail, Context, Result};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Opens a dump file as a buffered reader, decompressing `.xml.gz` and
/// `.xml.bz2` transparently. Anything other than the three supported
/// extensions is rejected up front.
pub fn open_dump(path: &str) -> Result<Box<dyn BufRead>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open wiki dump at: {}", path))?;
    if path.ends_with(".xml.gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else if path.ends_with(".xml.bz2") {
        Ok(Box::new(BufReader::new(BzDecoder::new(file))))
    } else if path.ends_with(".xml") {
        Ok(Box::new(BufReader::new(file)))
    } else {
        bail!(
            "Unsupported dump file: {} (supported: *.xml, *.xml.gz, *.xml.bz2)",
            path
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bzip2::write::BzEncoder;
    use bzip2::Compression;
    use flate2::write::GzEncoder;
    use std::io::{Read, Write};
    use tempfile::TempDir;

    #[test]
    fn reads_plain_xml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.xml");
        std::fs::write(&path, b"<mediawiki/>").unwrap();

        let mut content = String::new();
        let mut reader = open_dump(path.to_str().unwrap()).unwrap();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "<mediawiki/>");
    }

    #[test]
    fn reads_bz2_xml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.xml.bz2");
        let file = File::create(&path).unwrap();
        let mut encoder = BzEncoder::new(file, Compression::fast());
        encoder.write_all(b"<mediawiki/>").unwrap();
        encoder.finish().unwrap();

        let mut content = String::new();
        let mut reader = open_dump(path.to_str().unwrap()).unwrap();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "<mediawiki/>");
    }

    #[test]
    fn reads_gz_xml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.xml.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, flate2::Compression::fast());
        encoder.write_all(b"<mediawiki/>").unwrap();
        encoder.finish().unwrap();

        let mut content = String::new();
        let mut reader = open_dump(path.to_str().unwrap()).unwrap();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "<mediawiki/>");
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.7z");
        std::fs::write(&path, b"junk").unwrap();
        assert!(open_dump(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(open_dump("/nonexistent/dump.xml").is_err());
    }
}
