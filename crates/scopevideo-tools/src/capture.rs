use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write, stdin, stdout};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn has_gz_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Open a raw capture for streaming.
///
/// `-` reads stdin. Gzip input is detected by the `.gz` extension or the
/// gzip magic bytes and decompressed on the fly.
pub fn open_capture(path: &Path) -> Result<Box<dyn Read + Send>> {
    let mut reader: Box<dyn BufRead + Send> = if path == Path::new("-") {
        Box::new(BufReader::new(stdin()))
    } else {
        let file = File::open(path)
            .with_context(|| format!("failed to open capture: {}", path.display()))?;
        Box::new(BufReader::new(file))
    };

    let head = reader
        .fill_buf()
        .with_context(|| format!("failed to read capture: {}", path.display()))?;
    let is_gzip = has_gz_extension(path) || head.starts_with(&GZIP_MAGIC);

    if is_gzip {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Create a raw capture file, gzip-compressed when the name ends in `.gz`.
///
/// `-` writes uncompressed to stdout.
pub fn create_capture(path: &Path) -> Result<Box<dyn Write>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufWriter::new(stdout())));
    }
    let file = File::create(path)
        .with_context(|| format!("failed to create capture: {}", path.display()))?;
    let writer = BufWriter::new(file);
    if has_gz_extension(path) {
        Ok(Box::new(GzEncoder::new(writer, Compression::default())))
    } else {
        Ok(Box::new(writer))
    }
}
