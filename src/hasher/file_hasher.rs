use crate::hasher::Digest;
use crate::hasher::DigestBuilder;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Chunk size for large-file streaming hashing (64 KB)
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Hash a single file, reading in 64 KB chunks.
pub fn hash_file(path: &Path) -> Result<Digest> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open file for hashing: {}", path.display()))?;
    let length = file
        .metadata()
        .with_context(|| format!("Cannot stat: {}", path.display()))?
        .len();
    hash_reader(BufReader::new(file), length)
        .with_context(|| format!("Read error on: {}", path.display()))
}

/// Hash exactly `length` bytes from `reader` in bounded chunks.
///
/// A reader that runs dry early (file truncated mid-scan) hashes whatever it
/// produced instead of failing.
pub fn hash_reader<R: Read>(mut reader: R, length: u64) -> Result<Digest> {
    let mut hasher = DigestBuilder::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut position = 0u64;

    while position < length {
        let want = (length - position).min(CHUNK_SIZE as u64) as usize;
        let n = reader.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        position += n as u64;
    }

    Ok(hasher.finalize())
}

/// Combine digests in the given order into one.
pub fn combine<'a, I>(digests: I) -> Digest
where
    I: IntoIterator<Item = &'a Digest>,
{
    let mut hasher = DigestBuilder::new();
    for digest in digests {
        hasher.update_digest(digest);
    }
    hasher.finalize()
}
