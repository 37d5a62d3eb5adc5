//! Content digests used to decide staleness.
//!
//! Files hash to the 128-bit digest of their byte stream.  Directories hash
//! to a digest over the sorted set of `(relative path, file digest)` pairs of
//! the regular files beneath them, so the result is independent of walk
//! order, mtimes, and non-regular entries.

use crate::error::{Error, Result};
use data_encoding::HEXLOWER;
use md5::{Digest, Md5};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Fan-out of the parallel file digesters used by `hash_dir`.
const DIGESTERS: usize = 20;

/// Digest a regular file, as 32 chars of lower hex.
pub fn hash_file(path: &str) -> Result<String> {
    let file = File::open(path).map_err(|err| Error::io(path, err))?;
    let sum = digest_reader(file).map_err(|err| Error::io(path, err))?;
    Ok(HEXLOWER.encode(&sum))
}

/// Digest a directory, as 32 chars of lower hex.
pub fn hash_dir(path: &str) -> Result<String> {
    let root = Path::new(path);
    let mut files = Vec::new();
    collect_files(root, "", &mut files)?;

    let mut pairs = digest_files(root, &files)?;
    pairs.sort();

    let mut hasher = Md5::new();
    for (rel, sum) in &pairs {
        hasher.update(rel.as_bytes());
        hasher.update(sum);
    }
    Ok(HEXLOWER.encode(&hasher.finalize()))
}

fn digest_reader(mut r: impl Read) -> std::io::Result<[u8; 16]> {
    let mut hasher = Md5::new();
    let mut buf = [0u8; 64 << 10];
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

/// Gather the paths of all regular files under `dir`, relative to the walk
/// root.  Symlinks and other non-regular entries don't contribute.
fn collect_files(dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|err| Error::io(dir, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| Error::io(dir, err))?;
        let ty = entry.file_type().map_err(|err| Error::io(entry.path(), err))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };
        if ty.is_dir() {
            collect_files(&entry.path(), &rel, out)?;
        } else if ty.is_file() {
            out.push(rel);
        }
    }
    Ok(())
}

/// Digest the named files with a fixed parallel fan-out.  Any single failure
/// aborts the whole batch.
fn digest_files(root: &Path, files: &[String]) -> Result<Vec<(String, [u8; 16])>> {
    if files.is_empty() {
        return Ok(Vec::new());
    }
    let per_worker = files.len().div_ceil(DIGESTERS);
    let results: Vec<Result<Vec<(String, [u8; 16])>>> = std::thread::scope(|s| {
        let handles: Vec<_> = files
            .chunks(per_worker)
            .map(|chunk| {
                s.spawn(move || {
                    let mut pairs = Vec::with_capacity(chunk.len());
                    for rel in chunk {
                        let path = root.join(rel);
                        let file = File::open(&path).map_err(|err| Error::io(&path, err))?;
                        let sum = digest_reader(file).map_err(|err| Error::io(&path, err))?;
                        pairs.push((rel.clone(), sum));
                    }
                    Ok(pairs)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut pairs = Vec::with_capacity(files.len());
    for result in results {
        pairs.extend(result?);
    }
    Ok(pairs)
}
