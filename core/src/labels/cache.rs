//! Reuse rules for derived label tables
//!
//! The default rule treats a cache file as valid whenever it exists, so a
//! changed source CSV or image directory is silently ignored until the cache
//! is deleted. The fingerprint rule hashes the source CSV bytes and the sorted
//! image listing with xxh3 and stores the digest in a `.xxh3` sidecar.

use crate::error::Result;
use crate::types::CachePolicy;
use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::Xxh3;

/// Sidecar path holding the fingerprint of a cache file
pub fn sidecar_path(cache: &Path) -> PathBuf {
    let mut name = cache.as_os_str().to_owned();
    name.push(".xxh3");
    PathBuf::from(name)
}

/// Hashes a source CSV together with a list of image ids
///
/// `image_ids` is sorted before hashing so directory iteration order does
/// not matter.
pub fn fingerprint(source_csv: &Path, image_ids: &[String]) -> Result<u64> {
    let mut hasher = Xxh3::new();
    let mut reader = BufReader::new(File::open(source_csv)?);
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let mut ids: Vec<&String> = image_ids.iter().collect();
    ids.sort();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    Ok(hasher.digest())
}

/// Decides whether `cache` can be reused under `policy`
///
/// `current` is only evaluated for [`CachePolicy::Fingerprint`].
pub fn is_fresh<F>(cache: &Path, policy: CachePolicy, current: F) -> Result<bool>
where
    F: FnOnce() -> Result<u64>,
{
    if !cache.is_file() {
        debug!("No cache at {}", cache.display());
        return Ok(false);
    }
    match policy {
        CachePolicy::Exists => Ok(true),
        CachePolicy::Fingerprint => {
            let stored = match std::fs::read_to_string(sidecar_path(cache)) {
                Ok(s) => s,
                Err(_) => {
                    info!("Cache {} has no fingerprint; rebuilding", cache.display());
                    return Ok(false);
                }
            };
            let fresh = stored.trim() == format!("{:016x}", current()?);
            if !fresh {
                info!("Cache {} is stale; rebuilding", cache.display());
            }
            Ok(fresh)
        }
    }
}

/// Records the fingerprint for `cache`
pub fn write_fingerprint(cache: &Path, digest: u64) -> Result<()> {
    std::fs::write(sidecar_path(cache), format!("{:016x}\n", digest))?;
    Ok(())
}
