//! Streaming checksum computation
//!
//! Content is hashed in fixed-size chunks so memory stays bounded no matter
//! the file size. The algorithm set is a caller/config input; nothing here
//! is hard-coded to one digest.

use std::collections::BTreeMap;
use std::path::Path;

use sha2::Digest;
use tokio::io::AsyncReadExt;
use warden_core::{ChecksumAlgorithm, FsError, FsResult};

const CHUNK_SIZE: usize = 64 * 1024;

enum Hasher {
    Crc32(crc32fast::Hasher),
    Blake3(Box<blake3::Hasher>),
    Sha256(sha2::Sha256),
}

impl Hasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Crc32 => Hasher::Crc32(crc32fast::Hasher::new()),
            ChecksumAlgorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
            ChecksumAlgorithm::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            Hasher::Crc32(h) => h.update(chunk),
            Hasher::Blake3(h) => {
                h.update(chunk);
            }
            Hasher::Sha256(h) => h.update(chunk),
        }
    }

    fn finalize(self) -> String {
        match self {
            Hasher::Crc32(h) => format!("{:08x}", h.finalize()),
            Hasher::Blake3(h) => h.finalize().to_hex().to_string(),
            Hasher::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Compute hex digests of a file for every requested algorithm in one pass.
pub async fn compute(
    path: &Path,
    algorithms: &[ChecksumAlgorithm],
) -> FsResult<BTreeMap<ChecksumAlgorithm, String>> {
    let mut hashers: Vec<(ChecksumAlgorithm, Hasher)> = algorithms
        .iter()
        .map(|&a| (a, Hasher::new(a)))
        .collect();

    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| FsError::from_io(e, path))?;
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| FsError::from_io(e, path))?;
        if n == 0 {
            break;
        }
        for (_, hasher) in hashers.iter_mut() {
            hasher.update(&buf[..n]);
        }
    }

    Ok(hashers
        .into_iter()
        .map(|(a, h)| (a, h.finalize()))
        .collect())
}

/// Blake3 digest of one file; the identity used for backup verification and
/// copy integrity checks.
pub async fn blake3_file(path: &Path) -> FsResult<String> {
    let digests = compute(path, &[ChecksumAlgorithm::Blake3]).await?;
    Ok(digests
        .into_iter()
        .next()
        .map(|(_, d)| d)
        .unwrap_or_default())
}
