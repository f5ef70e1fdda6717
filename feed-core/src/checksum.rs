use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Streamed SHA-256 of a file, lower-hex.
pub fn sha256_hex_file(path: &Path) -> Result<String> {
  let mut file = fs::File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buf = [0u8; 64 * 1024];
  loop {
    let n = file.read(&mut buf)?;
    if n == 0 {
      break;
    }
    hasher.update(&buf[..n]);
  }
  Ok(format!("{:x}", hasher.finalize()))
}

/// Published checksums may be upper- or lower-hex; compare without case.
pub fn matches(expected: &str, actual: &str) -> bool {
  expected.eq_ignore_ascii_case(actual)
}
