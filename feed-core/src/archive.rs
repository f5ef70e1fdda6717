use crate::error::{FeedError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Extracts every file entry of a zip archive directly into `dest`, keeping
/// only each entry's base name. Feed archives occasionally carry an internal
/// directory level; the local layout is flat by contract.
pub fn extract_zip_flattened(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
  fs::create_dir_all(dest)?;

  let file = fs::File::open(archive)?;
  let mut zip = zip::ZipArchive::new(file)?;

  let mut extracted = Vec::new();
  for i in 0..zip.len() {
    let mut entry = zip.by_index(i)?;
    if entry.is_dir() {
      continue;
    }

    let base = Path::new(entry.name())
      .file_name()
      .and_then(|s| s.to_str())
      .map(str::to_string)
      .ok_or_else(|| FeedError::BadArchiveEntry {
        entry: entry.name().to_string(),
      })?;

    let out_path = dest.join(base);
    let mut out = fs::File::create(&out_path)?;
    io::copy(&mut entry, &mut out)?;
    extracted.push(out_path);
  }

  tracing::debug!(
    archive = %archive.display(),
    dest = %dest.display(),
    count = extracted.len(),
    "archive extracted"
  );
  Ok(extracted)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use zip::write::SimpleFileOptions;

  fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, body) in entries {
      writer
        .start_file(name.to_string(), SimpleFileOptions::default())
        .unwrap();
      writer.write_all(body).unwrap();
    }
    writer.finish().unwrap();
  }

  #[test]
  fn nested_entries_are_flattened() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("feed.zip");
    write_zip(
      &archive,
      &[("inner/dir/nvdcve-1.1-2010.json", b"{\"CVE_Items\":[]}")],
    );

    let dest = dir.path().join("out");
    let extracted = extract_zip_flattened(&archive, &dest).unwrap();

    assert_eq!(extracted, vec![dest.join("nvdcve-1.1-2010.json")]);
    let body = fs::read_to_string(&extracted[0]).unwrap();
    assert_eq!(body, "{\"CVE_Items\":[]}");
  }

  #[test]
  fn multiple_files_all_land_in_dest() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("feed.zip");
    write_zip(&archive, &[("a.json", b"1"), ("sub/b.json", b"2")]);

    let dest = dir.path().join("out");
    let extracted = extract_zip_flattened(&archive, &dest).unwrap();
    assert_eq!(extracted.len(), 2);
    assert!(dest.join("a.json").exists());
    assert!(dest.join("b.json").exists());
  }
}
