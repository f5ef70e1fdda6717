use crate::archive;
use crate::checksum;
use crate::error::{FeedError, Result};
use crate::http::{self, HttpClient};
use crate::metadata::MetadataRecord;
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%MZ";

fn cve_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"^(?i)CVE-([0-9]{4})-([0-9]{4,})$").unwrap())
}

/// Validates the `CVE-YYYY-NNNN` shape and returns the canonical uppercase
/// form. Lookups match on the canonical form; the documents store uppercase.
pub fn normalize_identifier(value: &str) -> Result<String> {
  if !cve_re().is_match(value) {
    return Err(FeedError::InvalidIdentifier {
      value: value.to_string(),
    });
  }
  Ok(value.to_ascii_uppercase())
}

pub(crate) fn identifier_year(value: &str) -> Result<i32> {
  let caps = cve_re()
    .captures(value)
    .ok_or_else(|| FeedError::InvalidIdentifier {
      value: value.to_string(),
    })?;
  caps[1].parse().map_err(|_| FeedError::InvalidIdentifier {
    value: value.to_string(),
  })
}

/// One discovered feed as reported by the catalog source. Immutable input;
/// the handle owns a copy and replaces it wholesale on update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDescriptor {
  pub name: String,
  /// Opaque last-updated marker. Compared by inequality, never parsed.
  pub updated: String,
  pub meta_url: String,
  pub gz_url: String,
  pub zip_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
  Gz,
  Zip,
}

/// Summary attributes of a feed document. Populated together once the
/// document has been materialized and parsed; never partially set.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSummary {
  pub data_type: String,
  pub data_format: String,
  pub data_version: f64,
  pub cve_count: u64,
  pub timestamp: NaiveDate,
}

/// A named feed with lazily hydrated state: metadata after `meta_pull`, a
/// local JSON document (plus summary) after `json_pull`. State only
/// accumulates; nothing transitions back to unloaded.
#[derive(Debug, Clone)]
pub struct FeedHandle {
  descriptor: FeedDescriptor,
  meta: Option<MetadataRecord>,
  json_file: Option<PathBuf>,
  summary: Option<FeedSummary>,
  client: HttpClient,
}

impl FeedHandle {
  pub fn new(descriptor: FeedDescriptor, client: HttpClient) -> Self {
    Self {
      descriptor,
      meta: None,
      json_file: None,
      summary: None,
      client,
    }
  }

  pub fn name(&self) -> &str {
    &self.descriptor.name
  }

  pub fn descriptor(&self) -> &FeedDescriptor {
    &self.descriptor
  }

  pub fn meta(&self) -> Option<&MetadataRecord> {
    self.meta.as_ref()
  }

  pub fn json_file(&self) -> Option<&Path> {
    self.json_file.as_deref()
  }

  pub fn summary(&self) -> Option<&FeedSummary> {
    self.summary.as_ref()
  }

  /// Fetches a fresh metadata record, replacing any previous one.
  pub fn meta_pull(&mut self) -> Result<&MetadataRecord> {
    let record = MetadataRecord::fetch(&self.client, &self.descriptor.meta_url)?;
    Ok(self.meta.insert(record))
  }

  /// Downloads the gz or zip archive into `dest`, returning the final path.
  ///
  /// When `expected_sha256` is given and an identically named file at `dest`
  /// already matches it, the download is skipped. This is what keeps repeated
  /// synchronization cheap.
  pub fn download_archive(
    &self,
    kind: ArchiveKind,
    dest: &Path,
    expected_sha256: Option<&str>,
  ) -> Result<PathBuf> {
    let url = match kind {
      ArchiveKind::Gz => &self.descriptor.gz_url,
      ArchiveKind::Zip => &self.descriptor.zip_url,
    };
    let name = http::file_name_from_url(url)?;
    let path = dest.join(name);

    if let Some(expected) = expected_sha256 {
      if is_current(&path, expected)? {
        tracing::debug!(feed = %self.descriptor.name, path = %path.display(), "archive current; download skipped");
        return Ok(path);
      }
    }

    self.client.download_to_file(url, &path)?;
    tracing::info!(feed = %self.descriptor.name, url = %url, "archive downloaded");
    Ok(path)
  }

  /// The synchronization operation: refresh metadata, reuse the local JSON
  /// document when its checksum still matches, otherwise download the zip
  /// archive, extract it flattened and verify the result. Returns the local
  /// document path.
  pub fn json_pull(&mut self, dest: &Path) -> Result<PathBuf> {
    let expected = self.meta_pull()?.sha256.clone();
    self.sync_document(dest, &expected)
  }

  /// Everything `json_pull` does after learning the expected checksum.
  fn sync_document(&mut self, dest: &Path, expected_sha256: &str) -> Result<PathBuf> {
    let json_name = json_name_from_zip_url(&self.descriptor.zip_url)?;
    let json_path = dest.join(&json_name);

    if is_current(&json_path, expected_sha256)? {
      tracing::debug!(feed = %self.descriptor.name, "local document current; download skipped");
      if self.summary.is_none() {
        self.summary = Some(parse_summary(&read_document(&json_path)?)?);
      }
      self.json_file = Some(json_path.clone());
      return Ok(json_path);
    }

    let archive_path = self.download_archive(ArchiveKind::Zip, dest, None)?;
    self.install_document(&archive_path, dest, json_name, expected_sha256)
  }

  /// Extracts a downloaded archive and verifies the result before serving it.
  fn install_document(
    &mut self,
    archive_path: &Path,
    dest: &Path,
    json_name: String,
    expected_sha256: &str,
  ) -> Result<PathBuf> {
    archive::extract_zip_flattened(archive_path, dest)?;
    let json_path = dest.join(&json_name);
    if !json_path.is_file() {
      return Err(FeedError::MissingArchiveFile { name: json_name });
    }

    let actual = checksum::sha256_hex_file(&json_path)?;
    if !checksum::matches(expected_sha256, &actual) {
      // Left on disk for inspection, but never served.
      return Err(FeedError::ChecksumMismatch {
        path: json_path,
        expected: expected_sha256.to_string(),
        actual,
      });
    }

    // Fresh content: always reparse, even if a summary was set before.
    self.summary = Some(parse_summary(&read_document(&json_path)?)?);
    self.json_file = Some(json_path.clone());
    tracing::info!(feed = %self.descriptor.name, path = %json_path.display(), "feed document synchronized");
    Ok(json_path)
  }

  /// Scans for a single identifier. A well-formed identifier with no matching
  /// record is `Ok(None)`; a malformed one is an error.
  pub fn lookup(&self, identifier: &str) -> Result<Option<Value>> {
    let wanted = normalize_identifier(identifier)?;
    let doc = self.document()?;

    for item in items(&doc)? {
      if item_id(item)? == wanted {
        return Ok(Some(item.clone()));
      }
    }
    Ok(None)
  }

  /// Batched scan: one forward pass over the document, removing each found
  /// identifier from the pending set. Identifiers still pending afterwards
  /// are an error naming all of them. Cost is O(document + query).
  pub fn lookup_many(&self, identifiers: &[&str]) -> Result<Vec<Value>> {
    if identifiers.is_empty() {
      return Err(FeedError::EmptyQuery);
    }

    let mut pending = HashSet::new();
    for id in identifiers {
      pending.insert(normalize_identifier(id)?);
    }

    let doc = self.document()?;
    let mut found = Vec::new();
    for item in items(&doc)? {
      if pending.is_empty() {
        break;
      }
      if pending.remove(item_id(item)?) {
        found.push(item.clone());
      }
    }

    if !pending.is_empty() {
      let mut missing: Vec<String> = pending.into_iter().collect();
      missing.sort();
      return Err(FeedError::UnknownIdentifiers {
        identifiers: missing,
      });
    }
    Ok(found)
  }

  /// Every identifier in the document, in document order.
  pub fn available_identifiers(&self) -> Result<Vec<String>> {
    let doc = self.document()?;
    items(&doc)?
      .iter()
      .map(|item| item_id(item).map(str::to_string))
      .collect()
  }

  /// Applies a freshly discovered descriptor. A differing `updated` marker
  /// overwrites the descriptor and re-pulls exactly what was previously
  /// hydrated, so an unhydrated handle stays cheap to update. Returns whether
  /// anything changed.
  pub fn apply_update(&mut self, fresh: &FeedDescriptor) -> Result<bool> {
    if fresh.updated == self.descriptor.updated {
      return Ok(false);
    }

    self.descriptor = fresh.clone();
    tracing::info!(feed = %self.descriptor.name, updated = %self.descriptor.updated, "feed descriptor updated");

    let json_dest = self
      .json_file
      .as_ref()
      .and_then(|p| p.parent().map(Path::to_path_buf));
    if let Some(dest) = json_dest {
      // json_pull refreshes the metadata record as part of the pull.
      self.json_pull(&dest)?;
    } else if self.meta.is_some() {
      self.meta_pull()?;
    }
    Ok(true)
  }

  fn document(&self) -> Result<Value> {
    let path = self.json_file.as_ref().ok_or_else(|| FeedError::NotPulled {
      name: self.descriptor.name.clone(),
    })?;
    read_document(path)
  }
}

fn is_current(path: &Path, expected_sha256: &str) -> Result<bool> {
  if !path.is_file() {
    return Ok(false);
  }
  let actual = checksum::sha256_hex_file(path)?;
  Ok(checksum::matches(expected_sha256, &actual))
}

fn json_name_from_zip_url(zip_url: &str) -> Result<String> {
  let name = http::file_name_from_url(zip_url)?;
  Ok(name.strip_suffix(".zip").unwrap_or(&name).to_string())
}

fn read_document(path: &Path) -> Result<Value> {
  let bytes = fs::read(path)?;
  Ok(serde_json::from_slice(&bytes)?)
}

fn items(doc: &Value) -> Result<&Vec<Value>> {
  doc
    .get("CVE_Items")
    .and_then(Value::as_array)
    .ok_or(FeedError::MissingJsonField { path: "CVE_Items" })
}

fn item_id(item: &Value) -> Result<&str> {
  item
    .pointer("/cve/CVE_data_meta/ID")
    .and_then(Value::as_str)
    .ok_or(FeedError::MissingJsonField {
      path: "CVE_Items[].cve.CVE_data_meta.ID",
    })
}

fn parse_summary(doc: &Value) -> Result<FeedSummary> {
  let data_type = string_field(doc, "CVE_data_type")?.to_string();
  let data_format = string_field(doc, "CVE_data_format")?.to_string();

  let version_raw = string_field(doc, "CVE_data_version")?;
  let data_version: f64 =
    version_raw
      .parse()
      .map_err(|_| FeedError::MalformedJsonField {
        path: "CVE_data_version",
        reason: format!("{version_raw:?} is not a decimal number"),
      })?;

  let count_raw = string_field(doc, "CVE_data_numberOfCVEs")?;
  let cve_count: u64 = count_raw.parse().map_err(|_| FeedError::MalformedJsonField {
    path: "CVE_data_numberOfCVEs",
    reason: format!("{count_raw:?} is not an integer"),
  })?;

  let ts_raw = string_field(doc, "CVE_data_timestamp")?;
  let timestamp = NaiveDateTime::parse_from_str(ts_raw, TIMESTAMP_FORMAT)
    .map_err(|e| FeedError::MalformedJsonField {
      path: "CVE_data_timestamp",
      reason: format!("{ts_raw:?}: {e}"),
    })?
    .date();

  Ok(FeedSummary {
    data_type,
    data_format,
    data_version,
    cve_count,
    timestamp,
  })
}

fn string_field<'a>(doc: &'a Value, key: &'static str) -> Result<&'a str> {
  doc
    .get(key)
    .and_then(Value::as_str)
    .ok_or(FeedError::MissingJsonField { path: key })
}
