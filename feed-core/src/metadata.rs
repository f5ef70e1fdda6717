use crate::error::{FeedError, Result};
use crate::http::HttpClient;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn decimal_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"^[0-9]+$").unwrap())
}

fn sha256_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"^[0-9A-Fa-f]{64}$").unwrap())
}

/// The small descriptor published alongside each feed archive. Used to decide
/// staleness without downloading the archive itself.
///
/// Immutable once parsed; a fresh fetch builds a fresh record. The
/// "URL known but not yet parsed" state lives on the feed handle as
/// `Option<MetadataRecord>`, so no partially parsed record is representable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
  pub last_modified: String,
  pub size: u64,
  pub zip_size: u64,
  pub gz_size: u64,
  /// Stored exactly as published (NVD publishes uppercase hex).
  pub sha256: String,
}

impl MetadataRecord {
  /// Fetches the metadata resource and parses it.
  pub fn fetch(client: &HttpClient, url: &str) -> Result<Self> {
    let text = client.get_text(url)?;
    let record = Self::parse_text(&text)?;
    tracing::debug!(url, sha256 = %record.sha256, "feed metadata pulled");
    Ok(record)
  }

  /// Parses whitespace-separated `key:value` tokens. Only the first colon
  /// splits, so timestamp values keep their embedded colons.
  pub fn parse_text(text: &str) -> Result<Self> {
    let mut fields: HashMap<&str, &str> = HashMap::new();
    for token in text.split_whitespace() {
      if let Some((key, value)) = token.split_once(':') {
        fields.insert(key, value);
      }
    }

    let last_modified = require(&fields, "lastModifiedDate")?;
    if last_modified.is_empty() {
      return Err(FeedError::InvalidMetadata {
        field: "lastModifiedDate",
        reason: "value is empty".to_string(),
      });
    }

    let size = require_decimal(&fields, "size")?;
    let zip_size = require_decimal(&fields, "zipSize")?;
    let gz_size = require_decimal(&fields, "gzSize")?;

    let sha256 = require(&fields, "sha256")?;
    if !sha256_re().is_match(sha256) {
      return Err(FeedError::InvalidMetadata {
        field: "sha256",
        reason: format!("{sha256:?} is not 64 hex characters"),
      });
    }

    Ok(Self {
      last_modified: last_modified.to_string(),
      size,
      zip_size,
      gz_size,
      sha256: sha256.to_string(),
    })
  }
}

fn require<'a>(fields: &HashMap<&str, &'a str>, key: &'static str) -> Result<&'a str> {
  fields.get(key).copied().ok_or(FeedError::InvalidMetadata {
    field: key,
    reason: "field is missing".to_string(),
  })
}

fn require_decimal(fields: &HashMap<&str, &str>, key: &'static str) -> Result<u64> {
  let raw = require(fields, key)?;
  if !decimal_re().is_match(raw) {
    return Err(FeedError::InvalidMetadata {
      field: key,
      reason: format!("{raw:?} is not a decimal integer"),
    });
  }
  raw.parse().map_err(|_| FeedError::InvalidMetadata {
    field: key,
    reason: format!("{raw:?} does not fit in u64"),
  })
}
