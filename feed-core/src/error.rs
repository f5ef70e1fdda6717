use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by feed synchronization and lookup.
///
/// Integrity failures (`ChecksumMismatch`) are deliberately distinct from
/// transport failures (`Http`, `Transport`): a bad checksum means the content
/// on disk must not be served, not that the fetch should be repeated.
#[derive(Debug, Error)]
pub enum FeedError {
  #[error("malformed vulnerability identifier: {value:?} (expected CVE-YYYY-NNNN)")]
  InvalidIdentifier { value: String },

  #[error("invalid feed metadata field {field}: {reason}")]
  InvalidMetadata { field: &'static str, reason: String },

  #[error("empty query: at least one identifier is required")]
  EmptyQuery,

  #[error("no feeds known; call discover() first")]
  NotDiscovered,

  #[error("unknown feed: {name:?}")]
  UnknownFeed { name: String },

  #[error("catalog source reported duplicate feed name: {name:?}")]
  DuplicateFeed { name: String },

  #[error("unknown feeds: {}", .names.join(", "))]
  UnknownFeeds { names: Vec<String> },

  #[error("unknown identifiers: {}", .identifiers.join(", "))]
  UnknownIdentifiers { identifiers: Vec<String> },

  #[error("feed {name:?} has no local JSON document; call json_pull() first")]
  NotPulled { name: String },

  #[error("checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
  ChecksumMismatch {
    path: PathBuf,
    expected: String,
    actual: String,
  },

  #[error("HTTP status {status} for {url}")]
  Http { status: u16, url: String },

  #[error("feed document is missing field {path}")]
  MissingJsonField { path: &'static str },

  #[error("feed document field {path} is malformed: {reason}")]
  MalformedJsonField { path: &'static str, reason: String },

  #[error("archive entry has no usable file name: {entry:?}")]
  BadArchiveEntry { entry: String },

  #[error("archive did not contain expected file {name:?}")]
  MissingArchiveFile { name: String },

  #[error("URL has no trailing path segment: {url}")]
  BadUrl { url: String },

  #[error("destination has no usable file name: {}", .path.display())]
  BadDestination { path: PathBuf },

  #[error(transparent)]
  Transport(#[from] reqwest::Error),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[error(transparent)]
  Archive(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, FeedError>;
