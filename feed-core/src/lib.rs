//! Synchronization and integrity verification for NVD vulnerability data
//! feeds: discover the available feeds, decide whether a local copy is stale,
//! download and verify archives against their published checksums, and
//! resolve CVE identifiers to the right feed and record.
//!
//! The catalog source (the step that turns the vendor listing into feed
//! descriptors) is a trait the caller implements; everything downstream of a
//! descriptor lives here.

pub mod archive;
pub mod catalog;
pub mod checksum;
pub mod config;
pub mod error;
pub mod feed;
pub mod http;
pub mod logging;
pub mod metadata;
pub mod refresh;
pub mod resolver;

pub use catalog::{Catalog, CatalogSource, StaticCatalogSource};
pub use config::Config;
pub use error::{FeedError, Result};
pub use feed::{ArchiveKind, FeedDescriptor, FeedHandle, FeedSummary};
pub use http::HttpClient;
pub use metadata::MetadataRecord;
pub use refresh::RefreshCoordinator;
pub use resolver::IdentifierResolver;
