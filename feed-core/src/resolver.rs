use crate::catalog::Catalog;
use crate::error::{FeedError, Result};
use crate::feed::{identifier_year, normalize_identifier};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// Records for 1999-2001 are archived inside the earliest yearly feed rather
/// than one feed per year.
pub const LEGACY_CUTOFF_YEAR: i32 = 2002;

/// Maps vulnerability identifiers to the yearly feed that carries them and
/// runs lookups there, pulling each touched feed at most once per call.
pub struct IdentifierResolver {
  storage_dir: PathBuf,
}

impl IdentifierResolver {
  /// `storage_dir` is where lazily triggered pulls materialize documents;
  /// thread it from `Config::storage_dir` at the composition root.
  pub fn new(storage_dir: PathBuf) -> Self {
    Self { storage_dir }
  }

  /// Resolves an identifier to a discovered feed name by its embedded year.
  /// Legacy years fold into the earliest archived feed; rolling feeds never
  /// participate.
  pub fn feed_name_for(&self, catalog: &Catalog, identifier: &str) -> Result<String> {
    let id = normalize_identifier(identifier)?;
    let year = identifier_year(&id)?;
    let effective = year.max(LEGACY_CUTOFF_YEAR);
    let year_str = effective.to_string();

    for name in catalog.names()? {
      if is_rolling(&name) {
        continue;
      }
      if name.contains(&year_str) {
        return Ok(name);
      }
    }
    Err(FeedError::UnknownFeed {
      name: format!("CVE-{effective}"),
    })
  }

  /// Validates, resolves the feed, pulls it if needed and scans for the one
  /// record. Absent-but-well-formed is `Ok(None)`.
  pub fn resolve_one(&self, catalog: &mut Catalog, identifier: &str) -> Result<Option<Value>> {
    let feed_name = self.feed_name_for(catalog, identifier)?;
    let handle = catalog.get_mut(&feed_name)?;
    handle.json_pull(&self.storage_dir)?;
    handle.lookup(identifier)
  }

  /// Groups identifiers by resolved feed, pulls each distinct feed once and
  /// batches the lookups, so a feed's document is never parsed once per
  /// identifier. Order of the combined results is not guaranteed.
  pub fn resolve_many(&self, catalog: &mut Catalog, identifiers: &[&str]) -> Result<Vec<Value>> {
    if identifiers.is_empty() {
      return Err(FeedError::EmptyQuery);
    }

    let mut groups: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for identifier in identifiers {
      let feed_name = self.feed_name_for(catalog, identifier)?;
      groups.entry(feed_name).or_default().push(identifier);
    }

    let mut combined = Vec::with_capacity(identifiers.len());
    for (feed_name, ids) in groups {
      let handle = catalog.get_mut(&feed_name)?;
      handle.json_pull(&self.storage_dir)?;
      combined.extend(handle.lookup_many(&ids)?);
    }
    Ok(combined)
  }

  /// Union of every identifier across all non-rolling feeds, deduplicated
  /// (the rolling feeds only repeat records the yearly feeds already carry).
  pub fn all_identifiers(&self, catalog: &mut Catalog) -> Result<Vec<String>> {
    let names: Vec<String> = catalog
      .names()?
      .into_iter()
      .filter(|n| !is_rolling(n))
      .collect();

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for name in names {
      let handle = catalog.get_mut(&name)?;
      handle.json_pull(&self.storage_dir)?;
      for id in handle.available_identifiers()? {
        if seen.insert(id.clone()) {
          out.push(id);
        }
      }
    }
    Ok(out)
  }
}

fn is_rolling(name: &str) -> bool {
  let lower = name.to_ascii_lowercase();
  lower.contains("modified") || lower.contains("recent")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::StaticCatalogSource;
  use crate::feed::FeedDescriptor;
  use crate::http::HttpClient;

  fn descriptor(name: &str) -> FeedDescriptor {
    FeedDescriptor {
      name: name.to_string(),
      updated: "10/27/2017 3:17:23 AM -04:00".to_string(),
      meta_url: format!("https://feeds.test/{name}.meta"),
      gz_url: format!("https://feeds.test/{name}.json.gz"),
      zip_url: format!("https://feeds.test/{name}.json.zip"),
    }
  }

  fn discovered_catalog() -> Catalog {
    let names = ["CVE-2002", "CVE-2003", "CVE-2010", "CVE-Modified", "CVE-Recent"];
    let source = StaticCatalogSource::new(names.iter().map(|n| descriptor(n)).collect());
    let client = HttpClient::new(1, "test").unwrap();
    let mut catalog = Catalog::new(Box::new(source), client);
    catalog.discover().unwrap();
    catalog
  }

  fn resolver() -> IdentifierResolver {
    IdentifierResolver::new(std::env::temp_dir().join("nvd-feeds-test"))
  }

  #[test]
  fn year_maps_to_matching_feed() {
    let catalog = discovered_catalog();
    assert_eq!(
      resolver().feed_name_for(&catalog, "CVE-2010-0001").unwrap(),
      "CVE-2010"
    );
  }

  #[test]
  fn legacy_years_fold_into_earliest_feed() {
    let catalog = discovered_catalog();
    let r = resolver();
    for id in ["CVE-1999-0001", "cve-2000-1234", "CVE-2001-0144"] {
      assert_eq!(r.feed_name_for(&catalog, id).unwrap(), "CVE-2002", "{id}");
    }
  }

  #[test]
  fn rolling_feeds_never_resolve() {
    // No yearly feed contains "2020"; the rolling feeds must not be picked
    // as a fallback either.
    let catalog = discovered_catalog();
    assert!(matches!(
      resolver().feed_name_for(&catalog, "CVE-2020-0001"),
      Err(FeedError::UnknownFeed { .. })
    ));
  }

  #[test]
  fn malformed_identifier_fails_before_any_io() {
    let catalog = discovered_catalog();
    assert!(matches!(
      resolver().feed_name_for(&catalog, "CVE-20-1"),
      Err(FeedError::InvalidIdentifier { .. })
    ));
  }

  #[test]
  fn resolution_requires_discovery() {
    let source = StaticCatalogSource::new(vec![descriptor("CVE-2002")]);
    let client = HttpClient::new(1, "test").unwrap();
    let catalog = Catalog::new(Box::new(source), client);

    assert!(matches!(
      resolver().feed_name_for(&catalog, "CVE-2002-0001"),
      Err(FeedError::NotDiscovered)
    ));
  }

  #[test]
  fn empty_batch_is_rejected() {
    let mut catalog = discovered_catalog();
    assert!(matches!(
      resolver().resolve_many(&mut catalog, &[]),
      Err(FeedError::EmptyQuery)
    ));
  }

  #[test]
  fn rolling_feed_names_are_recognized() {
    assert!(is_rolling("CVE-Modified"));
    assert!(is_rolling("CVE-Recent"));
    assert!(is_rolling("cve-modified"));
    assert!(!is_rolling("CVE-2010"));
  }
}
