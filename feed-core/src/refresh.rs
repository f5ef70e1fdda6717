use crate::catalog::Catalog;
use crate::error::Result;
use crate::feed::FeedHandle;

/// Re-discovers the catalog and syncs caller-retained handles against it.
///
/// `Catalog::discover()` replaces the catalog's own handles; handles the
/// caller kept from an earlier discovery keep their identity and hydrated
/// state, and are updated in place here.
pub struct RefreshCoordinator<'a> {
  catalog: &'a mut Catalog,
}

impl<'a> RefreshCoordinator<'a> {
  pub fn new(catalog: &'a mut Catalog) -> Self {
    Self { catalog }
  }

  /// Runs one discovery pass, then applies the fresh descriptor to each
  /// supplied handle. Returns how many handles actually changed.
  pub fn refresh(&mut self, handles: &mut [FeedHandle]) -> Result<usize> {
    self.catalog.discover()?;

    let mut changed = 0;
    for handle in handles.iter_mut() {
      if self.refresh_against_catalog(handle)? {
        changed += 1;
      }
    }

    tracing::info!(total = handles.len(), changed, "feed refresh complete");
    Ok(changed)
  }

  /// Single-handle variant of `refresh`.
  pub fn refresh_one(&mut self, handle: &mut FeedHandle) -> Result<bool> {
    self.catalog.discover()?;
    self.refresh_against_catalog(handle)
  }

  fn refresh_against_catalog(&self, handle: &mut FeedHandle) -> Result<bool> {
    let fresh = self.catalog.get(handle.name())?.descriptor().clone();
    handle.apply_update(&fresh)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::StaticCatalogSource;
  use crate::error::FeedError;
  use crate::feed::FeedDescriptor;
  use crate::http::HttpClient;

  fn descriptor(name: &str, updated: &str) -> FeedDescriptor {
    FeedDescriptor {
      name: name.to_string(),
      updated: updated.to_string(),
      meta_url: format!("https://feeds.test/{name}.meta"),
      gz_url: format!("https://feeds.test/{name}.json.gz"),
      zip_url: format!("https://feeds.test/{name}.json.zip"),
    }
  }

  fn catalog_over(descriptors: Vec<FeedDescriptor>) -> Catalog {
    let client = HttpClient::new(1, "test").unwrap();
    Catalog::new(Box::new(StaticCatalogSource::new(descriptors)), client)
  }

  #[test]
  fn changed_marker_updates_retained_handle() {
    let mut old_catalog = catalog_over(vec![descriptor("CVE-2010", "v1")]);
    old_catalog.discover().unwrap();
    let mut retained = vec![old_catalog.get("CVE-2010").unwrap().clone()];

    // The vendor page now reports a newer marker.
    let mut new_catalog = catalog_over(vec![descriptor("CVE-2010", "v2")]);
    let changed = RefreshCoordinator::new(&mut new_catalog)
      .refresh(&mut retained)
      .unwrap();

    assert_eq!(changed, 1);
    assert_eq!(retained[0].descriptor().updated, "v2");
    // Never hydrated, so the refresh stayed offline.
    assert!(retained[0].meta().is_none());
    assert!(retained[0].json_file().is_none());
  }

  #[test]
  fn unchanged_marker_counts_as_no_change() {
    let mut catalog = catalog_over(vec![descriptor("CVE-2010", "v1")]);
    catalog.discover().unwrap();
    let mut retained = vec![catalog.get("CVE-2010").unwrap().clone()];

    let changed = RefreshCoordinator::new(&mut catalog)
      .refresh(&mut retained)
      .unwrap();
    assert_eq!(changed, 0);
  }

  #[test]
  fn vanished_feed_is_an_error() {
    let mut old_catalog = catalog_over(vec![descriptor("CVE-2010", "v1")]);
    old_catalog.discover().unwrap();
    let mut retained = old_catalog.get("CVE-2010").unwrap().clone();

    let mut new_catalog = catalog_over(vec![descriptor("CVE-2011", "v1")]);
    let err = RefreshCoordinator::new(&mut new_catalog)
      .refresh_one(&mut retained)
      .unwrap_err();
    assert!(matches!(err, FeedError::UnknownFeed { .. }));
  }
}
