use crate::error::{FeedError, Result};
use crate::feed::{FeedDescriptor, FeedHandle};
use crate::http::HttpClient;
use std::collections::HashSet;

/// The external supplier that turns the vendor's feed listing into
/// descriptors. The HTML-scraping implementation lives outside this crate;
/// the catalog only consumes the result.
pub trait CatalogSource {
  fn feeds(&self) -> Result<Vec<FeedDescriptor>>;
}

/// A source over a fixed descriptor list. Useful at composition roots that
/// already know their feeds, and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogSource {
  descriptors: Vec<FeedDescriptor>,
}

impl StaticCatalogSource {
  pub fn new(descriptors: Vec<FeedDescriptor>) -> Self {
    Self { descriptors }
  }
}

impl CatalogSource for StaticCatalogSource {
  fn feeds(&self) -> Result<Vec<FeedDescriptor>> {
    Ok(self.descriptors.clone())
  }
}

/// Ordered collection of feed handles keyed by unique name. Empty until the
/// first successful `discover()`.
pub struct Catalog {
  source: Box<dyn CatalogSource>,
  client: HttpClient,
  feeds: Vec<FeedHandle>,
  discovered: bool,
}

impl Catalog {
  pub fn new(source: Box<dyn CatalogSource>, client: HttpClient) -> Self {
    Self {
      source,
      client,
      feeds: Vec::new(),
      discovered: false,
    }
  }

  /// Replaces the whole collection with freshly constructed handles and
  /// returns how many feeds were discovered. Previously handed-out handles
  /// are not touched; `RefreshCoordinator` exists to update those.
  pub fn discover(&mut self) -> Result<usize> {
    let descriptors = self.source.feeds()?;

    let mut seen = HashSet::new();
    for descriptor in &descriptors {
      if !seen.insert(descriptor.name.clone()) {
        return Err(FeedError::DuplicateFeed {
          name: descriptor.name.clone(),
        });
      }
    }

    self.feeds = descriptors
      .into_iter()
      .map(|d| FeedHandle::new(d, self.client.clone()))
      .collect();
    self.discovered = true;

    tracing::info!(count = self.feeds.len(), "feed catalog discovered");
    Ok(self.feeds.len())
  }

  /// All discovered feed names, in discovery order.
  pub fn names(&self) -> Result<Vec<String>> {
    Ok(
      self
        .handles()?
        .iter()
        .map(|f| f.name().to_string())
        .collect(),
    )
  }

  pub fn handles(&self) -> Result<&[FeedHandle]> {
    self.ensure_discovered()?;
    Ok(&self.feeds)
  }

  pub fn handles_mut(&mut self) -> Result<&mut [FeedHandle]> {
    self.ensure_discovered()?;
    Ok(&mut self.feeds)
  }

  pub fn get(&self, name: &str) -> Result<&FeedHandle> {
    self.ensure_discovered()?;
    self
      .feeds
      .iter()
      .find(|f| f.name() == name)
      .ok_or_else(|| FeedError::UnknownFeed {
        name: name.to_string(),
      })
  }

  pub fn get_mut(&mut self, name: &str) -> Result<&mut FeedHandle> {
    self.ensure_discovered()?;
    self
      .feeds
      .iter_mut()
      .find(|f| f.name() == name)
      .ok_or_else(|| FeedError::UnknownFeed {
        name: name.to_string(),
      })
  }

  /// Bulk fan-out: all requested handles, raising when any name is absent
  /// (the error names every missing feed).
  pub fn get_many(&self, names: &[&str]) -> Result<Vec<&FeedHandle>> {
    self.ensure_discovered()?;

    let mut found = Vec::with_capacity(names.len());
    let mut missing = Vec::new();
    for name in names {
      match self.feeds.iter().find(|f| f.name() == *name) {
        Some(handle) => found.push(handle),
        None => missing.push(name.to_string()),
      }
    }

    if !missing.is_empty() {
      return Err(FeedError::UnknownFeeds { names: missing });
    }
    Ok(found)
  }

  fn ensure_discovered(&self) -> Result<()> {
    if !self.discovered {
      return Err(FeedError::NotDiscovered);
    }
    Ok(())
  }
}
