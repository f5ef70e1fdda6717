use crate::error::{FeedError, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::USER_AGENT;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Thin wrapper over a shared blocking client. Cloning is cheap (the inner
/// reqwest client is reference-counted), so every feed handle carries one.
#[derive(Debug, Clone)]
pub struct HttpClient {
  client: Client,
  user_agent: String,
}

impl HttpClient {
  pub fn new(timeout_seconds: u64, user_agent: &str) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(timeout_seconds))
      .build()?;
    Ok(Self {
      client,
      user_agent: user_agent.to_string(),
    })
  }

  /// GET a small text resource (feed metadata files are a few hundred bytes).
  pub fn get_text(&self, url: &str) -> Result<String> {
    let response = self.send(url)?;
    Ok(response.text()?)
  }

  /// GET a resource and stream the body to `dst`. The body is written to a
  /// dotted sibling first and renamed into place, so a failed transfer never
  /// leaves a plausible-looking partial file at `dst`.
  pub fn download_to_file(&self, url: &str, dst: &Path) -> Result<()> {
    let mut response = self.send(url)?;

    if let Some(dir) = dst.parent() {
      fs::create_dir_all(dir)?;
    }
    let tmp = tmp_path(dst)?;
    let mut out = fs::File::create(&tmp)?;
    if let Err(e) = response.copy_to(&mut out) {
      let _ = fs::remove_file(&tmp);
      return Err(e.into());
    }
    fs::rename(&tmp, dst)?;
    Ok(())
  }

  fn send(&self, url: &str) -> Result<Response> {
    let response = self
      .client
      .get(url)
      .header(USER_AGENT, self.user_agent.as_str())
      .send()?;

    let status = response.status();
    if !status.is_success() {
      return Err(FeedError::Http {
        status: status.as_u16(),
        url: url.to_string(),
      });
    }
    Ok(response)
  }
}

fn tmp_path(dst: &Path) -> Result<PathBuf> {
  let name = dst
    .file_name()
    .and_then(|s| s.to_str())
    .ok_or_else(|| FeedError::BadDestination {
      path: dst.to_path_buf(),
    })?;
  Ok(dst.with_file_name(format!(".{name}.tmp")))
}

/// Trailing path segment of a URL, ignoring any query string.
pub fn file_name_from_url(url: &str) -> Result<String> {
  let path = url.split(['?', '#']).next().unwrap_or(url);
  let name = path.rsplit('/').next().unwrap_or("");
  if name.is_empty() {
    return Err(FeedError::BadUrl {
      url: url.to_string(),
    });
  }
  Ok(name.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn trailing_segment_is_extracted() {
    let name =
      file_name_from_url("https://nvd.nist.gov/feeds/json/cve/1.1/nvdcve-1.1-2010.json.zip")
        .unwrap();
    assert_eq!(name, "nvdcve-1.1-2010.json.zip");
  }

  #[test]
  fn query_string_is_ignored() {
    let name = file_name_from_url("https://example.test/a/b.zip?token=x").unwrap();
    assert_eq!(name, "b.zip");
  }

  #[test]
  fn url_without_segment_is_rejected() {
    assert!(file_name_from_url("https://example.test/dir/").is_err());
  }

  #[test]
  fn tmp_path_is_dotted_sibling() {
    let tmp = tmp_path(Path::new("/data/feeds/nvdcve-1.1-2010.json.zip")).unwrap();
    assert_eq!(
      tmp,
      Path::new("/data/feeds/.nvdcve-1.1-2010.json.zip.tmp")
    );
  }

  #[test]
  fn destination_without_file_name_is_rejected() {
    assert!(matches!(
      tmp_path(Path::new("/")),
      Err(FeedError::BadDestination { .. })
    ));
  }
}
