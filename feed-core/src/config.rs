use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
  /// Directory feed archives and extracted documents are written to when the
  /// caller does not pass an explicit destination.
  #[serde(default = "default_storage_dir")]
  pub storage_dir: PathBuf,

  #[serde(default = "default_timeout_seconds")]
  pub timeout_seconds: u64,

  #[serde(default = "default_user_agent")]
  pub user_agent: String,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      storage_dir: default_storage_dir(),
      timeout_seconds: default_timeout_seconds(),
      user_agent: default_user_agent(),
    }
  }
}

fn default_storage_dir() -> PathBuf {
  std::env::temp_dir().join("nvd-feeds")
}

fn default_timeout_seconds() -> u64 {
  30
}

fn default_user_agent() -> String {
  format!("feed-core/{}", env!("CARGO_PKG_VERSION"))
}

pub fn load_or_create_default(path: &Path) -> anyhow::Result<Config> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("config path has no parent: {}", path.display()))?;
  fs::create_dir_all(parent)?;

  if !path.exists() {
    let cfg = Config::default();
    write_atomic(path, &toml::to_string_pretty(&cfg)?)?;
    return Ok(cfg);
  }

  let raw = fs::read_to_string(path)?;
  let cfg: Config = toml::from_str(&raw)
    .map_err(|e| anyhow::anyhow!("invalid config at {}: {e}", path.display()))?;

  if cfg.timeout_seconds == 0 {
    anyhow::bail!("timeout_seconds must be > 0");
  }

  Ok(cfg)
}

fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("file path has no parent: {}", path.display()))?;
  let tmp = parent.join(format!(
    ".{}.tmp",
    path.file_name().unwrap_or_default().to_string_lossy()
  ));

  fs::write(&tmp, contents)?;
  fs::rename(&tmp, path)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_writes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let cfg = load_or_create_default(&path).unwrap();
    assert!(path.exists());
    assert_eq!(cfg.timeout_seconds, 30);
    assert_eq!(cfg.storage_dir, std::env::temp_dir().join("nvd-feeds"));
  }

  #[test]
  fn partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "timeout_seconds = 5\n").unwrap();

    let cfg = load_or_create_default(&path).unwrap();
    assert_eq!(cfg.timeout_seconds, 5);
    assert!(cfg.user_agent.starts_with("feed-core/"));
  }

  #[test]
  fn zero_timeout_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "timeout_seconds = 0\n").unwrap();

    assert!(load_or_create_default(&path).is_err());
  }
}
