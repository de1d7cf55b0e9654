//! Runtime server configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use songvote_core::password::Hasher;

/// Deserialised from `config.toml` layered under `SONGVOTE_*` environment
/// variables. Every field has a default, so an empty source is valid.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  pub database_path:         PathBuf,
  pub session_lifetime_secs: u64,
  pub session_sweep_secs:    u64,
  /// argon2 memory cost in KiB.
  pub argon2_m_cost:         u32,
  pub argon2_t_cost:         u32,
  pub argon2_p_cost:         u32,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                  "0.0.0.0".to_string(),
      port:                  5050,
      database_path:         PathBuf::from("db/songvote.db"),
      session_lifetime_secs: 86_400,
      session_sweep_secs:    300,
      argon2_m_cost:         19_456,
      argon2_t_cost:         2,
      argon2_p_cost:         1,
    }
  }
}

impl ServerConfig {
  /// Read the optional TOML file at `path`, then apply `SONGVOTE_*`
  /// environment overrides.
  pub fn load(path: &Path) -> Result<Self, ::config::ConfigError> {
    ::config::Config::builder()
      .add_source(::config::File::from(path).required(false))
      .add_source(::config::Environment::with_prefix("SONGVOTE"))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// Password hasher with the configured argon2 costs. Fails on costs argon2
  /// rejects.
  pub fn hasher(&self) -> songvote_core::Result<Hasher> {
    Hasher::with_params(self.argon2_m_cost, self.argon2_t_cost, self.argon2_p_cost)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/songvote.toml")).unwrap();
    assert_eq!(cfg.port, 5050);
    assert_eq!(cfg.database_path, PathBuf::from("db/songvote.db"));
    assert_eq!(cfg.session_sweep_secs, 300);
  }

  #[test]
  fn file_overrides_some_fields() {
    let path = std::env::temp_dir().join(format!("songvote-config-{}.toml", std::process::id()));
    std::fs::write(&path, "port = 8080\ndatabase_path = \"/tmp/x.db\"\n").unwrap();

    let cfg = ServerConfig::load(&path).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.database_path, PathBuf::from("/tmp/x.db"));
    assert_eq!(cfg.host, "0.0.0.0");
    assert_eq!(cfg.address(), "0.0.0.0:8080");

    let _ = std::fs::remove_file(&path);
  }

  #[test]
  fn argon2_costs_come_from_the_file() {
    let path = std::env::temp_dir().join(format!("songvote-argon2-{}.toml", std::process::id()));
    std::fs::write(&path, "argon2_m_cost = 8\nargon2_t_cost = 1\n").unwrap();

    let cfg = ServerConfig::load(&path).unwrap();
    assert_eq!((cfg.argon2_m_cost, cfg.argon2_t_cost, cfg.argon2_p_cost), (8, 1, 1));
    let hasher = cfg.hasher().unwrap();
    let phc = hasher.hash("secret").unwrap();
    assert!(phc.contains("m=8,t=1,p=1"), "got {phc}");
    assert!(hasher.verify("secret", &phc));

    let _ = std::fs::remove_file(&path);
  }

  #[test]
  fn default_argon2_costs_build_a_hasher() {
    assert!(ServerConfig::default().hasher().is_ok());
  }

  #[test]
  fn rejected_argon2_costs_are_an_error() {
    let cfg = ServerConfig { argon2_t_cost: 0, ..ServerConfig::default() };
    assert!(cfg.hasher().is_err());
  }

  #[test]
  fn tilde_expands_only_as_prefix() {
    let plain = Path::new("db/songvote.db");
    assert_eq!(expand_tilde(plain), plain);
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    }
  }
}
