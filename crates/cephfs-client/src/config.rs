//! Client configuration.
//!
//! Everything here is consumed by the session layer itself. The contents of
//! the native `ceph.conf` are opaque to it: only the file's path and a set
//! of `key = value` overrides are passed through to the library.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors raised while loading a [`ClientConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How `set_extended_attribute` chooses its write flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XattrWriteMode {
    /// Probe for the attribute first, then write create-only if absent or
    /// replace-only if present.
    #[default]
    Probe,
    /// Write with no flag; the library creates or replaces.
    Upsert,
}

/// Buffer negotiation limits for extended attribute I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XattrConfig {
    /// First buffer size tried for a read, in bytes.
    pub initial_buffer: usize,

    /// Largest attribute value that will be read, in bytes.
    pub max_value_size: usize,

    /// Largest attribute name list that will be read, in bytes.
    pub max_list_size: usize,

    pub write_mode: XattrWriteMode,
}

impl Default for XattrConfig {
    fn default() -> Self {
        Self {
            initial_buffer: 256,
            max_value_size: 64 * 1024,
            max_list_size: 64 * 1024,
            write_mode: XattrWriteMode::Probe,
        }
    }
}

/// Configuration for one mount session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Client id handed to `ceph_create`; `None` uses the library default.
    pub client_id: Option<String>,

    /// Alternate `ceph.conf`; `None` searches the library's default locations.
    pub conf_file: Option<PathBuf>,

    /// Subtree to mount; `None` mounts the filesystem root.
    pub mount_root: Option<String>,

    /// Options applied with `ceph_conf_set` after the config file is read.
    pub conf_options: BTreeMap<String, String>,

    pub xattr: XattrConfig,
}

impl ClientConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigLoadError> {
        Self::from_toml_value(toml::Value::Table(toml::from_str(content)?))
    }

    /// Deserialize and validate an already-parsed value, such as a
    /// `[client]` table embedded in a larger file.
    pub fn from_toml_value(value: toml::Value) -> Result<Self, ConfigLoadError> {
        let config: ClientConfig = value.try_into()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.xattr.initial_buffer == 0 {
            return Err(ConfigLoadError::Invalid(
                "xattr.initial_buffer must be greater than 0".into(),
            ));
        }
        if self.xattr.max_value_size < self.xattr.initial_buffer {
            return Err(ConfigLoadError::Invalid(format!(
                "xattr.max_value_size ({}) is smaller than xattr.initial_buffer ({})",
                self.xattr.max_value_size, self.xattr.initial_buffer
            )));
        }
        if self.xattr.max_list_size == 0 {
            return Err(ConfigLoadError::Invalid(
                "xattr.max_list_size must be greater than 0".into(),
            ));
        }
        if let Some(root) = &self.mount_root {
            if !root.starts_with('/') {
                return Err(ConfigLoadError::Invalid(format!(
                    "mount_root must be absolute, got {:?}",
                    root
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_client_config() {
        let cfg = ClientConfig::default();
        assert!(cfg.client_id.is_none());
        assert!(cfg.conf_file.is_none());
        assert!(cfg.conf_options.is_empty());
        assert_eq!(cfg.xattr.initial_buffer, 256);
        assert_eq!(cfg.xattr.max_value_size, 65536);
        assert_eq!(cfg.xattr.write_mode, XattrWriteMode::Probe);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let cfg = ClientConfig::from_toml_str(
            r#"
            client_id = "admin"
            conf_file = "/etc/ceph/alt.conf"
            mount_root = "/volumes/v1"

            [conf_options]
            client_mount_timeout = "30"

            [xattr]
            initial_buffer = 64
            write_mode = "upsert"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.client_id.as_deref(), Some("admin"));
        assert_eq!(cfg.conf_file, Some(PathBuf::from("/etc/ceph/alt.conf")));
        assert_eq!(cfg.mount_root.as_deref(), Some("/volumes/v1"));
        assert_eq!(cfg.conf_options.get("client_mount_timeout").map(String::as_str), Some("30"));
        assert_eq!(cfg.xattr.initial_buffer, 64);
        assert_eq!(cfg.xattr.max_value_size, 65536);
        assert_eq!(cfg.xattr.write_mode, XattrWriteMode::Upsert);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(ClientConfig::from_toml_str("").unwrap(), ClientConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_buffers() {
        let mut cfg = ClientConfig::default();
        cfg.xattr.initial_buffer = 0;
        assert!(matches!(cfg.validate(), Err(ConfigLoadError::Invalid(_))));

        let mut cfg = ClientConfig::default();
        cfg.xattr.max_value_size = 16;
        assert!(matches!(cfg.validate(), Err(ConfigLoadError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_relative_root() {
        let err = ClientConfig::from_toml_str(r#"mount_root = "volumes""#).unwrap_err();
        assert!(err.to_string().contains("mount_root"));
    }

    #[test]
    fn test_parse_error() {
        let err = ClientConfig::from_toml_str("client_id = [").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse(_)));
    }

    #[test]
    fn test_embedded_section_is_validated() {
        let mut doc: toml::Table = toml::from_str(
            r#"
            [client]
            mount_root = "relative"
            "#,
        )
        .unwrap();
        let section = doc.remove("client").unwrap();
        assert!(matches!(
            ClientConfig::from_toml_value(section),
            Err(ConfigLoadError::Invalid(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_value(toml::Value::Integer(3)),
            Err(ConfigLoadError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ClientConfig::load("/nonexistent/cephfs-client.toml").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Io(_)));
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let mut cfg = ClientConfig::default();
        cfg.client_id = Some("svc".into());
        cfg.conf_options.insert("debug_client".into(), "0".into());
        let text = toml::to_string(&cfg).unwrap();
        assert_eq!(ClientConfig::from_toml_str(&text).unwrap(), cfg);
    }
}
