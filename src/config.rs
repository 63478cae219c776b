//! Scan configuration, read once from the environment at startup.
//!
//! `SYSGIT_PATH` is a colon-separated list of directories to scan for
//! repositories; it must be set. `SYSGIT_IGNORE` is an optional
//! colon-separated list of path substrings to drop from the discovered set.
//! Both accept `~` shorthand in their entries.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Root directories to scan, in configured order.
    pub roots: Vec<PathBuf>,
    /// Substrings that exclude a discovered path, already `~`-expanded.
    pub ignores: Vec<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingPath,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingPath => {
                write!(f, "SYSGIT_PATH is not set; set it to a colon-separated list of directories to scan")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Build the configuration from `SYSGIT_PATH` and `SYSGIT_IGNORE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var("SYSGIT_PATH").map_err(|_| ConfigError::MissingPath)?;
        let ignore = std::env::var("SYSGIT_IGNORE").ok();
        Ok(Self::from_parts(&path, ignore.as_deref()))
    }

    /// Build the configuration from raw variable values.
    pub fn from_parts(path: &str, ignore: Option<&str>) -> Self {
        Self {
            roots: split_list(path)
                .map(|entry| PathBuf::from(shellexpand::tilde(entry).into_owned()))
                .collect(),
            ignores: split_list(ignore.unwrap_or(""))
                .map(|entry| shellexpand::tilde(entry).into_owned())
                .collect(),
        }
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(':').filter(|entry| !entry.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_splits_on_colons() {
        let config = Config::from_parts("/srv/code:/opt/work", None);
        assert_eq!(
            config.roots,
            vec![PathBuf::from("/srv/code"), PathBuf::from("/opt/work")]
        );
        assert!(config.ignores.is_empty());
    }

    #[test]
    fn test_from_parts_skips_empty_entries() {
        let config = Config::from_parts("/srv/code::", Some(":"));
        assert_eq!(config.roots, vec![PathBuf::from("/srv/code")]);
        assert!(config.ignores.is_empty());
    }

    #[test]
    fn test_from_parts_expands_tilde() {
        let config = Config::from_parts("~/code", Some("~/code/vendor"));
        let home = home::home_dir().expect("home dir in test environment");
        assert_eq!(config.roots, vec![home.join("code")]);
        assert_eq!(
            config.ignores,
            vec![home.join("code/vendor").display().to_string()]
        );
    }

    #[test]
    fn test_missing_path_error_message_names_the_variable() {
        let message = ConfigError::MissingPath.to_string();
        assert!(message.contains("SYSGIT_PATH"));
    }
}
