//! Configuration schema for audrey
//!
//! Config lives at `.config/audrey.toml` relative to the repository root and
//! is entirely optional: the defaults cover the built-in identifier families.
//!
//! ```toml
//! [grammar.prefixes]
//! FT = "Feature"
//! US = "User Story"
//!
//! [audit]
//! min_source_lines = 40
//! ```

use audrey_core::GrammarConfig;
use eyre::{Result, WrapErr};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default config location, relative to the repository root.
pub const DEFAULT_CONFIG_PATH: &str = ".config/audrey.toml";

/// Root configuration for audrey.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub grammar: GrammarSection,
    pub audit: AuditSection,
}

/// Identifier grammar overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GrammarSection {
    /// Prefix -> human-readable type name. Empty means the built-in registry.
    pub prefixes: BTreeMap<String, String>,
}

/// Audit tuning.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditSection {
    /// Minimum line count before an untraced source file is flagged.
    pub min_source_lines: Option<usize>,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicitly given path must exist; the default path is optional and
    /// silently falls back to [`Config::default`] when absent.
    pub fn load(explicit: Option<&Path>, repo_root: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    eyre::bail!("config file not found at {}", path.display());
                }
                path.to_path_buf()
            }
            None => {
                let default = repo_root.join(DEFAULT_CONFIG_PATH);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        Self::load_from(&path)
    }

    fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse config file {}", path.display()))
    }

    /// The grammar registry this config describes.
    pub fn grammar_config(&self) -> GrammarConfig {
        if self.grammar.prefixes.is_empty() {
            return GrammarConfig::default();
        }
        let mut grammar = GrammarConfig::new();
        for (prefix, type_name) in &self.grammar.prefixes {
            grammar = grammar.register(prefix, type_name);
        }
        grammar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audrey_core::IdGrammar;

    #[test]
    fn missing_default_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load(None, dir.path()).expect("load");
        assert!(config.grammar.prefixes.is_empty());
        assert_eq!(config.grammar_config().len(), 8);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        assert!(Config::load(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn custom_prefixes_replace_the_builtin_registry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audrey.toml");
        std::fs::write(
            &path,
            "[grammar.prefixes]\nREQ = \"Requirement\"\nTC = \"Test Case\"\n",
        )
        .expect("write");

        let config = Config::load(Some(&path), dir.path()).expect("load");
        let grammar = IdGrammar::new(&config.grammar_config()).expect("compile");
        assert!(grammar.is_identifier("REQ-001"));
        assert!(grammar.is_identifier("TC-17"));
        assert!(!grammar.is_identifier("FT-001"));
    }

    #[test]
    fn default_config_path_is_picked_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(DEFAULT_CONFIG_PATH);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "[audit]\nmin_source_lines = 5\n").expect("write");

        let config = Config::load(None, dir.path()).expect("load");
        assert_eq!(config.audit.min_source_lines, Some(5));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audrey.toml");
        std::fs::write(&path, "[audit]\nmin_src_lines = 5\n").expect("write");
        assert!(Config::load(Some(&path), dir.path()).is_err());
    }
}
