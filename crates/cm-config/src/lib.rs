//! Configuration management for clausemark.
//!
//! Parses `clausemark.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `templates.dir` supports environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "clausemark.toml";

/// Plugin names accepted in `plugins.enabled`.
pub const KNOWN_PLUGINS: &[&str] = &["list", "variable", "computed", "clause"];

/// Deepest clause nesting that can be configured.
pub const MAX_DEPTH_LIMIT: usize = 64;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override template directory.
    pub templates_dir: Option<PathBuf>,
    /// Override template caching.
    pub cache: Option<bool>,
    /// Override clause nesting limit.
    pub max_depth: Option<usize>,
    /// Override unbound placeholder handling.
    pub unbound: Option<UnboundSetting>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Template configuration (paths are relative strings from TOML).
    templates: TemplatesConfigRaw,
    /// Clause resolver configuration.
    pub resolver: ResolverConfig,
    /// Plugin selection.
    pub plugins: PluginsConfig,

    /// Resolved template configuration (set after loading).
    #[serde(skip)]
    pub templates_resolved: TemplatesConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw template configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TemplatesConfigRaw {
    dir: Option<String>,
    cache: Option<bool>,
}

/// Resolved template configuration with absolute paths.
#[derive(Debug, Default)]
pub struct TemplatesConfig {
    /// Directory clause templates are loaded from.
    pub dir: PathBuf,
    /// Whether loaded templates are kept in memory.
    pub cache: bool,
}

/// What to do with placeholders a clause does not bind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnboundSetting {
    /// Replace with an unresolved variable.
    #[default]
    Variable,
    /// Leave the placeholder text.
    Keep,
    /// Drop the placeholder.
    Remove,
}

/// Clause resolver configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Deepest clause nesting that is still resolved.
    pub max_depth: usize,
    /// Unbound placeholder handling.
    pub unbound: UnboundSetting,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            unbound: UnboundSetting::default(),
        }
    }
}

/// Plugin configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Plugins to register, in order.
    pub enabled: Vec<String>,
    /// Serialize computed values as `{{value}}`.
    pub computed_raw_value: bool,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: KNOWN_PLUGINS.iter().map(|&name| name.to_owned()).collect(),
            computed_raw_value: false,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`templates.dir`").
        field: String,
        /// Error message (e.g., "${`CLAUSE_DIR`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `clausemark.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(dir) = &settings.templates_dir {
            self.templates_resolved.dir.clone_from(dir);
        }
        if let Some(cache) = settings.cache {
            self.templates_resolved.cache = cache;
        }
        if let Some(max_depth) = settings.max_depth {
            self.resolver.max_depth = max_depth;
        }
        if let Some(unbound) = settings.unbound {
            self.resolver.unbound = unbound;
        }
    }

    /// Whether a plugin is enabled.
    #[must_use]
    pub fn plugin_enabled(&self, name: &str) -> bool {
        self.plugins.enabled.iter().any(|enabled| enabled == name)
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        Self::discover_from(&std::env::current_dir().ok()?)
    }

    /// Search for config file in `start` and its parents.
    fn discover_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            templates: TemplatesConfigRaw::default(),
            resolver: ResolverConfig::default(),
            plugins: PluginsConfig::default(),
            templates_resolved: TemplatesConfig {
                dir: base.join("templates"),
                cache: true,
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file and after CLI settings
    /// are applied.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_templates()?;
        self.validate_resolver()?;
        self.validate_plugins()?;
        Ok(())
    }

    fn validate_templates(&self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.templates.dir {
            require_non_empty(dir, "templates.dir")?;
        }
        Ok(())
    }

    fn validate_resolver(&self) -> Result<(), ConfigError> {
        let depth = self.resolver.max_depth;
        if depth == 0 {
            return Err(ConfigError::Validation(
                "resolver.max_depth must be greater than 0".to_owned(),
            ));
        }
        if depth > MAX_DEPTH_LIMIT {
            return Err(ConfigError::Validation(format!(
                "resolver.max_depth cannot exceed {MAX_DEPTH_LIMIT}"
            )));
        }
        Ok(())
    }

    fn validate_plugins(&self) -> Result<(), ConfigError> {
        for (index, name) in self.plugins.enabled.iter().enumerate() {
            if !KNOWN_PLUGINS.contains(&name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "plugins.enabled: unknown plugin `{name}` (known: {})",
                    KNOWN_PLUGINS.join(", ")
                )));
            }
            if self.plugins.enabled[..index].contains(name) {
                return Err(ConfigError::Validation(format!(
                    "plugins.enabled: `{name}` listed twice"
                )));
            }
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref dir) = self.templates.dir {
            self.templates.dir = Some(expand::expand_env(dir, "templates.dir")?);
        }
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.templates_resolved = TemplatesConfig {
            dir: config_dir.join(self.templates.dir.as_deref().unwrap_or("templates")),
            cache: self.templates.cache.unwrap_or(true),
        };
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(
            config.templates_resolved.dir,
            PathBuf::from("/test/templates")
        );
        assert!(config.templates_resolved.cache);
        assert_eq!(config.resolver.max_depth, 8);
        assert_eq!(config.resolver.unbound, UnboundSetting::Variable);
        assert_eq!(
            config.plugins.enabled,
            vec!["list", "variable", "computed", "clause"]
        );
        assert!(!config.plugins.computed_raw_value);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.resolver.max_depth, 8);
        assert!(config.plugin_enabled("clause"));
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[templates]
dir = "clauses"
cache = false

[resolver]
max_depth = 4
unbound = "keep"

[plugins]
enabled = ["variable", "clause"]
computed_raw_value = true
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(
            config.templates_resolved.dir,
            PathBuf::from("/project/clauses")
        );
        assert!(!config.templates_resolved.cache);
        assert_eq!(config.resolver.max_depth, 4);
        assert_eq!(config.resolver.unbound, UnboundSetting::Keep);
        assert!(config.plugin_enabled("variable"));
        assert!(!config.plugin_enabled("list"));
        assert!(config.plugins.computed_raw_value);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_unbound_setting_is_parse_error() {
        let result: Result<Config, _> = toml::from_str("[resolver]\nunbound = \"drop\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_max_depth_bounds() {
        for (depth, ok) in [(0, false), (1, true), (64, true), (65, false)] {
            let mut config = Config::default_with_base(Path::new("/test"));
            config.resolver.max_depth = depth;
            assert_eq!(config.validate().is_ok(), ok, "max_depth {depth}");
        }
    }

    #[test]
    fn test_unknown_plugin_is_rejected() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.plugins.enabled.push("footnote".to_owned());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("footnote"));
    }

    #[test]
    fn test_duplicate_plugin_is_rejected() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.plugins.enabled = vec!["list".to_owned(), "list".to_owned()];
        assert!(config.validate().unwrap_err().to_string().contains("twice"));
    }

    #[test]
    fn test_empty_templates_dir_is_rejected() {
        let config: Config = toml::from_str("[templates]\ndir = \"\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[templates]\ndir = \"clauses\"\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.templates_resolved.dir, dir.path().join("clauses"));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/clausemark.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[resolver]\nmax_depth = 100\n").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_expands_env() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            "[templates]\ndir = \"${CM_CONFIG_TEST_DIR:-shared}/clauses\"\n",
        )
        .unwrap();
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("CM_CONFIG_TEST_DIR");
        }

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(
            config.templates_resolved.dir,
            dir.path().join("shared/clauses")
        );
    }

    #[test]
    fn test_discover_from_parent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "").unwrap();
        let nested = dir.path().join("contracts/2026");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            Config::discover_from(&nested),
            Some(dir.path().join(CONFIG_FILENAME))
        );
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            templates_dir: Some(PathBuf::from("/custom/clauses")),
            max_depth: Some(3),
            unbound: Some(UnboundSetting::Remove),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(
            config.templates_resolved.dir,
            PathBuf::from("/custom/clauses")
        );
        assert!(config.templates_resolved.cache); // Unchanged
        assert_eq!(config.resolver.max_depth, 3);
        assert_eq!(config.resolver.unbound, UnboundSetting::Remove);
    }

    #[test]
    fn test_cli_settings_are_validated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "").unwrap();
        let overrides = CliSettings {
            max_depth: Some(0),
            ..Default::default()
        };

        let err = Config::load(Some(&path), Some(&overrides)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
