//! Converter and resolver construction from configuration.

use std::path::Path;
use std::sync::Arc;

use cm_clause::{CLAUSE, ClausePlugin, ClauseResolver, ResolverOptions, UnboundPolicy};
use cm_config::{CliSettings, Config, UnboundSetting};
use cm_document::{ConvertOptions, Converter, Plugin};
use cm_plugins::{BuiltinOptions, builtin};
use cm_templates::{CachingLoader, FsTemplateLoader, TemplateLoader};

use crate::error::CliError;

/// Loaded configuration plus the converter built from it.
pub(crate) struct Session {
    pub(crate) config: Config,
    pub(crate) converter: Converter,
}

impl Session {
    /// Load configuration and build the converter.
    pub(crate) fn load(
        config_path: Option<&Path>,
        settings: Option<&CliSettings>,
    ) -> Result<Self, CliError> {
        let config = Config::load(config_path, settings)?;
        Self::from_config(config)
    }

    pub(crate) fn from_config(config: Config) -> Result<Self, CliError> {
        let converter = Converter::new(plugins(&config)?)?.with_options(ConvertOptions {
            max_depth: config.resolver.max_depth,
        });
        tracing::info!(
            plugins = ?config.plugins.enabled,
            config = ?config.config_path,
            "Converter ready"
        );
        Ok(Self { config, converter })
    }

    /// Read a UTF-8 input file.
    pub(crate) fn read(path: &Path) -> Result<String, CliError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Clause resolver reading templates from the configured directory.
    pub(crate) fn resolver(&self) -> ClauseResolver {
        let templates = &self.config.templates_resolved;
        let fs = FsTemplateLoader::new(&templates.dir);
        let loader: Arc<dyn TemplateLoader> = if templates.cache {
            Arc::new(CachingLoader::new(fs))
        } else {
            Arc::new(fs)
        };
        tracing::info!(dir = %templates.dir.display(), cache = templates.cache, "Template loader ready");

        ClauseResolver::with_options(
            self.converter.clone(),
            loader,
            ResolverOptions {
                max_depth: self.config.resolver.max_depth,
                unbound: unbound_policy(self.config.resolver.unbound),
            },
        )
    }
}

/// Instantiate the enabled plugins in configured order.
fn plugins(config: &Config) -> Result<Vec<Arc<dyn Plugin>>, CliError> {
    let options = BuiltinOptions {
        computed_raw_value: config.plugins.computed_raw_value,
    };
    config
        .plugins
        .enabled
        .iter()
        .map(|name| {
            if name == CLAUSE {
                return Ok(Arc::new(ClausePlugin::new()) as Arc<dyn Plugin>);
            }
            builtin(name, &options)
                .ok_or_else(|| CliError::Validation(format!("unknown plugin `{name}`")))
        })
        .collect()
}

fn unbound_policy(setting: UnboundSetting) -> UnboundPolicy {
    match setting {
        UnboundSetting::Variable => UnboundPolicy::Variable,
        UnboundSetting::Keep => UnboundPolicy::Keep,
        UnboundSetting::Remove => UnboundPolicy::Remove,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn session(toml: &str) -> Session {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clausemark.toml");
        std::fs::write(&path, toml).unwrap();
        Session::load(Some(&path), None).unwrap()
    }

    #[test]
    fn test_default_plugins_are_registered() {
        let session = session("");
        let names: Vec<&str> = session
            .converter
            .registry()
            .plugins()
            .map(|p| p.name())
            .collect();
        assert_eq!(names, vec!["list", "variable", "computed", "clause"]);
    }

    #[test]
    fn test_plugin_selection_and_options() {
        let session = session(
            "[plugins]\nenabled = [\"computed\"]\ncomputed_raw_value = true\n\n[resolver]\nmax_depth = 3\n",
        );
        let doc = session.converter.parse("<computed value=\"x\"/>").unwrap();
        assert_eq!(session.converter.serialize(&doc).unwrap(), "{{x}}\n");
        assert_eq!(session.converter.options().max_depth, 3);
        assert!(session.converter.registry().plugin_for_tag(CLAUSE).is_none());
    }

    #[test]
    fn test_resolver_uses_configured_policy() {
        let session = session("[resolver]\nunbound = \"remove\"\n");
        assert_eq!(session.resolver().options().unbound, UnboundPolicy::Remove);
    }
}
