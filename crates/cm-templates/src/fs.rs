//! Filesystem template loader.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::{TemplateError, TemplateLoader};

/// Loads templates from files under a root directory.
///
/// A template id is a relative path. `loan/interest` resolves to
/// `<root>/loan/interest`, falling back to `<root>/loan/interest.md`.
#[derive(Clone, Debug)]
pub struct FsTemplateLoader {
    root: PathBuf,
}

impl FsTemplateLoader {
    /// Create a loader rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a template id onto a path below the root.
    ///
    /// Rejects empty ids, absolute paths and any `..` component.
    fn resolve(&self, id: &str) -> Result<PathBuf, TemplateError> {
        let relative = Path::new(id);
        let valid = !id.trim().is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !valid {
            return Err(TemplateError::invalid_id(id).with_loader(self.name()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl TemplateLoader for FsTemplateLoader {
    async fn load(&self, id: &str) -> Result<String, TemplateError> {
        let path = self.resolve(id)?;

        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                tracing::debug!(id, path = %path.display(), "Loaded template");
                return Ok(text);
            }
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                return Err(TemplateError::io(err, id).with_loader(self.name()));
            }
            Err(_) => {}
        }

        if path.extension().is_some_and(|ext| ext == "md") {
            return Err(TemplateError::not_found(id).with_loader(self.name()));
        }

        let mut with_ext = path.into_os_string();
        with_ext.push(".md");
        let path = PathBuf::from(with_ext);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| TemplateError::io(err, id).with_loader(self.name()))?;
        tracing::debug!(id, path = %path.display(), "Loaded template");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "Fs"
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::TemplateErrorKind;

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("loan")).unwrap();
        std::fs::write(dir.path().join("loan/interest.md"), "Interest {{rate}}.").unwrap();
        std::fs::write(dir.path().join("plain"), "No extension.").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_load_with_md_fallback() {
        let dir = setup();
        let loader = FsTemplateLoader::new(dir.path());
        assert_eq!(loader.load("loan/interest").await.unwrap(), "Interest {{rate}}.");
        assert_eq!(
            loader.load("loan/interest.md").await.unwrap(),
            "Interest {{rate}}."
        );
    }

    #[tokio::test]
    async fn test_load_exact_name() {
        let dir = setup();
        let loader = FsTemplateLoader::new(dir.path());
        assert_eq!(loader.load("plain").await.unwrap(), "No extension.");
    }

    #[tokio::test]
    async fn test_missing_template() {
        let dir = setup();
        let loader = FsTemplateLoader::new(dir.path());
        let err = loader.load("loan/penalty").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.loader, Some("Fs"));
        assert_eq!(err.id.as_deref(), Some("loan/penalty"));
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = setup();
        let loader = FsTemplateLoader::new(dir.path().join("loan"));
        for id in ["../plain", "/etc/passwd", "", "  "] {
            let err = loader.load(id).await.unwrap_err();
            assert_eq!(err.kind, TemplateErrorKind::InvalidId, "id {id:?}");
        }
    }
}
