//! Template loading errors.

/// Semantic error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    /// No template with this identifier exists.
    NotFound,
    /// The identifier cannot name a template (e.g. it escapes the root).
    InvalidId,
    /// The backing store cannot be reached right now.
    Unavailable,
    /// Other/unknown error category.
    Other,
}

/// Template error with semantic kind and loader-specific source.
#[derive(Debug)]
pub struct TemplateError {
    /// Semantic error category.
    pub kind: TemplateErrorKind,
    /// Template identifier (if known).
    pub id: Option<String>,
    /// Loader identifier (e.g., "Fs", "Memory").
    pub loader: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TemplateError {
    /// Create a new template error.
    #[must_use]
    pub fn new(kind: TemplateErrorKind) -> Self {
        Self {
            kind,
            id: None,
            loader: None,
            source: None,
        }
    }

    /// Attach the template identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach the loader identifier.
    #[must_use]
    pub fn with_loader(mut self, loader: &'static str) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a not found error for a template identifier.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::new(TemplateErrorKind::NotFound).with_id(id)
    }

    /// Create an invalid identifier error.
    #[must_use]
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::new(TemplateErrorKind::InvalidId).with_id(id)
    }

    /// Create a template error from an I/O error.
    #[must_use]
    pub fn io(err: std::io::Error, id: impl Into<String>) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => TemplateErrorKind::NotFound,
            std::io::ErrorKind::InvalidInput | std::io::ErrorKind::InvalidData => {
                TemplateErrorKind::InvalidId
            }
            std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::WouldBlock => TemplateErrorKind::Unavailable,
            _ => TemplateErrorKind::Other,
        };
        Self::new(kind).with_id(id).with_source(err)
    }

    /// Whether the template does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == TemplateErrorKind::NotFound
    }
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "[Loader] Kind: source (template: id)"
        if let Some(loader) = self.loader {
            write!(f, "[{loader}] ")?;
        }

        let kind_str = match self.kind {
            TemplateErrorKind::NotFound => "Template not found",
            TemplateErrorKind::InvalidId => "Invalid template id",
            TemplateErrorKind::Unavailable => "Template source unavailable",
            TemplateErrorKind::Other => "Template error",
        };
        write!(f, "{kind_str}")?;

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        if let Some(id) = &self.id {
            write!(f, " (template: {id})")?;
        }

        Ok(())
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_display_simple() {
        let err = TemplateError::new(TemplateErrorKind::NotFound);
        assert_eq!(err.to_string(), "Template not found");
    }

    #[test]
    fn test_display_full() {
        let err = TemplateError::not_found("loan.md")
            .with_loader("Fs")
            .with_source(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(
            err.to_string(),
            "[Fs] Template not found: gone (template: loan.md)"
        );
    }

    #[test]
    fn test_io_kind_mapping() {
        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "x");
        assert!(TemplateError::io(not_found, "a").is_not_found());

        let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "x");
        assert_eq!(
            TemplateError::io(timeout, "a").kind,
            TemplateErrorKind::Unavailable
        );

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "x");
        let err = TemplateError::io(denied, "a");
        assert_eq!(err.kind, TemplateErrorKind::Other);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TemplateError>();
    }
}
