//! Per-clause resolution errors.

use std::sync::Arc;

use cm_document::ConvertError;
use cm_templates::TemplateError;

/// Why a clause could not be resolved.
///
/// These never abort a document. The resolver records them on the clause
/// node (`cm:error`) and in the [`ResolutionReport`](crate::ResolutionReport).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClauseError {
    /// The loader has no template under this identifier.
    #[error("template `{src}` not found")]
    TemplateNotFound {
        /// Template identifier.
        src: String,
    },
    /// The loader failed for another reason.
    #[error("loading template `{src}` failed: {source}")]
    Loader {
        /// Template identifier.
        src: String,
        /// Loader error.
        #[source]
        source: Arc<TemplateError>,
    },
    /// The clause references one of its ancestors or is nested too deeply.
    #[error("clause `{src}` at depth {depth} exceeds the nesting limit of {limit}")]
    RecursionLimitExceeded {
        /// Template identifier.
        src: String,
        /// Nesting depth of the clause.
        depth: usize,
        /// Configured limit.
        limit: usize,
    },
    /// The clause has no `src` attribute.
    #[error("clause `{clause_id}` has no `src` attribute")]
    MissingSource {
        /// Clause instance identifier (empty if absent).
        clause_id: String,
    },
    /// The rewritten template is not a valid document.
    #[error("template `{src}` does not parse: {source}")]
    Parse {
        /// Template identifier.
        src: String,
        /// Conversion error.
        #[source]
        source: ConvertError,
    },
    /// Rebinding a clause that was never resolved.
    #[error("clause `{src}` has no cached template")]
    NoCachedTemplate {
        /// Template identifier.
        src: String,
    },
    /// The resolution task did not complete.
    #[error("resolution of `{src}` was aborted: {message}")]
    Aborted {
        /// Template identifier.
        src: String,
        /// Task failure description.
        message: String,
    },
}

impl ClauseError {
    /// Map a loader error for template `src`.
    #[must_use]
    pub fn from_template(src: impl Into<String>, err: TemplateError) -> Self {
        let src = src.into();
        if err.is_not_found() {
            Self::TemplateNotFound { src }
        } else {
            Self::Loader {
                src,
                source: Arc::new(err),
            }
        }
    }

    /// Map a conversion error of template `src`.
    #[must_use]
    pub fn from_convert(src: impl Into<String>, err: ConvertError) -> Self {
        let src = src.into();
        match err {
            ConvertError::RecursionLimitExceeded { depth, limit } => {
                Self::RecursionLimitExceeded { src, depth, limit }
            }
            source => Self::Parse { src, source },
        }
    }
}
