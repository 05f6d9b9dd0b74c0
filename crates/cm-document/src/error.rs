//! Error types for plugin loading and document conversion.

/// Load-time error: the plugin set is misconfigured.
///
/// These are fatal for the session; no document conversion should proceed
/// with a registry or schema that failed to build.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// Two plugins declare the same markdown tag.
    #[error("markdown tag `{tag}` of plugin `{plugin}` is already registered by `{owner}`")]
    DuplicateTag {
        /// The contested markdown tag.
        tag: String,
        /// Plugin that registered the tag first.
        owner: String,
        /// Plugin whose registration failed.
        plugin: String,
    },
    /// Two plugins declare the same document node type.
    #[error("node type `{node_type}` of plugin `{plugin}` is already registered by `{owner}`")]
    DuplicateNodeType {
        /// The contested node type.
        node_type: String,
        /// Plugin that registered the type first.
        owner: String,
        /// Plugin whose registration failed.
        plugin: String,
    },
    /// Two schema fragments disagree about the same rule.
    #[error("schema conflict on `{subject}`: `{first}` and `{second}` declare incompatible rules")]
    SchemaConflict {
        /// The rule in conflict (`parent > child` or a node type).
        subject: String,
        /// Plugin (or `base`) that declared the rule first.
        first: String,
        /// Plugin that declared the incompatible rule.
        second: String,
    },
    /// A schema fragment extends a parent type nobody defines.
    #[error("plugin `{plugin}` extends unknown parent type `{parent}`")]
    UnknownParent {
        /// The undefined parent type.
        parent: String,
        /// Plugin that referenced it.
        plugin: String,
    },
    /// A schema fragment permits a child type nobody defines.
    #[error("plugin `{plugin}` permits unknown child type `{child}`")]
    UnknownChild {
        /// The undefined child type.
        child: String,
        /// Plugin that referenced it.
        plugin: String,
    },
}

/// Per-document conversion error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    /// Unmatched tags, invalid attribute syntax, or other malformed input.
    #[error("malformed document: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
    },
    /// A node was placed where the composed schema does not allow it.
    #[error("schema violation: `{child}` is not allowed inside `{parent}`")]
    SchemaViolation {
        /// Parent node type.
        parent: String,
        /// Rejected child node type.
        child: String,
    },
    /// The serializer met a node type no plugin or base rule knows.
    #[error("no converter for node type `{0}`")]
    UnknownNodeType(String),
    /// Nested documents are nested deeper than allowed.
    #[error("nesting depth {depth} exceeds the limit of {limit}")]
    RecursionLimitExceeded {
        /// Depth that was attempted.
        depth: usize,
        /// Configured limit.
        limit: usize,
    },
    /// HTML input could not be read.
    #[error("HTML import failed: {0}")]
    Html(String),
    /// Builder invariant broken (a bug in the engine or a plugin).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Create a [`ConvertError::Malformed`] error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}
