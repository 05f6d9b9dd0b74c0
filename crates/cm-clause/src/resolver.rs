//! Asynchronous clause resolution.
//!
//! Each outermost unresolved clause is resolved in its own task. The task
//! owns a copy of the clause and returns the finished sub-tree; the document
//! is only written after the task's result has been awaited. Dropping the
//! future returned by [`ClauseResolver::resolve`] lets running loader calls
//! finish in the background and discards their results.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use cm_document::{Converter, DEFAULT_MAX_DEPTH, Element, Node};
use cm_templates::TemplateLoader;

use crate::error::ClauseError;
use crate::plugin::{CLAUSE, ERROR, RESOLVED, STATUS, TEMPLATE, mark_unresolved};
use crate::rewrite::{UnboundPolicy, bindings, rewrite};

/// Resolver settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Deepest clause nesting that is still resolved (top-level clauses are
    /// at depth 1).
    pub max_depth: usize,
    /// Treatment of placeholders the clause does not bind.
    pub unbound: UnboundPolicy,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            unbound: UnboundPolicy::default(),
        }
    }
}

/// A clause that could not be resolved.
#[derive(Clone, Debug)]
pub struct ClauseFailure {
    /// `clauseid` of the clause, if it has one.
    pub clause_id: Option<String>,
    /// `src` of the clause, if it has one.
    pub src: Option<String>,
    /// What went wrong.
    pub error: ClauseError,
}

/// Outcome of resolving a document.
#[derive(Clone, Debug, Default)]
pub struct ResolutionReport {
    /// Number of clauses resolved, nested ones included.
    pub resolved: usize,
    /// Clauses left unresolved.
    pub failures: Vec<ClauseFailure>,
}

impl ResolutionReport {
    /// Whether every clause was resolved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn merge(&mut self, other: Self) {
        self.resolved += other.resolved;
        self.failures.extend(other.failures);
    }
}

/// A clause to resolve, located by child indices from the root.
#[derive(Debug)]
struct Target {
    path: Vec<usize>,
    /// `src` of every resolved clause enclosing this one, outermost first.
    /// Its length is the nesting depth of the enclosing clause.
    ancestors: Vec<String>,
}

impl Target {
    fn depth(&self) -> usize {
        self.ancestors.len() + 1
    }
}

/// Fills clause nodes from their templates.
///
/// Cloning is cheap; clones share the converter, loader and options.
#[derive(Clone)]
pub struct ClauseResolver {
    inner: Arc<Inner>,
}

struct Inner {
    converter: Converter,
    loader: Arc<dyn TemplateLoader>,
    options: ResolverOptions,
}

impl std::fmt::Debug for ClauseResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClauseResolver")
            .field("loader", &self.inner.loader.name())
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl ClauseResolver {
    /// Create a resolver with default options.
    ///
    /// The converter must have the clause plugin registered for nested
    /// clauses to be recognized.
    #[must_use]
    pub fn new(converter: Converter, loader: Arc<dyn TemplateLoader>) -> Self {
        Self::with_options(converter, loader, ResolverOptions::default())
    }

    /// Create a resolver with explicit options.
    #[must_use]
    pub fn with_options(
        converter: Converter,
        loader: Arc<dyn TemplateLoader>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                converter,
                loader,
                options,
            }),
        }
    }

    /// Resolver settings.
    #[must_use]
    pub fn options(&self) -> &ResolverOptions {
        &self.inner.options
    }

    /// Resolve every clause in `document` that is not resolved yet.
    ///
    /// Clauses already marked resolved are kept, but clauses nested inside
    /// them are visited. Failures never abort the document: the failing
    /// clause keeps its children, is marked unresolved and is listed in the
    /// report.
    pub async fn resolve(&self, document: &mut Node) -> ResolutionReport {
        let mut targets = Vec::new();
        collect_targets(document.children(), &mut Vec::new(), &mut Vec::new(), &mut targets);
        tracing::debug!(clauses = targets.len(), "Resolving clauses");

        let mut tasks = Vec::with_capacity(targets.len());
        for target in targets {
            let Some(clause) = element_at(document, &target.path).cloned() else {
                continue;
            };
            let depth = target.depth();
            let Target { path, ancestors } = target;
            let inner = Arc::clone(&self.inner);
            let handle =
                tokio::spawn(async move { inner.resolve_clause(clause, depth, ancestors).await });
            tasks.push((path, handle));
        }

        let mut report = ResolutionReport::default();
        for (path, handle) in tasks {
            let Some(slot) = element_at_mut(document, &path) else {
                continue;
            };
            match handle.await {
                Ok((element, outcome)) => {
                    *slot = element;
                    report.merge(outcome);
                }
                Err(err) => {
                    let error = ClauseError::Aborted {
                        src: slot.data.get("src").unwrap_or_default().to_owned(),
                        message: err.to_string(),
                    };
                    mark_unresolved(slot, &error.to_string());
                    report.failures.push(failure(slot, error));
                }
            }
        }

        tracing::debug!(
            resolved = report.resolved,
            failed = report.failures.len(),
            "Clause resolution finished"
        );
        report
    }

    /// Re-render a resolved clause from its cached template after its
    /// bindings changed. The loader is not called.
    ///
    /// Clauses inside the new content are parsed but not resolved; run
    /// [`resolve`](Self::resolve) on the document to fill them.
    ///
    /// # Errors
    ///
    /// Returns [`ClauseError::NoCachedTemplate`] if the clause was never
    /// resolved, or [`ClauseError::Parse`] if the rewritten text is invalid.
    /// The clause is left unchanged on error.
    pub fn rebind(&self, clause: &mut Element) -> Result<(), ClauseError> {
        let src = clause.data.get("src").unwrap_or_default().to_owned();
        let template = clause
            .data
            .get(TEMPLATE)
            .ok_or_else(|| ClauseError::NoCachedTemplate { src: src.clone() })?
            .to_owned();

        let nodes = self.inner.render(clause, &src, &template, 1)?;
        clause.nodes = nodes;
        clause.data.insert(STATUS, RESOLVED);
        clause.data.remove(ERROR);
        tracing::debug!(src = %src, "Rebound clause");
        Ok(())
    }
}

type Resolution<'a> = Pin<Box<dyn Future<Output = (Element, ResolutionReport)> + Send + 'a>>;

impl Inner {
    /// Resolve one clause and, recursively, the clauses in its new content.
    fn resolve_clause(
        &self,
        mut clause: Element,
        depth: usize,
        ancestors: Vec<String>,
    ) -> Resolution<'_> {
        Box::pin(async move {
            let mut report = ResolutionReport::default();

            let src = match self.expand(&mut clause, depth, &ancestors).await {
                Ok(src) => src,
                Err(error) => {
                    tracing::debug!(error = %error, "Clause unresolved");
                    mark_unresolved(&mut clause, &error.to_string());
                    report.failures.push(failure(&clause, error));
                    return (clause, report);
                }
            };
            report.resolved += 1;

            let mut chain = ancestors;
            chain.push(src);
            let mut targets = Vec::new();
            collect_targets(&clause.nodes, &mut Vec::new(), &mut chain, &mut targets);

            for target in targets {
                let Some(nested) = nested_at_mut(&mut clause.nodes, &target.path) else {
                    continue;
                };
                let nested = std::mem::take(nested);
                let (element, outcome) = self
                    .resolve_clause(nested, target.depth(), target.ancestors)
                    .await;
                if let Some(slot) = nested_at_mut(&mut clause.nodes, &target.path) {
                    *slot = element;
                }
                report.merge(outcome);
            }

            (clause, report)
        })
    }

    /// Load, rewrite and parse the template of `clause`, replacing its
    /// children. Returns the clause's `src`.
    async fn expand(
        &self,
        clause: &mut Element,
        depth: usize,
        ancestors: &[String],
    ) -> Result<String, ClauseError> {
        let src = match clause.data.get("src") {
            Some(src) if !src.trim().is_empty() => src.to_owned(),
            _ => {
                return Err(ClauseError::MissingSource {
                    clause_id: clause.data.get("clauseid").unwrap_or_default().to_owned(),
                });
            }
        };

        let limit = self.options.max_depth;
        if depth > limit || ancestors.contains(&src) {
            return Err(ClauseError::RecursionLimitExceeded { src, depth, limit });
        }

        let template = self
            .loader
            .load(&src)
            .await
            .map_err(|err| ClauseError::from_template(&src, err))?;
        tracing::debug!(src = %src, depth, "Loaded clause template");

        clause.nodes = self.render(clause, &src, &template, depth)?;
        clause.data.insert(TEMPLATE, template);
        clause.data.insert(STATUS, RESOLVED);
        clause.data.remove(ERROR);
        Ok(src)
    }

    /// Rewrite `template` with the clause's bindings and parse the result.
    fn render(
        &self,
        clause: &Element,
        src: &str,
        template: &str,
        depth: usize,
    ) -> Result<Vec<Node>, ClauseError> {
        let text = rewrite(template, &bindings(&clause.data), self.options.unbound);
        self.converter
            .parse_fragment(&text, depth)
            .map_err(|err| ClauseError::from_convert(src, err))
    }
}

fn failure(clause: &Element, error: ClauseError) -> ClauseFailure {
    ClauseFailure {
        clause_id: clause.data.get("clauseid").map(str::to_owned),
        src: clause.data.get("src").map(str::to_owned),
        error,
    }
}

/// Find the outermost unresolved clauses below `nodes`.
///
/// Resolved clauses are descended into with their `src` pushed onto
/// `ancestors`.
fn collect_targets(
    nodes: &[Node],
    path: &mut Vec<usize>,
    ancestors: &mut Vec<String>,
    out: &mut Vec<Target>,
) {
    for (index, node) in nodes.iter().enumerate() {
        let Some(element) = node.element() else {
            continue;
        };
        path.push(index);
        if element.node_type != CLAUSE {
            collect_targets(&element.nodes, path, ancestors, out);
        } else if element.data.get(STATUS) == Some(RESOLVED) {
            ancestors.push(element.data.get("src").unwrap_or_default().to_owned());
            collect_targets(&element.nodes, path, ancestors, out);
            ancestors.pop();
        } else {
            out.push(Target {
                path: path.clone(),
                ancestors: ancestors.clone(),
            });
        }
        path.pop();
    }
}

fn nested_at_mut<'a>(nodes: &'a mut [Node], path: &[usize]) -> Option<&'a mut Element> {
    let (first, rest) = path.split_first()?;
    let element = nodes.get_mut(*first)?.element_mut()?;
    if rest.is_empty() {
        Some(element)
    } else {
        nested_at_mut(&mut element.nodes, rest)
    }
}

fn element_at<'a>(root: &'a Node, path: &[usize]) -> Option<&'a Element> {
    let mut element = root.element()?;
    for index in path {
        element = element.nodes.get(*index)?.element()?;
    }
    Some(element)
}

fn element_at_mut<'a>(root: &'a mut Node, path: &[usize]) -> Option<&'a mut Element> {
    nested_at_mut(&mut root.element_mut()?.nodes, path)
}
