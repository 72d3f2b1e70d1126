//! Structured diagnostics and the helpers used to construct them.
//!
//! A [`DiagnosticDescriptor`] is the reusable, static description of a kind of
//! problem (stable code, title, message template, category, default severity).
//! A [`Diagnostic`] is one concrete report of that problem, with its message
//! rendered from the template and an optional [`Location`].
//!
//! Both pipeline authors and the registry's own validation produce diagnostics;
//! the host reports them through its standard diagnostic channel.

use serde::{Deserialize, Serialize};

use crate::{DiagnosticId, DiagnosticSeverity, Location};

/// Code of the built-in diagnostic used to render configuration errors.
pub const MISSING_STAGE_ID: &str = "PIPE001";

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Static description of a kind of diagnostic.
///
/// The message template uses positional placeholders: `{0}` is replaced by the
/// first argument passed to [`DiagnosticDescriptor::create`], `{1}` by the
/// second, and so on. `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiagnosticDescriptor {
    /// Stable code carried by every diagnostic created from this descriptor.
    pub id: DiagnosticId,

    /// Short, argument-free summary.
    pub title: String,

    /// Message template with positional placeholders.
    pub message_format: String,

    /// Free-form grouping tag (e.g. `"Usage"`, `"Generation"`).
    pub category: String,

    /// Severity assigned to created diagnostics.
    pub default_severity: DiagnosticSeverity,
}

impl DiagnosticDescriptor {
    pub fn new(
        id: DiagnosticId,
        title: impl Into<String>,
        message_format: impl Into<String>,
        category: impl Into<String>,
        default_severity: DiagnosticSeverity,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            message_format: message_format.into(),
            category: category.into(),
            default_severity,
        }
    }

    /// Descriptor suitable as a registry's default for output failures.
    ///
    /// The template is `"{0}"`, so the failure message is carried verbatim.
    pub fn output_failure(id: DiagnosticId, title: impl Into<String>) -> Self {
        Self::new(id, title, "{0}", "Generation", DiagnosticSeverity::Error)
    }

    /// Descriptor used when a configuration error is rendered as a diagnostic.
    pub fn missing_stage() -> Self {
        Self::new(
            DiagnosticId::from_static(MISSING_STAGE_ID),
            "Pipeline is missing a required stage",
            "Pipeline '{0}' cannot be registered: its {1} stage is not set",
            "Configuration",
            DiagnosticSeverity::Error,
        )
    }

    /// Creates a [`Diagnostic`] with the message rendered from `args`.
    pub fn create(&self, location: Option<Location>, args: &[String]) -> Diagnostic {
        Diagnostic {
            id: self.id.clone(),
            severity: self.default_severity,
            category: self.category.clone(),
            message: format_message(&self.message_format, args),
            location,
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// One structured, user-facing report.
///
/// Diagnostics are immutable values; equality is structural so that a
/// [`crate::ResultOrDiagnostic`] carrying one can take part in host caching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub id: DiagnosticId,
    pub severity: DiagnosticSeverity,
    pub category: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Diagnostic {
    /// Creates an ad-hoc diagnostic without a descriptor.
    pub fn new(id: DiagnosticId, severity: DiagnosticSeverity, message: impl Into<String>) -> Self {
        Self {
            id,
            severity,
            category: String::new(),
            message: message.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{location}: ")?;
        }
        write!(f, "{} {}: {}", self.severity, self.id, self.message)
    }
}

// ---------------------------------------------------------------------------
// Template rendering
// ---------------------------------------------------------------------------

/// Renders a positional message template.
///
/// Placeholders whose index is out of range, or whose contents are not a
/// plain index, are kept verbatim.
pub fn format_message(template: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
            continue;
        }

        let Some(close) = tail.find('}') else {
            out.push_str(tail);
            return out;
        };
        let placeholder = &tail[..=close];
        match tail[1..close].parse::<usize>().ok().and_then(|i| args.get(i)) {
            Some(arg) => out.push_str(arg),
            None => out.push_str(placeholder),
        }
        rest = &tail[close + 1..];
    }

    out.push_str(rest);
    out
}
