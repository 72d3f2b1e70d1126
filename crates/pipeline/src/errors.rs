//! Error and failure-policy types for pipeline declaration and execution.
//!
//! [`PipelineError`] covers configuration errors: a pipeline declared without a
//! required stage. These are programming defects, detected when the pipeline is
//! registered and before any host interaction.
//!
//! [`OutputError`] covers failures of an output stage while producing
//! artifacts. What happens to them is decided by [`OutputFailurePolicy`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ArtifactName, Diagnostic, DiagnosticDescriptor, PipelineName};

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// The user-supplied stages of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Filter,
    Transform,
    Output,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Filter => "filter",
            Self::Transform => "transform",
            Self::Output => "output",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors raised while declaring pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// A pipeline was registered before all of its required stages were set.
    ///
    /// Nothing is added to the registry when this is returned.
    #[error("pipeline '{pipeline}' is missing its {stage} stage")]
    MissingStage {
        pipeline: PipelineName,
        stage: PipelineStage,
    },
}

impl PipelineError {
    /// Renders this error with the built-in [`DiagnosticDescriptor::missing_stage`]
    /// descriptor, for hosts that surface configuration errors as diagnostics.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::MissingStage { pipeline, stage } => DiagnosticDescriptor::missing_stage()
                .create(None, &[pipeline.to_string(), stage.to_string()]),
        }
    }
}

// ---------------------------------------------------------------------------
// Output-stage errors
// ---------------------------------------------------------------------------

/// Failures raised by an output (or post-initialization) action.
#[derive(Debug, Error)]
pub enum OutputError {
    /// An artifact with the same name was already produced in this session.
    #[error("an artifact named '{name}' was already added")]
    DuplicateArtifact { name: ArtifactName },

    /// The action observed cancellation and stopped.
    #[error("operation was cancelled")]
    Cancelled,

    /// Free-form failure raised by pipeline-author code.
    #[error("{0}")]
    Message(String),

    /// The action panicked; carries the panic message.
    #[error("output action panicked: {0}")]
    Panicked(String),
}

impl OutputError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

// ---------------------------------------------------------------------------
// Failure policy
// ---------------------------------------------------------------------------

/// What a pipeline does when its output action fails.
///
/// Every pipeline built from one registry shares that registry's policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputFailurePolicy {
    /// Return the failure to the host; it is fatal to that invocation.
    #[default]
    Propagate,
    /// Convert the failure into a diagnostic from this descriptor, with the
    /// failure message as argument `{0}`, and report it to the sink.
    Report(DiagnosticDescriptor),
}

impl OutputFailurePolicy {
    /// The descriptor failures are reported with, if any.
    pub fn descriptor(&self) -> Option<&DiagnosticDescriptor> {
        match self {
            Self::Propagate => None,
            Self::Report(descriptor) => Some(descriptor),
        }
    }
}
