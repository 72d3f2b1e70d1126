//! Fluent composition of incremental transformation pipelines.
//!
//! This crate defines the contract between an incremental-computation host
//! (change-tracked inputs, memoization by structural equality, a diagnostic and
//! artifact sink) and user-supplied filter, transform and output functions.
//! Host crates implement the port traits in [`host`]; they never add pipeline
//! rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed from a host; host crates define *how*.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`result`] | `ResultOrDiagnostic`, the two-state outcome of a transform |
//! | [`sequence`] | `EquatableSequence`, structural equality for embedded collections |
//! | [`diagnostics`] | `Diagnostic`, `DiagnosticDescriptor`, message templates |
//! | [`identifiers`] | Newtype identifiers (`DiagnosticId`, `ArtifactName`, etc.) |
//! | [`types`] | Shared value types (`DiagnosticSeverity`, `Location`, etc.) |
//! | [`errors`] | Configuration errors, output errors, failure policy |
//! | [`host`] | Port traits implemented by hosts |
//! | [`filter`] | Per-node filter → transform → output pipelines |
//! | [`single_value`] | Aggregate transform → output pipelines |
//! | [`registry`] | `PipelineRegistry` and the frozen `BuiltPipelines` |
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut registry = PipelineRegistry::with_default_diagnostic(failure_descriptor);
//! registry.add_post_initialization(|sink, _| {
//!     sink.add_artifact(marker_name, MARKER_SOURCE.to_string())
//! });
//! registry
//!     .filter_pipeline::<CodeModel>()
//!     .filter(|node, _| node.has_attribute("code"))
//!     .transform(|ctx, _| validate(ctx.node()))
//!     .output(|sink, model, _| sink.add_artifact(model.artifact_name(), model.render()))
//!     .register()?;
//! let generator = registry.build();
//! ```

pub mod diagnostics;
pub mod errors;
pub mod filter;
pub mod host;
pub mod identifiers;
mod reaction;
pub mod registry;
pub mod result;
pub mod sequence;
pub mod single_value;
#[cfg(test)]
mod testing;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by host crates.
pub use diagnostics::{format_message, Diagnostic, DiagnosticDescriptor, MISSING_STAGE_ID};
pub use errors::{OutputError, OutputFailurePolicy, PipelineError, PipelineStage};
pub use filter::{FilterPipelineBuilder, FilterTransformPipeline};
pub use host::{
    CancellationToken, IncrementalGenerator, InitializationContext, Model, NodePredicate,
    OutputAction, PostInitializationAction, PostInitializationContext, ProductionContext,
    SyntaxContext, SyntaxTransform, ValueTransform,
};
#[doc(hidden)]
pub use reaction::panic_message;
pub use identifiers::{ArtifactName, DiagnosticId, PipelineName, SessionId};
pub use registry::{BuiltPipelines, Pipeline, PipelineRegistry, SharedPipeline};
pub use result::ResultOrDiagnostic;
pub use sequence::EquatableSequence;
pub use single_value::{SingleValuePipelineBuilder, SingleValueTransformPipeline};
pub use types::{DiagnosticSeverity, Location, Timestamp};
