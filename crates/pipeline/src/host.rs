//! Port traits through which pipelines reach the incremental host.
//!
//! The host owns change tracking, memoization, scheduling and the actual
//! emission of artifacts and diagnostics. This crate only describes *what* it
//! needs from the host; host crates implement these traits.
//!
//! ## Contract for supplied stage functions
//!
//! - Filters and transforms must be pure functions of their inputs. The host
//!   may call them concurrently, re-entrantly, repeatedly after unrelated
//!   changes, or not at all when a cached result is still valid.
//! - Output actions are the only stage allowed observable side effects. The
//!   host re-runs them when the upstream model is no longer structurally equal
//!   to the cached one and may skip them when it is.
//! - Every stage receives a [`CancellationToken`]; long-running stage code
//!   should check it. Aborting host-side work is the host's responsibility.

use std::sync::Arc;

pub use tokio_util::sync::CancellationToken;

use crate::{ArtifactName, Diagnostic, OutputError};

/// Values flowing between host stages: cloneable for caching, structurally
/// comparable so the host can detect "unchanged", and shareable across the
/// host's worker threads.
pub trait Model: Clone + PartialEq + Send + Sync + 'static {}

impl<T> Model for T where T: Clone + PartialEq + Send + Sync + 'static {}

// ---------------------------------------------------------------------------
// Capabilities handed to stages
// ---------------------------------------------------------------------------

/// Read-only view of a matched node, handed to filter-pipeline transforms.
///
/// `Semantics` is whatever contextual read access the host offers about the
/// node (symbol tables, the surrounding compilation, ...).
pub trait SyntaxContext {
    type Node;
    type Semantics: ?Sized;

    fn node(&self) -> &Self::Node;

    fn semantics(&self) -> &Self::Semantics;
}

/// Sink available to output actions.
pub trait ProductionContext {
    /// Publishes a generated artifact.
    ///
    /// Fails with [`OutputError::DuplicateArtifact`] when `name` is taken.
    fn add_artifact(&mut self, name: ArtifactName, content: String) -> Result<(), OutputError>;

    /// `true` when `name` is already taken in the session.
    fn contains_artifact(&self, name: &ArtifactName) -> bool;

    /// Reports a diagnostic through the host's diagnostic channel.
    fn report_diagnostic(&mut self, diagnostic: Diagnostic);
}

/// Sink available to post-initialization actions. Only constant artifacts can
/// be produced before any input has been seen.
pub trait PostInitializationContext {
    fn add_artifact(&mut self, name: ArtifactName, content: String) -> Result<(), OutputError>;
}

// ---------------------------------------------------------------------------
// Stage function shapes
// ---------------------------------------------------------------------------

pub type NodePredicate<N> = Arc<dyn Fn(&N, &CancellationToken) -> bool + Send + Sync>;

pub type SyntaxTransform<S, T> = Arc<dyn Fn(&S, &CancellationToken) -> T + Send + Sync>;

pub type ValueTransform<T, U> = Arc<dyn Fn(&T, &CancellationToken) -> U + Send + Sync>;

pub type OutputAction<T> = Arc<
    dyn Fn(&mut dyn ProductionContext, &T, &CancellationToken) -> Result<(), OutputError>
        + Send
        + Sync,
>;

pub type PostInitializationAction = Arc<
    dyn Fn(&mut dyn PostInitializationContext, &CancellationToken) -> Result<(), OutputError>
        + Send
        + Sync,
>;

// ---------------------------------------------------------------------------
// Host entry points
// ---------------------------------------------------------------------------

/// The host's change-tracked input graph, as seen while a generator is being
/// initialized.
///
/// `Values<T>` is a per-node provider (one `T` per matched node); `Value<T>`
/// is a provider of one aggregated `T`. Hosts add their own methods for the
/// root aggregated providers they offer; pipelines pick them with a selector.
///
/// An `Err` returned from a registered output action is fatal to that
/// invocation only; hosts must not let it abort sibling invocations.
pub trait InitializationContext: 'static {
    type Node: Send + Sync + 'static;
    type Syntax: SyntaxContext<Node = Self::Node> + 'static;
    type Values<T: Model>;
    type Value<T: Model>;

    /// Queues an action to run once per session, before any pipeline reacts.
    fn register_post_initialization_output(&mut self, action: PostInitializationAction);

    /// Filters the change-tracked nodes with `predicate` and maps each match
    /// through `transform`.
    fn create_syntax_provider<T: Model>(
        &mut self,
        predicate: NodePredicate<Self::Node>,
        transform: SyntaxTransform<Self::Syntax, T>,
    ) -> Self::Values<T>;

    /// Attaches a pure transform to an aggregated provider.
    fn select_value<T: Model, U: Model>(
        &mut self,
        source: Self::Value<T>,
        transform: ValueTransform<T, U>,
    ) -> Self::Value<U>;

    /// Registers `action` to react to each per-node value.
    fn register_values_output<T: Model>(&mut self, source: Self::Values<T>, action: OutputAction<T>);

    /// Registers `action` to react to the aggregated value.
    fn register_value_output<T: Model>(&mut self, source: Self::Value<T>, action: OutputAction<T>);
}

/// The single boundary method a host calls on a generator.
///
/// Called exactly once per host session.
pub trait IncrementalGenerator<C: InitializationContext>: Send + Sync {
    fn initialize(&self, context: &mut C);
}
