//! Registered output reactions and their structural-equality caches.
//!
//! Transforms run on every pass. An output action runs only when the model it
//! would receive is not equal to the model cached from the previous pass;
//! otherwise the artifacts and diagnostics it produced last time are replayed.

use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use pipeline::{
    panic_message, ArtifactName, CancellationToken, Diagnostic, Model, OutputAction, OutputError,
    PostInitializationAction, PostInitializationContext, ProductionContext,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::{NodeProvider, ValueProvider};
use crate::{Compilation, DeclarationContext, HostError};

// ---------------------------------------------------------------------------
// Pass accumulation
// ---------------------------------------------------------------------------

/// Where a fatal failure happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureSource {
    PostInitialization { index: usize },
    Reaction { index: usize, node: Option<String> },
}

/// An invocation whose error or panic escaped the pipeline's own containment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub source: FailureSource,
    pub message: String,
}

/// Work counters for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStats {
    /// Transform evaluations (per matched node, plus one per aggregate).
    pub transforms_run: usize,
    /// Output actions actually invoked.
    pub outputs_run: usize,
    /// Output results replayed from the cache.
    pub outputs_replayed: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Pass {
    pub artifacts: BTreeMap<ArtifactName, String>,
    pub diagnostics: Vec<Diagnostic>,
    pub failures: Vec<GenerationFailure>,
    pub stats: PassStats,
}

impl Pass {
    /// Adds everything `produced` holds, or nothing when one of its artifact
    /// names is already taken in this pass. Returns whether it was committed.
    pub(crate) fn commit(&mut self, source: &FailureSource, produced: &Produced) -> bool {
        let clash = produced
            .artifacts
            .iter()
            .find(|(name, _)| self.artifacts.contains_key(name))
            .map(|(name, _)| name.clone());
        if let Some(name) = clash {
            self.fail(source.clone(), OutputError::DuplicateArtifact { name }.to_string());
            return false;
        }
        for (name, content) in &produced.artifacts {
            self.artifacts.insert(name.clone(), content.clone());
        }
        self.diagnostics.extend(produced.diagnostics.iter().cloned());
        true
    }

    pub(crate) fn fail(&mut self, source: FailureSource, message: String) {
        warn!(?source, %message, "generation invocation failed");
        self.failures.push(GenerationFailure { source, message });
    }
}

/// Everything one invocation handed to its sink.
#[derive(Debug, Clone, Default)]
pub(crate) struct Produced {
    artifacts: Vec<(ArtifactName, String)>,
    diagnostics: Vec<Diagnostic>,
}

impl Produced {
    pub(crate) fn artifacts(&self) -> impl Iterator<Item = &(ArtifactName, String)> {
        self.artifacts.iter()
    }
}

/// Sink for one invocation; rejects names already taken in the pass.
struct InvocationSink<'a> {
    taken: &'a BTreeMap<ArtifactName, String>,
    produced: Produced,
}

impl InvocationSink<'_> {
    fn is_taken(&self, name: &ArtifactName) -> bool {
        self.taken.contains_key(name)
            || self.produced.artifacts.iter().any(|(existing, _)| existing == name)
    }

    fn push(&mut self, name: ArtifactName, content: String) -> Result<(), OutputError> {
        if self.is_taken(&name) {
            return Err(OutputError::DuplicateArtifact { name });
        }
        self.produced.artifacts.push((name, content));
        Ok(())
    }
}

impl ProductionContext for InvocationSink<'_> {
    fn add_artifact(&mut self, name: ArtifactName, content: String) -> Result<(), OutputError> {
        self.push(name, content)
    }

    fn contains_artifact(&self, name: &ArtifactName) -> bool {
        self.is_taken(name)
    }

    fn report_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.produced.diagnostics.push(diagnostic);
    }
}

impl PostInitializationContext for InvocationSink<'_> {
    fn add_artifact(&mut self, name: ArtifactName, content: String) -> Result<(), OutputError> {
        self.push(name, content)
    }
}

// ---------------------------------------------------------------------------
// Invocation boundary
// ---------------------------------------------------------------------------

/// Runs one action, containing both errors and panics so that one failing
/// invocation never aborts its siblings.
fn guard<F>(taken: &BTreeMap<ArtifactName, String>, f: F) -> Result<Produced, String>
where
    F: FnOnce(&mut InvocationSink<'_>) -> Result<(), OutputError>,
{
    let mut sink = InvocationSink {
        taken,
        produced: Produced::default(),
    };
    match panic::catch_unwind(AssertUnwindSafe(|| f(&mut sink))) {
        Ok(Ok(())) => Ok(sink.produced),
        Ok(Err(error)) => Err(error.to_string()),
        Err(payload) => Err(panic_message(payload)),
    }
}

pub(crate) fn run_post_initialization(
    action: &PostInitializationAction,
    taken: &BTreeMap<ArtifactName, String>,
    cancel: &CancellationToken,
) -> Result<Produced, String> {
    guard(taken, |sink| action(sink, cancel))
}

struct Cached<T> {
    model: T,
    produced: Produced,
}

/// Replays the cached output when `model` is unchanged, otherwise invokes the
/// action. Returns the new cache entry; invocations that fail or cannot be
/// committed are not cached.
fn settle<T: Model>(
    action: &OutputAction<T>,
    previous: Option<Cached<T>>,
    model: T,
    source: FailureSource,
    pass: &mut Pass,
    cancel: &CancellationToken,
) -> Option<Cached<T>> {
    let produced = match previous {
        Some(cached) if cached.model == model => {
            debug!(?source, "model unchanged; replaying cached output");
            pass.stats.outputs_replayed += 1;
            cached.produced
        }
        _ => {
            pass.stats.outputs_run += 1;
            match guard(&pass.artifacts, |sink| action(sink, &model, cancel)) {
                Ok(produced) => produced,
                Err(message) => {
                    pass.fail(source, message);
                    return None;
                }
            }
        }
    };
    if !pass.commit(&source, &produced) {
        return None;
    }
    Some(Cached { model, produced })
}

// ---------------------------------------------------------------------------
// Reactions
// ---------------------------------------------------------------------------

pub(crate) trait Reaction: Send {
    fn react(
        &mut self,
        compilation: &Arc<Compilation>,
        pass: &mut Pass,
        cancel: &CancellationToken,
    ) -> Result<(), HostError>;
}

/// Reacts to each declaration matched by a [`NodeProvider`]. Cache entries are
/// keyed by declaration key; entries for nodes that no longer match are
/// dropped.
pub(crate) struct NodeReaction<T> {
    index: usize,
    source: NodeProvider<T>,
    action: OutputAction<T>,
    cache: HashMap<String, Cached<T>>,
}

impl<T> NodeReaction<T> {
    pub(crate) fn new(index: usize, source: NodeProvider<T>, action: OutputAction<T>) -> Self {
        Self {
            index,
            source,
            action,
            cache: HashMap::new(),
        }
    }
}

impl<T: Model> Reaction for NodeReaction<T> {
    fn react(
        &mut self,
        compilation: &Arc<Compilation>,
        pass: &mut Pass,
        cancel: &CancellationToken,
    ) -> Result<(), HostError> {
        let mut next = HashMap::new();
        for declaration in compilation.declarations.iter() {
            if cancel.is_cancelled() {
                return Err(HostError::Cancelled);
            }
            if !(self.source.predicate)(declaration, cancel) {
                continue;
            }

            let context = DeclarationContext::new(declaration.clone(), Arc::clone(compilation));
            let model = (self.source.transform)(&context, cancel);
            pass.stats.transforms_run += 1;

            let source = FailureSource::Reaction {
                index: self.index,
                node: Some(declaration.key.clone()),
            };
            let previous = self.cache.remove(&declaration.key);
            if let Some(entry) = settle(&self.action, previous, model, source, pass, cancel) {
                next.insert(declaration.key.clone(), entry);
            }
        }
        self.cache = next;
        Ok(())
    }
}

/// Reacts to one aggregated value.
pub(crate) struct ValueReaction<T> {
    index: usize,
    source: ValueProvider<T>,
    action: OutputAction<T>,
    cache: Option<Cached<T>>,
}

impl<T> ValueReaction<T> {
    pub(crate) fn new(index: usize, source: ValueProvider<T>, action: OutputAction<T>) -> Self {
        Self {
            index,
            source,
            action,
            cache: None,
        }
    }
}

impl<T: Model> Reaction for ValueReaction<T> {
    fn react(
        &mut self,
        compilation: &Arc<Compilation>,
        pass: &mut Pass,
        cancel: &CancellationToken,
    ) -> Result<(), HostError> {
        if cancel.is_cancelled() {
            return Err(HostError::Cancelled);
        }
        let model = (self.source.evaluate)(compilation, cancel);
        pass.stats.transforms_run += 1;

        let source = FailureSource::Reaction {
            index: self.index,
            node: None,
        };
        self.cache = settle(&self.action, self.cache.take(), model, source, pass, cancel);
        Ok(())
    }
}
