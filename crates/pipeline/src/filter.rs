//! Per-node pipelines: filter → transform → output-or-report.
//!
//! A [`FilterTransformPipeline`] reacts to each individual change-tracked node.
//! Nodes rejected by the predicate are dropped silently before any transform
//! cost is paid. Each match is transformed into a [`ResultOrDiagnostic`]; a
//! failure is reported to the host's diagnostic sink, a success is handed to
//! the output action.

use std::sync::Arc;

use tracing::debug;

use crate::host::{
    CancellationToken, InitializationContext, Model, NodePredicate, OutputAction,
    ProductionContext, SyntaxTransform,
};
use crate::reaction::reaction;
use crate::registry::{Pipeline, PipelineRegistry};
use crate::{OutputError, OutputFailurePolicy, PipelineError, PipelineName, PipelineStage, ResultOrDiagnostic};

/// A validated per-node pipeline, ready to be installed into a host.
pub struct FilterTransformPipeline<C: InitializationContext, M: Model> {
    name: PipelineName,
    policy: OutputFailurePolicy,
    predicate: NodePredicate<C::Node>,
    transform: SyntaxTransform<C::Syntax, ResultOrDiagnostic<M>>,
    output: OutputAction<M>,
}

impl<C: InitializationContext, M: Model> Pipeline<C> for FilterTransformPipeline<C, M> {
    fn name(&self) -> &PipelineName {
        &self.name
    }

    fn install(&self, context: &mut C) {
        debug!(pipeline = %self.name, "installing filter pipeline");
        let matches = context.create_syntax_provider(self.predicate.clone(), self.transform.clone());
        context.register_values_output(
            matches,
            reaction(self.name.clone(), self.policy.clone(), self.output.clone()),
        );
    }
}

/// Declares a [`FilterTransformPipeline`] on a registry.
///
/// Obtained from [`PipelineRegistry::filter_pipeline`]. All three stages are
/// required; [`FilterPipelineBuilder::register`] hands the completed pipeline
/// back to the registry.
pub struct FilterPipelineBuilder<'r, C: InitializationContext, M: Model> {
    registry: &'r mut PipelineRegistry<C>,
    name: PipelineName,
    predicate: Option<NodePredicate<C::Node>>,
    transform: Option<SyntaxTransform<C::Syntax, ResultOrDiagnostic<M>>>,
    output: Option<OutputAction<M>>,
}

impl<'r, C: InitializationContext, M: Model> FilterPipelineBuilder<'r, C, M> {
    pub(crate) fn new(registry: &'r mut PipelineRegistry<C>, name: PipelineName) -> Self {
        Self {
            registry,
            name,
            predicate: None,
            transform: None,
            output: None,
        }
    }

    pub fn named(mut self, name: PipelineName) -> Self {
        self.name = name;
        self
    }

    /// Sets the predicate selecting which nodes reach the transform.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&C::Node, &CancellationToken) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Sets the transform producing the model for a matched node.
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&C::Syntax, &CancellationToken) -> ResultOrDiagnostic<M> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Sets the action producing artifacts for a successful model.
    pub fn output<F>(mut self, output: F) -> Self
    where
        F: Fn(&mut dyn ProductionContext, &M, &CancellationToken) -> Result<(), OutputError>
            + Send
            + Sync
            + 'static,
    {
        self.output = Some(Arc::new(output));
        self
    }

    /// Validates the declaration and adds it to the registry.
    ///
    /// On a missing stage nothing is added and the registry is left untouched.
    pub fn register(self) -> Result<&'r mut PipelineRegistry<C>, PipelineError> {
        let Self {
            registry,
            name,
            predicate,
            transform,
            output,
        } = self;
        let missing = |stage| PipelineError::MissingStage {
            pipeline: name.clone(),
            stage,
        };
        let predicate = predicate.ok_or_else(|| missing(PipelineStage::Filter))?;
        let transform = transform.ok_or_else(|| missing(PipelineStage::Transform))?;
        let output = output.ok_or_else(|| missing(PipelineStage::Output))?;

        let pipeline = FilterTransformPipeline::<C, M> {
            name,
            policy: registry.policy().clone(),
            predicate,
            transform,
            output,
        };
        Ok(registry.add_pipeline(Arc::new(pipeline)))
    }
}
