//! Aggregate pipelines: transform → output-or-report over one aggregated value.
//!
//! A [`SingleValueTransformPipeline`] is used when the unit of re-evaluation is
//! a whole aggregate (the entire compilation, all side inputs collected into
//! one sequence) rather than individual node matches. The selector picks the
//! aggregated provider from the host; the transform is attached to it with the
//! host's `select` combinator.

use std::sync::Arc;

use tracing::debug;

use crate::host::{
    CancellationToken, InitializationContext, Model, OutputAction, ProductionContext, ValueTransform,
};
use crate::reaction::reaction;
use crate::registry::{Pipeline, PipelineRegistry};
use crate::{OutputError, OutputFailurePolicy, PipelineError, PipelineName, PipelineStage, ResultOrDiagnostic};

type Selector<C, P> =
    Arc<dyn Fn(&mut C) -> <C as InitializationContext>::Value<P> + Send + Sync>;

/// A validated aggregate pipeline, ready to be installed into a host.
pub struct SingleValueTransformPipeline<C: InitializationContext, P: Model, M: Model> {
    name: PipelineName,
    policy: OutputFailurePolicy,
    selector: Selector<C, P>,
    transform: ValueTransform<P, ResultOrDiagnostic<M>>,
    output: OutputAction<M>,
}

impl<C, P, M> Pipeline<C> for SingleValueTransformPipeline<C, P, M>
where
    C: InitializationContext,
    P: Model,
    M: Model,
{
    fn name(&self) -> &PipelineName {
        &self.name
    }

    fn install(&self, context: &mut C) {
        debug!(pipeline = %self.name, "installing single-value pipeline");
        let source = (self.selector)(&mut *context);
        let selected = context.select_value(source, self.transform.clone());
        context.register_value_output(
            selected,
            reaction(self.name.clone(), self.policy.clone(), self.output.clone()),
        );
    }
}

/// Declares a [`SingleValueTransformPipeline`] on a registry.
///
/// Obtained from [`PipelineRegistry::single_value_pipeline`], which takes the
/// provider selector. Transform and output are required.
pub struct SingleValuePipelineBuilder<'r, C: InitializationContext, P: Model, M: Model> {
    registry: &'r mut PipelineRegistry<C>,
    name: PipelineName,
    selector: Selector<C, P>,
    transform: Option<ValueTransform<P, ResultOrDiagnostic<M>>>,
    output: Option<OutputAction<M>>,
}

impl<'r, C, P, M> SingleValuePipelineBuilder<'r, C, P, M>
where
    C: InitializationContext,
    P: Model,
    M: Model,
{
    pub(crate) fn new(
        registry: &'r mut PipelineRegistry<C>,
        name: PipelineName,
        selector: Selector<C, P>,
    ) -> Self {
        Self {
            registry,
            name,
            selector,
            transform: None,
            output: None,
        }
    }

    pub fn named(mut self, name: PipelineName) -> Self {
        self.name = name;
        self
    }

    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&P, &CancellationToken) -> ResultOrDiagnostic<M> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

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
            selector,
            transform,
            output,
        } = self;
        let missing = |stage| PipelineError::MissingStage {
            pipeline: name.clone(),
            stage,
        };
        let transform = transform.ok_or_else(|| missing(PipelineStage::Transform))?;
        let output = output.ok_or_else(|| missing(PipelineStage::Output))?;

        let pipeline = SingleValueTransformPipeline::<C, P, M> {
            name,
            policy: registry.policy().clone(),
            selector,
            transform,
            output,
        };
        Ok(registry.add_pipeline(Arc::new(pipeline)))
    }
}
