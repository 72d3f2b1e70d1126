//! The pipeline registry: accumulates declarations, then freezes them into one
//! host-registrable unit.
//!
//! A [`PipelineRegistry`] is `Open` while pipelines and post-initialization
//! actions are being declared. [`PipelineRegistry::build`] consumes it and
//! returns [`BuiltPipelines`], so declaring anything after the freeze is
//! impossible rather than merely rejected.
//!
//! The registry is a single-owner construction-time object; it is never
//! shared while open.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::filter::FilterPipelineBuilder;
use crate::host::{
    CancellationToken, IncrementalGenerator, InitializationContext, Model,
    PostInitializationAction, PostInitializationContext,
};
use crate::single_value::SingleValuePipelineBuilder;
use crate::{DiagnosticDescriptor, OutputError, OutputFailurePolicy, PipelineName};

/// A declared pipeline that knows how to install itself into a host.
///
/// Implemented by [`crate::FilterTransformPipeline`] and
/// [`crate::SingleValueTransformPipeline`]; custom pipeline kinds can be added
/// with [`PipelineRegistry::add_pipeline`].
pub trait Pipeline<C: InitializationContext>: Send + Sync {
    fn name(&self) -> &PipelineName;

    /// Wires this pipeline into the host's input graph.
    fn install(&self, context: &mut C);
}

pub type SharedPipeline<C> = Arc<dyn Pipeline<C>>;

pub struct PipelineRegistry<C: InitializationContext> {
    policy: OutputFailurePolicy,
    post_initialization: Vec<PostInitializationAction>,
    pipelines: Vec<SharedPipeline<C>>,
}

impl<C: InitializationContext> PipelineRegistry<C> {
    /// A registry whose pipelines propagate output failures to the host.
    pub fn new() -> Self {
        Self {
            policy: OutputFailurePolicy::Propagate,
            post_initialization: Vec::new(),
            pipelines: Vec::new(),
        }
    }

    /// A registry whose pipelines convert output failures into diagnostics
    /// created from `descriptor`.
    pub fn with_default_diagnostic(descriptor: DiagnosticDescriptor) -> Self {
        Self {
            policy: OutputFailurePolicy::Report(descriptor),
            ..Self::new()
        }
    }

    pub fn policy(&self) -> &OutputFailurePolicy {
        &self.policy
    }

    pub fn default_diagnostic(&self) -> Option<&DiagnosticDescriptor> {
        self.policy.descriptor()
    }

    /// Queues an action that runs once per session before any pipeline
    /// reacts, typically to publish constant artifacts.
    pub fn add_post_initialization<F>(&mut self, action: F) -> &mut Self
    where
        F: Fn(&mut dyn PostInitializationContext, &CancellationToken) -> Result<(), OutputError>
            + Send
            + Sync
            + 'static,
    {
        self.post_initialization.push(Arc::new(action));
        self
    }

    /// Starts declaring a per-node pipeline producing `M`.
    pub fn filter_pipeline<M: Model>(&mut self) -> FilterPipelineBuilder<'_, C, M> {
        let name = PipelineName::ordinal("filter", self.pipelines.len());
        FilterPipelineBuilder::new(self, name)
    }

    /// Starts declaring an aggregate pipeline over the provider `selector`
    /// picks from the host.
    pub fn single_value_pipeline<P, M, F>(
        &mut self,
        selector: F,
    ) -> SingleValuePipelineBuilder<'_, C, P, M>
    where
        P: Model,
        M: Model,
        F: Fn(&mut C) -> C::Value<P> + Send + Sync + 'static,
    {
        let name = PipelineName::ordinal("single_value", self.pipelines.len());
        SingleValuePipelineBuilder::new(self, name, Arc::new(selector))
    }

    /// Appends an already-validated pipeline.
    pub fn add_pipeline(&mut self, pipeline: SharedPipeline<C>) -> &mut Self {
        debug!(pipeline = %pipeline.name(), "pipeline declared");
        self.pipelines.push(pipeline);
        self
    }

    /// Number of declared pipelines.
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Freezes the registry into an immutable, host-registrable unit.
    pub fn build(self) -> BuiltPipelines<C> {
        BuiltPipelines {
            post_initialization: self.post_initialization.into(),
            pipelines: self.pipelines.into(),
        }
    }
}

impl<C: InitializationContext> fmt::Debug for PipelineRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineRegistry")
            .field("policy", &self.policy)
            .field("post_initialization", &self.post_initialization.len())
            .field(
                "pipelines",
                &self.pipelines.iter().map(|p| p.name().as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<C: InitializationContext> Default for PipelineRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// The frozen output of [`PipelineRegistry::build`].
///
/// Cheap to clone and safe to share; the same unit may initialize any number
/// of independent host sessions.
pub struct BuiltPipelines<C: InitializationContext> {
    post_initialization: Arc<[PostInitializationAction]>,
    pipelines: Arc<[SharedPipeline<C>]>,
}

impl<C: InitializationContext> BuiltPipelines<C> {
    /// Pipeline names in declaration order.
    pub fn pipeline_names(&self) -> impl Iterator<Item = &PipelineName> {
        self.pipelines.iter().map(|p| p.name())
    }
}

impl<C: InitializationContext> Clone for BuiltPipelines<C> {
    fn clone(&self) -> Self {
        Self {
            post_initialization: Arc::clone(&self.post_initialization),
            pipelines: Arc::clone(&self.pipelines),
        }
    }
}

impl<C: InitializationContext> IncrementalGenerator<C> for BuiltPipelines<C> {
    /// Registers every post-initialization action, then installs every
    /// pipeline, each in declaration order. Pipelines are independent
    /// reactors; order carries no data dependency.
    fn initialize(&self, context: &mut C) {
        info!(
            post_initialization = self.post_initialization.len(),
            pipelines = self.pipelines.len(),
            "initializing generator"
        );
        for action in self.post_initialization.iter() {
            context.register_post_initialization_output(Arc::clone(action));
        }
        for pipeline in self.pipelines.iter() {
            pipeline.install(context);
        }
    }
}
