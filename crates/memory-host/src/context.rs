//! The host side of initialization: providers handed to pipelines and the
//! [`MemoryInit`] context that records their registrations.

use std::sync::Arc;

use pipeline::{
    CancellationToken, EquatableSequence, InitializationContext, Model, NodePredicate,
    OutputAction, PostInitializationAction, SyntaxContext, SyntaxTransform, ValueTransform,
};

use crate::reactions::{NodeReaction, Reaction, ValueReaction};
use crate::{Compilation, Declaration, SideInput};

/// What a filter-pipeline transform sees for one matched declaration.
pub struct DeclarationContext {
    declaration: Declaration,
    compilation: Arc<Compilation>,
}

impl DeclarationContext {
    pub fn new(declaration: Declaration, compilation: Arc<Compilation>) -> Self {
        Self {
            declaration,
            compilation,
        }
    }
}

impl SyntaxContext for DeclarationContext {
    type Node = Declaration;
    type Semantics = Compilation;

    fn node(&self) -> &Declaration {
        &self.declaration
    }

    fn semantics(&self) -> &Compilation {
        &self.compilation
    }
}

/// Per-declaration provider: a predicate and the transform applied to matches.
pub struct NodeProvider<T> {
    pub(crate) predicate: NodePredicate<Declaration>,
    pub(crate) transform: SyntaxTransform<DeclarationContext, T>,
}

pub(crate) type Evaluate<T> =
    Arc<dyn Fn(&Arc<Compilation>, &CancellationToken) -> T + Send + Sync>;

/// Provider of one value computed from the whole snapshot.
pub struct ValueProvider<T> {
    pub(crate) evaluate: Evaluate<T>,
}

impl<T> ValueProvider<T> {
    fn new<F>(evaluate: F) -> Self
    where
        F: Fn(&Arc<Compilation>, &CancellationToken) -> T + Send + Sync + 'static,
    {
        Self {
            evaluate: Arc::new(evaluate),
        }
    }
}

/// Registrations collected while a generator initializes.
#[derive(Default)]
pub struct MemoryInit {
    pub(crate) post_initialization: Vec<PostInitializationAction>,
    pub(crate) reactions: Vec<Box<dyn Reaction>>,
}

impl MemoryInit {
    /// The whole snapshot as one aggregated value.
    pub fn compilation(&self) -> ValueProvider<Compilation> {
        ValueProvider::new(|compilation: &Arc<Compilation>, _: &CancellationToken| {
            Compilation::clone(compilation)
        })
    }

    /// All declarations, collected into one ordered sequence.
    pub fn declarations(&self) -> ValueProvider<EquatableSequence<Declaration>> {
        ValueProvider::new(|compilation: &Arc<Compilation>, _: &CancellationToken| {
            compilation.declarations.clone()
        })
    }

    /// All side inputs, collected into one ordered sequence.
    pub fn side_inputs(&self) -> ValueProvider<EquatableSequence<SideInput>> {
        ValueProvider::new(|compilation: &Arc<Compilation>, _: &CancellationToken| {
            compilation.side_inputs.clone()
        })
    }
}

impl InitializationContext for MemoryInit {
    type Node = Declaration;
    type Syntax = DeclarationContext;
    type Values<T: Model> = NodeProvider<T>;
    type Value<T: Model> = ValueProvider<T>;

    fn register_post_initialization_output(&mut self, action: PostInitializationAction) {
        self.post_initialization.push(action);
    }

    fn create_syntax_provider<T: Model>(
        &mut self,
        predicate: NodePredicate<Declaration>,
        transform: SyntaxTransform<DeclarationContext, T>,
    ) -> NodeProvider<T> {
        NodeProvider {
            predicate,
            transform,
        }
    }

    fn select_value<T: Model, U: Model>(
        &mut self,
        source: ValueProvider<T>,
        transform: ValueTransform<T, U>,
    ) -> ValueProvider<U> {
        let upstream = source.evaluate;
        ValueProvider::new(move |compilation: &Arc<Compilation>, cancel: &CancellationToken| {
            transform(&upstream(compilation, cancel), cancel)
        })
    }

    fn register_values_output<T: Model>(&mut self, source: NodeProvider<T>, action: OutputAction<T>) {
        let index = self.reactions.len();
        self.reactions.push(Box::new(NodeReaction::new(index, source, action)));
    }

    fn register_value_output<T: Model>(&mut self, source: ValueProvider<T>, action: OutputAction<T>) {
        let index = self.reactions.len();
        self.reactions.push(Box::new(ValueReaction::new(index, source, action)));
    }
}
