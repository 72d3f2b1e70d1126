//! Minimal recording host used by this crate's unit tests.
//!
//! Nodes are plain strings. Each registration is recorded in `calls` so tests
//! can assert on what reached the host, and `run` evaluates every registered
//! reaction eagerly (no caching).

use std::sync::Arc;

use crate::host::{
    CancellationToken, InitializationContext, Model, NodePredicate, OutputAction,
    PostInitializationAction, PostInitializationContext, ProductionContext, SyntaxContext,
    SyntaxTransform, ValueTransform,
};
use crate::{ArtifactName, Diagnostic, EquatableSequence, OutputError};

#[derive(Debug, Default)]
pub(crate) struct TestSink {
    pub artifacts: Vec<(ArtifactName, String)>,
    pub diagnostics: Vec<Diagnostic>,
}

impl TestSink {
    fn push(&mut self, name: ArtifactName, content: String) -> Result<(), OutputError> {
        if ProductionContext::contains_artifact(self, &name) {
            return Err(OutputError::DuplicateArtifact { name });
        }
        self.artifacts.push((name, content));
        Ok(())
    }

    pub fn artifact(&self, name: &str) -> Option<&str> {
        self.artifacts
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, content)| content.as_str())
    }
}

impl ProductionContext for TestSink {
    fn add_artifact(&mut self, name: ArtifactName, content: String) -> Result<(), OutputError> {
        self.push(name, content)
    }

    fn contains_artifact(&self, name: &ArtifactName) -> bool {
        self.artifacts.iter().any(|(existing, _)| existing == name)
    }

    fn report_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

impl PostInitializationContext for TestSink {
    fn add_artifact(&mut self, name: ArtifactName, content: String) -> Result<(), OutputError> {
        self.push(name, content)
    }
}

pub(crate) struct TestSyntax {
    node: String,
}

impl SyntaxContext for TestSyntax {
    type Node = String;
    type Semantics = str;

    fn node(&self) -> &String {
        &self.node
    }

    fn semantics(&self) -> &str {
        "test-semantics"
    }
}

pub(crate) struct TestValues<T> {
    predicate: NodePredicate<String>,
    transform: SyntaxTransform<TestSyntax, T>,
}

type Evaluate<T> = Arc<dyn Fn(&[String], &CancellationToken) -> T + Send + Sync>;

pub(crate) struct TestValue<T>(Evaluate<T>);

type Runner =
    Box<dyn Fn(&[String], &mut TestSink, &CancellationToken) -> Result<(), OutputError> + Send + Sync>;

#[derive(Default)]
pub(crate) struct TestContext {
    pub calls: Vec<&'static str>,
    post_initialization: Vec<PostInitializationAction>,
    runners: Vec<Runner>,
}

impl TestContext {
    /// Root aggregated provider: every node, in order.
    pub fn all_nodes(&mut self) -> TestValue<EquatableSequence<String>> {
        self.calls.push("all_nodes");
        TestValue(Arc::new(|nodes: &[String], _: &CancellationToken| {
            nodes.iter().cloned().collect()
        }))
    }

    /// Runs post-initialization actions, then every reaction. Returns the sink
    /// and the errors that escaped individual reactions.
    pub fn run(&self, nodes: &[&str]) -> (TestSink, Vec<OutputError>) {
        let nodes: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
        let cancel = CancellationToken::new();
        let mut sink = TestSink::default();
        let mut errors = Vec::new();

        for action in &self.post_initialization {
            if let Err(error) = action(&mut sink, &cancel) {
                errors.push(error);
            }
        }
        for runner in &self.runners {
            if let Err(error) = runner(&nodes, &mut sink, &cancel) {
                errors.push(error);
            }
        }
        (sink, errors)
    }
}

impl InitializationContext for TestContext {
    type Node = String;
    type Syntax = TestSyntax;
    type Values<T: Model> = TestValues<T>;
    type Value<T: Model> = TestValue<T>;

    fn register_post_initialization_output(&mut self, action: PostInitializationAction) {
        self.calls.push("post_initialization");
        self.post_initialization.push(action);
    }

    fn create_syntax_provider<T: Model>(
        &mut self,
        predicate: NodePredicate<String>,
        transform: SyntaxTransform<TestSyntax, T>,
    ) -> TestValues<T> {
        self.calls.push("syntax_provider");
        TestValues {
            predicate,
            transform,
        }
    }

    fn select_value<T: Model, U: Model>(
        &mut self,
        source: TestValue<T>,
        transform: ValueTransform<T, U>,
    ) -> TestValue<U> {
        self.calls.push("select");
        let TestValue(evaluate) = source;
        TestValue(Arc::new(move |nodes: &[String], cancel: &CancellationToken| {
            transform(&evaluate(nodes, cancel), cancel)
        }))
    }

    fn register_values_output<T: Model>(&mut self, source: TestValues<T>, action: OutputAction<T>) {
        self.calls.push("values_output");
        self.runners.push(Box::new(
            move |nodes: &[String], sink: &mut TestSink, cancel: &CancellationToken| {
                for node in nodes {
                    if !(source.predicate)(node, cancel) {
                        continue;
                    }
                    let syntax = TestSyntax { node: node.clone() };
                    let model = (source.transform)(&syntax, cancel);
                    action(sink, &model, cancel)?;
                }
                Ok(())
            },
        ));
    }

    fn register_value_output<T: Model>(&mut self, source: TestValue<T>, action: OutputAction<T>) {
        self.calls.push("value_output");
        let TestValue(evaluate) = source;
        self.runners.push(Box::new(
            move |nodes: &[String], sink: &mut TestSink, cancel: &CancellationToken| {
                action(sink, &evaluate(nodes, cancel), cancel)
            },
        ));
    }
}
