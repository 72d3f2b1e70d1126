//! The fixed reaction every pipeline installs behind its transform:
//! report the diagnostic on failure, run the output action on success, and
//! contain output failures according to the registry's policy.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::host::{CancellationToken, Model, OutputAction, ProductionContext};
use crate::{
    ArtifactName, Diagnostic, OutputError, OutputFailurePolicy, PipelineName, ResultOrDiagnostic,
};

/// Wraps a model-level output action into the action the host registers
/// against the transform's [`ResultOrDiagnostic`].
pub(crate) fn reaction<M: Model>(
    pipeline: PipelineName,
    policy: OutputFailurePolicy,
    output: OutputAction<M>,
) -> OutputAction<ResultOrDiagnostic<M>> {
    Arc::new(
        move |sink: &mut dyn ProductionContext,
              outcome: &ResultOrDiagnostic<M>,
              cancel: &CancellationToken| match outcome {
            ResultOrDiagnostic::Failure(diagnostic) => {
                debug!(
                    pipeline = %pipeline,
                    diagnostic = %diagnostic.id,
                    "transform failed; reporting diagnostic"
                );
                sink.report_diagnostic(diagnostic.clone());
                Ok(())
            }
            ResultOrDiagnostic::Success(model) => {
                contain(&pipeline, &policy, sink, |sink| output(sink, model, cancel))
            }
        },
    )
}

/// Runs one output invocation behind the containment boundary.
///
/// Artifacts and diagnostics produced by the action are staged and committed
/// to `sink` only when the action succeeds, so a failed invocation leaves
/// nothing behind. Artifact names already taken in `sink` are rejected while
/// staging. Under [`OutputFailurePolicy::Report`] an error or panic becomes a
/// single diagnostic and the invocation succeeds. Under
/// [`OutputFailurePolicy::Propagate`] errors are returned and panics unwind.
pub(crate) fn contain(
    pipeline: &PipelineName,
    policy: &OutputFailurePolicy,
    sink: &mut dyn ProductionContext,
    action: impl FnOnce(&mut dyn ProductionContext) -> Result<(), OutputError>,
) -> Result<(), OutputError> {
    let mut staged = Staged::new(sink);

    let Some(descriptor) = policy.descriptor() else {
        action(&mut staged)?;
        return staged.commit();
    };

    let error = match panic::catch_unwind(AssertUnwindSafe(|| action(&mut staged))) {
        Ok(Ok(())) => match staged.clash() {
            None => return staged.commit(),
            Some(name) => OutputError::DuplicateArtifact { name },
        },
        Ok(Err(error)) => error,
        Err(payload) => OutputError::Panicked(panic_message(payload)),
    };

    warn!(
        pipeline = %pipeline,
        diagnostic = %descriptor.id,
        error = %error,
        "output action failed; reporting as diagnostic"
    );
    let message = match error {
        OutputError::Panicked(message) => message,
        other => other.to_string(),
    };
    staged
        .discard()
        .report_diagnostic(descriptor.create(None, &[message]));
    Ok(())
}

/// Per-invocation buffer in front of the host sink.
struct Staged<'s> {
    sink: &'s mut dyn ProductionContext,
    artifacts: Vec<(ArtifactName, String)>,
    diagnostics: Vec<Diagnostic>,
}

impl<'s> Staged<'s> {
    fn new(sink: &'s mut dyn ProductionContext) -> Self {
        Self {
            sink,
            artifacts: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// First staged artifact whose name the sink has taken since staging.
    fn clash(&self) -> Option<ArtifactName> {
        self.artifacts
            .iter()
            .find(|(name, _)| self.sink.contains_artifact(name))
            .map(|(name, _)| name.clone())
    }

    /// Hands everything to the sink, artifacts first. Nothing is written when
    /// any staged name is already taken.
    fn commit(self) -> Result<(), OutputError> {
        if let Some(name) = self.clash() {
            return Err(OutputError::DuplicateArtifact { name });
        }
        for (name, content) in self.artifacts {
            self.sink.add_artifact(name, content)?;
        }
        for diagnostic in self.diagnostics {
            self.sink.report_diagnostic(diagnostic);
        }
        Ok(())
    }

    /// Drops everything staged and returns the sink.
    fn discard(self) -> &'s mut dyn ProductionContext {
        self.sink
    }
}

impl ProductionContext for Staged<'_> {
    fn add_artifact(&mut self, name: ArtifactName, content: String) -> Result<(), OutputError> {
        if self.contains_artifact(&name) {
            return Err(OutputError::DuplicateArtifact { name });
        }
        self.artifacts.push((name, content));
        Ok(())
    }

    fn contains_artifact(&self, name: &ArtifactName) -> bool {
        self.sink.contains_artifact(name) || self.artifacts.iter().any(|(existing, _)| existing == name)
    }

    fn report_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Renders a `catch_unwind` payload as text.
#[doc(hidden)]
pub fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}
