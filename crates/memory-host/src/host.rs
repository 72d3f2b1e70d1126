//! The session driver.

use std::collections::BTreeMap;
use std::sync::Arc;

use pipeline::{
    ArtifactName, CancellationToken, Diagnostic, DiagnosticId, IncrementalGenerator, SessionId,
    Timestamp,
};
use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::reactions::{self, FailureSource, Pass, Produced};
use crate::{Compilation, GenerationFailure, HostError, MemoryInit, PassStats};

/// Outcome of one generation pass.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    /// 1-based pass number within the session.
    pub pass: u64,
    pub started_at: Timestamp,
    pub artifacts: BTreeMap<ArtifactName, String>,
    pub diagnostics: Vec<Diagnostic>,
    pub failures: Vec<GenerationFailure>,
    pub stats: PassStats,
}

impl SessionReport {
    /// `true` if any reported diagnostic has error severity.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn artifact(&self, name: &str) -> Option<&str> {
        self.artifacts
            .iter()
            .find(|(key, _)| key.as_str() == name)
            .map(|(_, content)| content.as_str())
    }

    pub fn diagnostics_with_id(&self, id: &DiagnosticId) -> impl Iterator<Item = &Diagnostic> + '_ {
        let id = id.clone();
        self.diagnostics.iter().filter(move |d| d.id == id)
    }
}

/// One incremental session over successive [`Compilation`] snapshots.
///
/// Passes are evaluated sequentially in registration order, which keeps
/// artifact ordering and duplicate detection deterministic.
pub struct MemoryHost {
    session_id: SessionId,
    init: MemoryInit,
    /// Results of the post-initialization actions, recorded on the first pass.
    post_initialized: Option<Vec<Result<Produced, String>>>,
    passes: u64,
}

impl MemoryHost {
    /// Starts a session and initializes `generator` into it.
    pub fn new<G>(generator: &G) -> Self
    where
        G: IncrementalGenerator<MemoryInit> + ?Sized,
    {
        let session_id = SessionId::new_random();
        let mut init = MemoryInit::default();
        generator.initialize(&mut init);
        debug!(
            session_id = %session_id,
            post_initialization = init.post_initialization.len(),
            reactions = init.reactions.len(),
            "generator initialized"
        );
        Self {
            session_id,
            init,
            post_initialized: None,
            passes: 0,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Runs one generation pass over `compilation`.
    pub fn run(
        &mut self,
        compilation: &Compilation,
        cancel: &CancellationToken,
    ) -> Result<SessionReport, HostError> {
        let pass_number = self.passes + 1;
        let span = info_span!("generation_pass", session_id = %self.session_id, pass = pass_number);
        let _enter = span.enter();

        if cancel.is_cancelled() {
            return Err(HostError::Cancelled);
        }

        let started_at = Timestamp::now();
        let compilation = Arc::new(compilation.clone());
        let mut pass = Pass::default();

        self.post_initialize(&mut pass, cancel);
        for reaction in &mut self.init.reactions {
            reaction.react(&compilation, &mut pass, cancel)?;
        }

        self.passes = pass_number;
        info!(
            artifacts = pass.artifacts.len(),
            diagnostics = pass.diagnostics.len(),
            failures = pass.failures.len(),
            outputs_run = pass.stats.outputs_run,
            outputs_replayed = pass.stats.outputs_replayed,
            "generation pass complete"
        );

        Ok(SessionReport {
            session_id: self.session_id,
            pass: pass_number,
            started_at,
            artifacts: pass.artifacts,
            diagnostics: pass.diagnostics,
            failures: pass.failures,
            stats: pass.stats,
        })
    }

    fn post_initialize(&mut self, pass: &mut Pass, cancel: &CancellationToken) {
        let outcomes = self.post_initialized.get_or_insert_with(|| {
            let mut taken = BTreeMap::new();
            let mut outcomes = Vec::with_capacity(self.init.post_initialization.len());
            for action in &self.init.post_initialization {
                let outcome = reactions::run_post_initialization(action, &taken, cancel);
                if let Ok(produced) = &outcome {
                    taken.extend(produced.artifacts().cloned());
                }
                outcomes.push(outcome);
            }
            outcomes
        });

        for (index, outcome) in outcomes.iter().enumerate() {
            let source = FailureSource::PostInitialization { index };
            match outcome {
                Ok(produced) => {
                    pass.commit(&source, produced);
                }
                Err(message) => pass.fail(source, message.clone()),
            }
        }
    }
}
