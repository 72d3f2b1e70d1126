//! The two-state outcome of a transform stage.

use serde::{Deserialize, Serialize};

use crate::Diagnostic;

/// Either the model produced by a transform, or the diagnostic explaining why
/// no model could be produced.
///
/// Exactly one branch is ever populated, so the type cannot be observed in an
/// invalid state. There are deliberately no `From` conversions from `T` or
/// from [`Diagnostic`]: a transform whose model type is itself diagnostic-shaped
/// must still say which branch it means.
///
/// The type is structurally comparable so that hosts can cache a transform's
/// outcome (including a failed one) and skip the output stage when it did not
/// change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrDiagnostic<T> {
    Success(T),
    Failure(Diagnostic),
}

impl<T> ResultOrDiagnostic<T> {
    pub fn success(value: T) -> Self {
        Self::Success(value)
    }

    pub fn fail(diagnostic: Diagnostic) -> Self {
        Self::Failure(diagnostic)
    }

    /// Converts a standard [`Result`] whose error is already a [`Diagnostic`].
    pub fn from_result(result: Result<T, Diagnostic>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(diagnostic) => Self::Failure(diagnostic),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The model, present only on success.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// The diagnostic, present only on failure.
    pub fn error(&self) -> Option<&Diagnostic> {
        match self {
            Self::Success(_) => None,
            Self::Failure(diagnostic) => Some(diagnostic),
        }
    }

    pub fn into_result(self) -> Result<T, Diagnostic> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(diagnostic) => Err(diagnostic),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResultOrDiagnostic<U> {
        match self {
            Self::Success(value) => ResultOrDiagnostic::Success(f(value)),
            Self::Failure(diagnostic) => ResultOrDiagnostic::Failure(diagnostic),
        }
    }

    /// Chains a further fallible step; the first failure wins.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> ResultOrDiagnostic<U>) -> ResultOrDiagnostic<U> {
        match self {
            Self::Success(value) => f(value),
            Self::Failure(diagnostic) => ResultOrDiagnostic::Failure(diagnostic),
        }
    }
}
