//! Newtype identifiers.
//!
//! Every concept that has an identity is a distinct newtype wrapping a primitive.
//! This prevents accidentally interchanging, for example, a [`DiagnosticId`] with
//! an [`ArtifactName`] even though both are strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// String-backed identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// Stable code identifying a kind of diagnostic (e.g. `"PIPE001"`).
    ///
    /// Codes never change between releases; users suppress and search by them.
    DiagnosticId
}

string_id! {
    /// Name under which an output stage publishes a generated artifact
    /// (e.g. `"Person.g.rs"`).
    ///
    /// Names are unique within one generation session.
    ArtifactName
}

string_id! {
    /// Human-readable name of a declared pipeline, used in logs and in
    /// configuration error messages.
    ///
    /// Pipelines that are not named explicitly get `"<kind>#<ordinal>"`.
    PipelineName
}

impl DiagnosticId {
    /// Built-in codes are known non-empty at compile time.
    pub(crate) fn from_static(value: &'static str) -> Self {
        Self(value.to_string())
    }
}

impl PipelineName {
    /// Default name for the `ordinal`-th pipeline declared on a registry.
    pub(crate) fn ordinal(kind: &str, ordinal: usize) -> Self {
        Self(format!("{kind}#{ordinal}"))
    }
}

// ---------------------------------------------------------------------------
// UUID-backed identifiers (internally generated)
// ---------------------------------------------------------------------------

/// Identifies one host session: one call to the built unit's `initialize`
/// followed by any number of generation passes.
///
/// Propagated through spans so all activity from a single session can be
/// correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a new random session identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
