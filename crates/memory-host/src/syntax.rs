//! The change-tracked input model of the in-memory host.
//!
//! A [`Compilation`] is one snapshot of everything the host knows: the
//! declarations (the per-node inputs) and side inputs (extra files). Callers
//! hand a new snapshot to every generation pass; the host compares it against
//! the previous pass by structural equality.

use std::collections::BTreeMap;

use pipeline::{EquatableSequence, Location};
use serde::{Deserialize, Serialize};

use crate::HostError;

/// One declaration node.
///
/// `key` identifies the node across passes; two snapshots with a node of the
/// same key describe the same node, possibly edited.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Declaration {
    pub key: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub location: Location,
}

impl Declaration {
    pub fn new(
        key: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            key: key.into(),
            kind: kind.into(),
            name: name.into(),
            attributes: BTreeMap::new(),
            location,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A non-declaration input file (configuration, resources, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SideInput {
    pub path: String,
    pub text: String,
}

/// A full input snapshot. Also the read-only semantic view handed to
/// transforms through [`crate::DeclarationContext`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Compilation {
    pub assembly_name: String,
    #[serde(default)]
    pub declarations: EquatableSequence<Declaration>,
    #[serde(default)]
    pub side_inputs: EquatableSequence<SideInput>,
}

impl Compilation {
    pub fn new(assembly_name: impl Into<String>) -> Self {
        Self {
            assembly_name: assembly_name.into(),
            ..Self::default()
        }
    }

    pub fn with_declarations(mut self, declarations: Vec<Declaration>) -> Self {
        self.declarations = declarations.into();
        self
    }

    pub fn with_side_inputs(mut self, side_inputs: Vec<SideInput>) -> Self {
        self.side_inputs = side_inputs.into();
        self
    }

    pub fn from_json(source: &str) -> Result<Self, HostError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Looks a declaration up by name.
    pub fn find(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name == name)
    }

    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Declaration> + 'a {
        self.declarations.iter().filter(move |d| d.kind == kind)
    }
}
