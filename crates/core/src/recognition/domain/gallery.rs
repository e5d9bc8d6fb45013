use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::recognition::domain::descriptor::Descriptor;

/// A known person: display name plus the reference image to learn them from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceIdentity {
    pub name: String,
    pub image: PathBuf,
}

impl ReferenceIdentity {
    pub fn new(name: impl Into<String>, image: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
        }
    }
}

/// Reference descriptors for one identity.
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledDescriptor {
    pub identity_name: String,
    pub descriptors: Vec<Descriptor>,
}

impl LabeledDescriptor {
    pub fn new(identity_name: impl Into<String>, descriptors: Vec<Descriptor>) -> Self {
        Self {
            identity_name: identity_name.into(),
            descriptors,
        }
    }
}

/// Immutable set of labeled reference descriptors.
///
/// Shared read-only across detection cycles; replaced wholesale on rebuild.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Gallery {
    entries: Vec<LabeledDescriptor>,
}

impl Gallery {
    pub fn new(entries: Vec<LabeledDescriptor>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[LabeledDescriptor] {
        &self.entries
    }

    pub fn get(&self, identity_name: &str) -> Option<&LabeledDescriptor> {
        self.entries
            .iter()
            .find(|e| e.identity_name == identity_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.identity_name.as_str())
            .collect()
    }
}
