//! Output record of the engine: one `Word` per (page, edition).

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

/// A definition item nested one level below a `Definition`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum SubDefinition {
    Text(String),
    Nested(Vec<String>),
}

/// A top-level definition: plain text, or a group of sub-items following
/// the preceding sense.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum Definition {
    Text(String),
    Nested(Vec<SubDefinition>),
}

impl From<&str> for Definition {
    fn from(text: &str) -> Self {
        Definition::Text(text.to_string())
    }
}

impl From<&str> for SubDefinition {
    fn from(text: &str) -> Self {
        SubDefinition::Text(text.to_string())
    }
}

/// Ordered map from part-of-speech label to its definitions.
///
/// Labels keep the order in which they were first encountered; appending to
/// an existing label extends its list instead of replacing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Definitions {
    entries: Vec<(String, Vec<Definition>)>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, label: &str, definitions: Vec<Definition>) {
        if let Some((_, existing)) = self.entries.iter_mut().find(|(l, _)| l == label) {
            existing.extend(definitions);
        } else {
            self.entries.push((label.to_string(), definitions));
        }
    }

    pub fn get(&self, label: &str) -> Option<&[Definition]> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, defs)| defs.as_slice())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Definition])> {
        self.entries.iter().map(|(l, d)| (l.as_str(), d.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Definitions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, definitions) in &self.entries {
            map.serialize_entry(label, definitions)?;
        }
        map.end()
    }
}

// Helper function for serde skip_serializing_if
fn is_false(b: &bool) -> bool {
    !*b
}

/// Normalized dictionary entry built from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Word {
    pub pronunciations: Vec<String>,
    pub genders: Vec<String>,
    pub etymology: Vec<Definition>,
    pub definitions: Definitions,
    pub variants: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_variant: bool,
}

impl Word {
    /// True when the page yielded nothing worth keeping.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty() && self.variants.is_empty()
    }
}

/// Words of one dictionary, keyed by headword.
pub type Words = BTreeMap<String, Word>;

/// Dictionaries keyed by edition group.
pub type Groups = BTreeMap<String, Words>;
