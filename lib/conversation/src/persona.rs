//! Curated personas.
//!
//! A persona is the system prompt the completion service runs a user's
//! questions under. The catalog maps short button labels to full prompts and
//! is fixed once the process starts. Anything that is not a catalog label is
//! free text, and the router decides what free text means.

use serde::{Deserialize, Serialize};

/// A catalog entry: the label users pick and the prompt it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaEntry {
    /// Short label shown on the selection menu.
    pub label: String,
    /// Full system prompt.
    pub prompt: String,
}

impl PersonaEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(label: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            prompt: prompt.into(),
        }
    }
}

/// Immutable, ordered set of curated personas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaCatalog {
    entries: Vec<PersonaEntry>,
}

impl PersonaCatalog {
    /// Builds a catalog from entries in presentation order.
    ///
    /// Blank labels are dropped, and when a label repeats the first entry
    /// wins.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = PersonaEntry>) -> Self {
        let mut kept: Vec<PersonaEntry> = Vec::new();
        for entry in entries {
            let label = entry.label.trim();
            if label.is_empty() || kept.iter().any(|e| e.label == label) {
                continue;
            }
            kept.push(PersonaEntry::new(label, entry.prompt));
        }
        Self { entries: kept }
    }

    /// The personas offered when no catalog is configured.
    #[must_use]
    pub fn curated() -> Self {
        Self::new([
            PersonaEntry::new(
                "Programmer",
                "Programmer, an expert in software engineering, algorithms and AI",
            ),
            PersonaEntry::new(
                "Historian",
                "Historian, an expert in world history who explains the causes and consequences of events",
            ),
            PersonaEntry::new(
                "Marketer",
                "Marketer, an expert in promotion, sales funnels and working with an audience",
            ),
            PersonaEntry::new(
                "Psychologist",
                "Psychologist who understands people and gives careful, practical advice",
            ),
        ])
    }

    /// Returns the full prompt for `label`, or `None` if it is not a
    /// catalog label.
    ///
    /// Matching is exact after trimming surrounding whitespace.
    #[must_use]
    pub fn resolve(&self, label: &str) -> Option<&str> {
        let label = label.trim();
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.prompt.as_str())
    }

    /// Returns the labels in declaration order.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    /// Returns the entries in declaration order.
    #[must_use]
    pub fn entries(&self) -> &[PersonaEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PersonaCatalog {
    fn default() -> Self {
        Self::curated()
    }
}
