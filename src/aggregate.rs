//! Aggregation State
//!
//! Aggregating providers emit one artifact for every document they have
//! seen. The state lives as long as the provider instance; each call updates
//! one entry and rebuilds the whole output under a single lock, so the result
//! depends only on the set of known documents.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::diagnostics::Diagnostic;
use crate::document::DocumentSource;
use crate::paths;

pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AggregationEntry {
    pub label: String,
    pub contents: String,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Default)]
struct AggregationState {
    /// Keyed by label; two documents with the same label replace each other.
    entries: BTreeMap<String, AggregationEntry>,
    anonymous: u64,
}

/// The merged output after an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub contents: String,
    pub diagnostics: Vec<Diagnostic>,
    pub documents: usize,
}

#[derive(Debug)]
pub struct Aggregator {
    heading: Option<String>,
    placeholder: String,
    state: Mutex<AggregationState>,
}

impl Aggregator {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            heading: None,
            placeholder: placeholder.into(),
            state: Mutex::new(AggregationState::default()),
        }
    }

    /// Text emitted once at the top of the merged output.
    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }

    fn lock(&self) -> MutexGuard<'_, AggregationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upserts the document's entry, rebuilds the merged output, and runs
    /// `then` on it while the lock is still held.
    ///
    /// With `emit` off the entry is still recorded but `then` receives the
    /// placeholder.
    pub fn update_and_then<R>(
        &self,
        source: &DocumentSource,
        root: &Path,
        contents: &str,
        diagnostics: Vec<Diagnostic>,
        emit: bool,
        then: impl FnOnce(&Merged) -> R,
    ) -> R {
        let mut state = self.lock();

        let label = match &source.path {
            Some(path) => paths::relative_label(path, root),
            None if !source.id.is_empty() => source.id.clone(),
            None => {
                state.anonymous += 1;
                format!("anonymous-{}", state.anonymous)
            }
        };

        state.entries.insert(
            label.clone(),
            AggregationEntry {
                label,
                contents: contents.trim_end().to_string(),
                diagnostics,
            },
        );

        let merged = if emit {
            self.rebuild(&state)
        } else {
            Merged {
                contents: self.placeholder.clone(),
                diagnostics: vec![],
                documents: state.entries.len(),
            }
        };

        then(&merged)
    }

    fn rebuild(&self, state: &AggregationState) -> Merged {
        let sections: Vec<String> = state
            .entries
            .values()
            .map(|entry| format!("<!-- source: {} -->\n\n{}", entry.label, entry.contents))
            .collect();

        let mut contents = String::new();
        if let Some(heading) = &self.heading {
            contents.push_str(heading.trim_end());
            contents.push_str("\n\n");
        }
        contents.push_str(&sections.join(SECTION_SEPARATOR));
        contents.push('\n');

        Merged {
            contents,
            diagnostics: state
                .entries
                .values()
                .flat_map(|entry| entry.diagnostics.iter().cloned())
                .collect(),
            documents: state.entries.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn labels(&self) -> Vec<String> {
        self.lock().entries.keys().cloned().collect()
    }
}
