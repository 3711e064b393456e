//! State model.
//!
//! A state is a configuration of one subsystem (or, after composition, of
//! several). States carry two numeric attributes used by reward functions:
//! the number of active tasks and the buffer occupancy. For composite states
//! both are the sum over the component states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marking of a state. Marked states denote "task complete".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marking {
    /// Task-complete state.
    Marked,
    /// Intermediate state.
    Unmarked,
}

/// A labeled automaton state.
///
/// Equality considers only the label and the marking; the numeric
/// attributes are payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// State label (composite states join component labels with `|`).
    pub label: String,
    /// Marking flag.
    pub marking: Marking,
    /// Number of active tasks (parallelism reward).
    pub active_tasks: f64,
    /// Parts held in buffers (buffer reward).
    pub buffer: u32,
}

impl State {
    /// Creates a state with zero attributes.
    pub fn new(label: impl Into<String>, marking: Marking) -> Self {
        Self {
            label: label.into(),
            marking,
            active_tasks: 0.0,
            buffer: 0,
        }
    }

    /// Creates a marked state.
    pub fn marked(label: impl Into<String>) -> Self {
        Self::new(label, Marking::Marked)
    }

    /// Creates an unmarked state.
    pub fn unmarked(label: impl Into<String>) -> Self {
        Self::new(label, Marking::Unmarked)
    }

    /// Sets the active-task count.
    pub fn with_tasks(mut self, active_tasks: f64) -> Self {
        self.active_tasks = active_tasks;
        self
    }

    /// Sets the buffer occupancy.
    pub fn with_buffer(mut self, buffer: u32) -> Self {
        self.buffer = buffer;
        self
    }

    /// Whether this state is marked.
    #[inline]
    pub fn is_marked(&self) -> bool {
        self.marking == Marking::Marked
    }

    /// Builds the composite state of a tuple of component states.
    pub(crate) fn composite<'a>(components: impl IntoIterator<Item = &'a State>) -> Self {
        let mut labels = Vec::new();
        let mut marked = true;
        let mut active_tasks = 0.0;
        let mut buffer = 0u32;

        for s in components {
            labels.push(s.label.as_str());
            marked &= s.is_marked();
            active_tasks += s.active_tasks;
            buffer = buffer.saturating_add(s.buffer);
        }

        Self {
            label: labels.join("|"),
            marking: if marked {
                Marking::Marked
            } else {
                Marking::Unmarked
            },
            active_tasks,
            buffer,
        }
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && self.marking == other.marking
    }
}

impl Eq for State {}

impl std::hash::Hash for State {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.label.hash(state);
        self.marking.hash(state);
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
