//! Event model.
//!
//! Events are the atomic occurrences of a discrete-event system. Each event
//! is either controllable (the supervisor may disable it) or uncontrollable
//! (once enabled, it cannot be prevented).
//!
//! # Reference
//! Cassandras & Lafortune (2008), "Introduction to Discrete Event Systems", Ch. 3

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a supervisor may disable an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Controllability {
    /// The supervisor may prevent this event.
    Controllable,
    /// The event occurs on its own once enabled.
    Uncontrollable,
}

/// An atomic occurrence identified by its label.
///
/// Labels are unique within an alphabet. Two events with the same label but
/// different controllability are rejected by [`crate::validation`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    /// Unique label within an alphabet.
    pub label: String,
    /// Controllability flag.
    pub controllability: Controllability,
}

impl Event {
    /// Creates an event.
    pub fn new(label: impl Into<String>, controllability: Controllability) -> Self {
        Self {
            label: label.into(),
            controllability,
        }
    }

    /// Creates a controllable event.
    pub fn controllable(label: impl Into<String>) -> Self {
        Self::new(label, Controllability::Controllable)
    }

    /// Creates an uncontrollable event.
    pub fn uncontrollable(label: impl Into<String>) -> Self {
        Self::new(label, Controllability::Uncontrollable)
    }

    /// Whether the supervisor may disable this event.
    #[inline]
    pub fn is_controllable(&self) -> bool {
        self.controllability == Controllability::Controllable
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
