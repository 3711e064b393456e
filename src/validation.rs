//! Input validation for automaton definitions.
//!
//! Checks structural integrity of a labeled transition list before it is
//! turned into an [`Automaton`](crate::models::Automaton). Detects:
//! - Missing initial state
//! - Empty labels
//! - One event label used with two controllabilities
//! - One state label used with two markings
//! - Non-determinism (two destinations for one origin/event pair)
//!
//! All issues are collected; validation does not stop at the first one.

use crate::models::{Event, State};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{kind:?}: {message}")]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationErrorKind {
    /// No initial state was given.
    MissingInitialState,
    /// A state or event has an empty label.
    EmptyLabel,
    /// An event label appears as both controllable and uncontrollable.
    ConflictingEvent,
    /// A state label appears as both marked and unmarked.
    ConflictingState,
    /// An origin state has two destinations for the same event.
    NonDeterministic,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates a labeled automaton definition.
///
/// Checks:
/// 1. An initial state is present
/// 2. No state or event has an empty label
/// 3. Each event label has a single controllability
/// 4. Each state label has a single marking
/// 5. At most one destination per (origin, event) pair
///
/// Identical duplicate transitions are not an error.
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_definition(
    name: &str,
    initial: Option<&State>,
    transitions: &[(State, Event, State)],
    extra_events: &[Event],
) -> ValidationResult {
    let mut errors = Vec::new();

    if initial.is_none() {
        errors.push(ValidationError::new(
            ValidationErrorKind::MissingInitialState,
            format!("Automaton '{name}' has no initial state"),
        ));
    }

    // Event labels → controllability
    let mut events: HashMap<&str, &Event> = HashMap::new();
    let all_events = transitions
        .iter()
        .map(|(_, e, _)| e)
        .chain(extra_events.iter());
    for e in all_events {
        if e.label.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyLabel,
                format!("Automaton '{name}' has an event with an empty label"),
            ));
            continue;
        }
        match events.get(e.label.as_str()) {
            Some(prev) if prev.controllability != e.controllability => {
                errors.push(ValidationError::new(
                    ValidationErrorKind::ConflictingEvent,
                    format!(
                        "Event '{}' is declared with two controllabilities in '{name}'",
                        e.label
                    ),
                ));
            }
            Some(_) => {}
            None => {
                events.insert(&e.label, e);
            }
        }
    }

    // State labels → marking
    let mut states: HashMap<&str, &State> = HashMap::new();
    let all_states = transitions
        .iter()
        .flat_map(|(from, _, to)| [from, to])
        .chain(initial);
    for s in all_states {
        if s.label.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyLabel,
                format!("Automaton '{name}' has a state with an empty label"),
            ));
            continue;
        }
        match states.get(s.label.as_str()) {
            Some(prev) if prev.marking != s.marking => {
                errors.push(ValidationError::new(
                    ValidationErrorKind::ConflictingState,
                    format!(
                        "State '{}' is declared both marked and unmarked in '{name}'",
                        s.label
                    ),
                ));
            }
            Some(_) => {}
            None => {
                states.insert(&s.label, s);
            }
        }
    }

    if let Some(err) = detect_nondeterminism(name, transitions) {
        errors.push(err);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Finds the first (origin, event) pair with two different destinations.
fn detect_nondeterminism(
    name: &str,
    transitions: &[(State, Event, State)],
) -> Option<ValidationError> {
    let mut seen: HashMap<(&str, &str), &str> = HashMap::new();

    for (from, event, to) in transitions {
        let key = (from.label.as_str(), event.label.as_str());
        match seen.get(&key) {
            Some(&dest) if dest != to.label => {
                return Some(ValidationError::new(
                    ValidationErrorKind::NonDeterministic,
                    format!(
                        "State '{}' of '{name}' has two destinations for event '{}'",
                        from.label, event.label
                    ),
                ));
            }
            Some(_) => {}
            None => {
                seen.insert(key, &to.label);
            }
        }
    }

    None
}
