//! Policy extraction.
//!
//! Re-scores every action against the converged value table and ranks the
//! actions of each state. The whole ranked list is kept, not only the best
//! action, because the top action may be infeasible at execution time
//! (clock or quota) and the simulator falls through the list.
//!
//! # Ordering
//! 1. Score, descending (quantized to 1e-9)
//! 2. Controllability, per [`ControllabilityOrder`]
//! 3. Label, per [`LabelOrder`]
//!
//! Labels are unique within a state, so the order is total.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::table::TransitionProbabilityTable;
use super::value::{q_value, SolverConfig, ValueTable};
use super::Reward;
use crate::error::SolveError;
use crate::models::{Automaton, Event, StateId};

const SCORE_QUANTUM: f64 = 1e-9;

/// Which controllability wins a score tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControllabilityOrder {
    /// Uncontrollable events first.
    #[default]
    UncontrollableFirst,
    /// Controllable events first.
    ControllableFirst,
}

/// Direction of the final label comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LabelOrder {
    /// Lexicographically smallest label first.
    #[default]
    Ascending,
    /// Lexicographically largest label first.
    Descending,
}

/// Per-model tie-break convention for equal scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TieBreak {
    /// Controllability preference.
    pub controllability: ControllabilityOrder,
    /// Label direction.
    pub label: LabelOrder,
}

impl TieBreak {
    /// Creates a tie-break convention.
    pub fn new(controllability: ControllabilityOrder, label: LabelOrder) -> Self {
        Self {
            controllability,
            label,
        }
    }

    /// Orders two events ignoring scores.
    pub fn compare_events(&self, a: &Event, b: &Event) -> Ordering {
        let by_control = match self.controllability {
            ControllabilityOrder::UncontrollableFirst => {
                a.is_controllable().cmp(&b.is_controllable())
            }
            ControllabilityOrder::ControllableFirst => {
                b.is_controllable().cmp(&a.is_controllable())
            }
        };
        by_control.then_with(|| self.compare_labels(&a.label, &b.label))
    }

    /// Orders two labels.
    pub fn compare_labels(&self, a: &str, b: &str) -> Ordering {
        match self.label {
            LabelOrder::Ascending => a.cmp(b),
            LabelOrder::Descending => b.cmp(a),
        }
    }

    /// Orders two scored actions, best first.
    pub fn compare(&self, a: &RankedAction, b: &RankedAction) -> Ordering {
        quantize(b.score)
            .total_cmp(&quantize(a.score))
            .then_with(|| self.compare_events(&a.event, &b.event))
    }
}

fn quantize(score: f64) -> f64 {
    (score / SCORE_QUANTUM).round()
}

/// A candidate event with its expected discounted return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAction {
    /// Candidate event.
    pub event: Event,
    /// Expected discounted return of firing it.
    pub score: f64,
}

/// Ranked actions per state.
///
/// Indexed by the [`StateId`]s of the supervisor it was extracted from;
/// state labels are kept so a table can be checked against a supervisor
/// after being persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTable {
    entries: Vec<Vec<RankedAction>>,
    state_labels: Vec<String>,
}

impl PolicyTable {
    /// Ranked actions of a state, best first.
    #[inline]
    pub fn ranked(&self, state: StateId) -> &[RankedAction] {
        self.entries.get(state.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Best action of a state.
    pub fn best(&self, state: StateId) -> Option<&RankedAction> {
        self.ranked(state).first()
    }

    /// Score of the event with `label` at a state.
    pub fn score(&self, state: StateId, label: &str) -> Option<f64> {
        self.ranked(state)
            .iter()
            .find(|a| a.event.label == label)
            .map(|a| a.score)
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.entries.len()
    }

    /// Label of a state.
    pub fn state_label(&self, state: StateId) -> Option<&str> {
        self.state_labels.get(state.0).map(String::as_str)
    }

    /// Whether this table was extracted from `supervisor`.
    pub fn matches(&self, supervisor: &Automaton) -> bool {
        self.state_labels.len() == supervisor.state_count()
            && self
                .state_labels
                .iter()
                .zip(supervisor.states())
                .all(|(l, s)| *l == s.label)
    }

    /// Copy with every score divided by the largest score of the table.
    ///
    /// Returns an unchanged copy when no score is positive.
    pub fn normalized(&self) -> PolicyTable {
        let max = self
            .entries
            .iter()
            .flatten()
            .map(|a| a.score)
            .fold(0.0, f64::max);
        let mut table = self.clone();
        if max > 0.0 {
            for action in table.entries.iter_mut().flatten() {
                action.score /= max;
            }
        }
        table
    }
}

/// Extracts the ranked policy of a solved table.
///
/// # Errors
/// - [`SolveError::InvalidDiscount`] for a discount outside (0, 1)
/// - [`SolveError::ValueTableMismatch`] when `values` belongs to another table
pub fn extract_policy(
    table: &TransitionProbabilityTable,
    values: &ValueTable,
    reward: &dyn Reward,
    config: &SolverConfig,
    tie_break: TieBreak,
) -> Result<PolicyTable, SolveError> {
    config.validate()?;
    if values.values().len() != table.state_count() {
        return Err(SolveError::ValueTableMismatch {
            values: values.values().len(),
            states: table.state_count(),
        });
    }

    let entries = (0..table.state_count())
        .map(|s| {
            let state = StateId(s);
            let mut ranked: Vec<RankedAction> = table
                .actions(state)
                .iter()
                .map(|a| RankedAction {
                    event: table.event(a.event).clone(),
                    score: q_value(table, reward, config.gamma, values.values(), state, a),
                })
                .collect();
            ranked.sort_by(|a, b| tie_break.compare(a, b));
            ranked
        })
        .collect();

    let state_labels = (0..table.state_count())
        .map(|s| table.state(StateId(s)).label.clone())
        .collect();

    Ok(PolicyTable {
        entries,
        state_labels,
    })
}
