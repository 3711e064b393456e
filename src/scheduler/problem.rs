//! Per-model scheduling data.
//!
//! Everything a sequence generator needs besides the supervisor and its
//! policy: quotas per product, timer resets, the depth bound, the target
//! state, the tie-break convention and declared alternation constraints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::clock::TimingModel;
use super::restriction::Restriction;
use crate::mdp::TieBreak;

/// Two controllable events sharing a resource that must fire in equal
/// counts: neither may fire again before the other has caught up.
///
/// The constraint on an event is waived once its partner has no quota left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedAlternation {
    /// First event label.
    pub first: String,
    /// Second event label.
    pub second: String,
}

impl PairedAlternation {
    /// Creates a constraint between two labels.
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Whether `label` may fire given the firing counts so far.
    pub fn allows(
        &self,
        label: &str,
        counts: &BTreeMap<String, u32>,
        restriction: &Restriction,
    ) -> bool {
        let partner = if label == self.first {
            &self.second
        } else if label == self.second {
            &self.first
        } else {
            return true;
        };
        let own = counts.get(label).copied().unwrap_or(0);
        let other = counts.get(partner.as_str()).copied().unwrap_or(0);
        own <= other || restriction.quota(partner) == 0
    }
}

/// Scheduling data of one model.
///
/// # Example
/// ```
/// use u_desplan::scheduler::{SchedulingProblem, TimingModel};
///
/// let problem = SchedulingProblem::new("SF", 4)
///     .with_quota("1", 1)
///     .with_quota("3", 1)
///     .with_timing(
///         TimingModel::new()
///             .with_duration("1", "2", 25.0)
///             .with_duration("3", "4", 25.0),
///     );
/// assert_eq!(problem.budget(3), 12);
/// assert_eq!(problem.initial_restriction(3).quota("1"), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulingProblem {
    /// Model name.
    pub name: String,
    /// Worst-case path length per product.
    pub depth: usize,
    /// Quota per product for each controllable event.
    pub quotas: BTreeMap<String, u32>,
    /// Timer resets and initial delays.
    pub timing: TimingModel,
    /// Tie-break convention for equal scores and races.
    pub tie_break: TieBreak,
    /// Declared alternation constraints.
    pub alternations: Vec<PairedAlternation>,
    /// Target state label; `None` means the supervisor's initial state.
    pub target: Option<String>,
    /// Whether a finished batch returns every supervisor to its initial state.
    pub cyclic: bool,
}

impl SchedulingProblem {
    /// Creates a cyclic problem with no quotas.
    pub fn new(name: impl Into<String>, depth: usize) -> Self {
        Self {
            name: name.into(),
            depth,
            cyclic: true,
            ..Default::default()
        }
    }

    /// Sets the per-product quota of a controllable event.
    pub fn with_quota(mut self, label: impl Into<String>, per_product: u32) -> Self {
        self.quotas.insert(label.into(), per_product);
        self
    }

    /// Sets the timing model.
    pub fn with_timing(mut self, timing: TimingModel) -> Self {
        self.timing = timing;
        self
    }

    /// Sets the tie-break convention.
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Declares an alternation constraint.
    pub fn with_alternation(mut self, first: impl Into<String>, second: impl Into<String>) -> Self {
        self.alternations.push(PairedAlternation::new(first, second));
        self
    }

    /// Sets the target state label.
    pub fn with_target(mut self, label: impl Into<String>) -> Self {
        self.target = Some(label.into());
        self
    }

    /// Sets whether batches are cyclic.
    pub fn with_cyclic(mut self, cyclic: bool) -> Self {
        self.cyclic = cyclic;
        self
    }

    /// Quotas for a batch of `products`.
    pub fn initial_restriction(&self, products: u32) -> Restriction {
        self.quotas
            .iter()
            .fold(Restriction::new(), |r, (label, &per_product)| {
                r.with_quota(label.clone(), per_product.saturating_mul(products))
            })
    }

    /// Step budget for a batch of `products`.
    pub fn budget(&self, products: u32) -> usize {
        self.depth.saturating_mul(products as usize)
    }

    /// Whether every alternation constraint lets `label` fire.
    pub fn alternation_allows(
        &self,
        label: &str,
        counts: &BTreeMap<String, u32>,
        restriction: &Restriction,
    ) -> bool {
        self.alternations
            .iter()
            .all(|a| a.allows(label, counts, restriction))
    }
}
