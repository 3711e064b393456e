//! Timed sequence generation and KPI evaluation.
//!
//! Executes a ranked policy against per-event clocks and production
//! quotas, producing a concrete event trace with elapsed times, either for
//! one monolithic supervisor or for a set of local modular supervisors run
//! in lock-step.
//!
//! # Run state
//!
//! A run owns a fresh [`Restriction`] (quota) and [`EventClock`]; both are
//! replaced, never mutated, on every firing. Supervisors, value tables and
//! policies are shared read-only across runs.
//!
//! # KPI
//!
//! [`SequenceKpi`] computes makespan, throughput and firing counts.
//!
//! # References
//!
//! - Cassandras & Lafortune (2008), "Introduction to Discrete Event Systems", Ch. 5
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 1

mod clock;
mod execution;
mod kpi;
mod modular;
mod problem;
mod restriction;
mod sequence;

pub use clock::{EventClock, Jitter, TimerReset, TimingModel};
pub use kpi::SequenceKpi;
pub use modular::{joint_enabled, ModularCoordinator};
pub use problem::{PairedAlternation, SchedulingProblem};
pub use restriction::Restriction;
pub use sequence::{Sequence, SequenceGenerator};

use crate::models::{Event, StateId};

/// Outcome of one scheduling decision.
///
/// `S` is the successor: one state for a single supervisor, one state per
/// supervisor for modular runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision<S = StateId> {
    /// `event` fires and the run moves to `successor`.
    Fired {
        /// Chosen event.
        event: Event,
        /// Successor state(s).
        successor: S,
    },
    /// No entry of the ranking is feasible.
    Infeasible,
}
