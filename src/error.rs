//! Error types for each layer of the planning pipeline.
//!
//! | Error | Raised by | Fatal for |
//! |-------|-----------|-----------|
//! | [`ModelError`] | automaton building, composition | the model definition |
//! | [`SynthesisError`] | monolithic / local modular synthesis | the supervisor |
//! | [`SolveError`] | value iteration, policy extraction | the policy |
//! | [`SimulationError`] | sequence generation | one batch run |
//!
//! A schedule that runs out of steps before reaching its target state is
//! **not** an error: it is returned with a `+∞` time sentinel so the caller
//! may retry with a larger depth bound.

use thiserror::Error;

use crate::validation::ValidationError;

/// Invalid automaton definitions or incompatible components.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// The automaton definition failed structural validation.
    #[error("invalid automaton '{name}': {} issue(s)", errors.len())]
    Invalid {
        /// Automaton name.
        name: String,
        /// Every detected issue.
        errors: Vec<ValidationError>,
    },

    /// Two components disagree on whether an event is controllable.
    #[error("event '{label}' is controllable in one component and uncontrollable in another")]
    ConflictingEvent {
        /// Offending event label.
        label: String,
    },

    /// Composition of an empty component list.
    #[error("cannot compose an empty list of automata")]
    EmptyComposition,
}

/// Supervisor synthesis failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthesisError {
    /// Model-level error in one of the inputs.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// No plant automaton was supplied.
    #[error("synthesis requires at least one plant automaton")]
    NoPlants,

    /// The controllability/trim fixed point removed the initial state.
    #[error("no controllable and non-blocking supervisor exists for '{name}'")]
    EmptySupervisor {
        /// Name of the product that was synthesized.
        name: String,
    },

    /// A local specification shares no event with any plant.
    #[error("specification '{name}' shares no event with any plant")]
    UnconstrainedSpecification {
        /// Specification name.
        name: String,
    },

    /// Local modular supervisors block each other when run jointly.
    #[error("local modular supervisors are conflicting: {blocking_states} blocking joint state(s), e.g. '{example}'")]
    Conflicting {
        /// Number of reachable joint states that cannot reach a marked state.
        blocking_states: usize,
        /// Label of one blocking joint state.
        example: String,
    },

    /// The joint local behaviour differs from the monolithic supervisor.
    #[error("local modular behaviour differs from monolithic supervisor at '{state}': {reason}")]
    ModularMismatch {
        /// Joint state label where the difference was found.
        state: String,
        /// Description of the difference.
        reason: String,
    },
}

/// Value iteration and policy extraction failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    /// Discount factor outside the open interval (0, 1).
    #[error("discount factor must lie in (0, 1), got {0}")]
    InvalidDiscount(f64),

    /// Stopping threshold is not a positive finite number.
    #[error("stopping threshold must be positive and finite, got {0}")]
    InvalidThreshold(f64),

    /// The iteration cap was reached before the stopping rule held.
    #[error("value iteration did not converge after {iterations} sweeps (residual {residual})")]
    NotConverged {
        /// Sweeps performed.
        iterations: usize,
        /// Aggregate change of the last sweep.
        residual: f64,
    },

    /// The value table was computed for a different transition table.
    #[error("value table has {values} entries but the transition table has {states} states")]
    ValueTableMismatch {
        /// Entries in the value table.
        values: usize,
        /// States in the transition table.
        states: usize,
    },
}

/// Fatal conditions while generating a timed sequence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// No entry of the ranked policy list is temporally and quota feasible.
    #[error("no feasible action at step {step} in state '{state}'")]
    NoFeasibleAction {
        /// Zero-based step index.
        step: usize,
        /// Current state label (joint label for modular runs).
        state: String,
    },

    /// A clock became negative or NaN after firing an event.
    #[error("clock of event '{event}' became {value} after firing in state '{state}'")]
    InvalidClock {
        /// Event whose clock is invalid.
        event: String,
        /// State in which the offending event fired.
        state: String,
        /// Offending value.
        value: f64,
    },

    /// A controllable event fired with no remaining quota.
    #[error("quota of event '{event}' exhausted in state '{state}'")]
    QuotaUnderflow {
        /// Event label.
        event: String,
        /// State label.
        state: String,
    },

    /// The configured target state does not exist in the supervisor.
    #[error("target state '{0}' not found in supervisor")]
    UnknownTargetState(String),

    /// Policy tables do not match the supervisors they are used with.
    #[error("policy mismatch: {0}")]
    PolicyMismatch(String),

    /// A local supervisor has no transition for the jointly chosen event.
    #[error("supervisor {supervisor} cannot follow event '{event}'")]
    Desynchronized {
        /// Index of the supervisor.
        supervisor: usize,
        /// Event label.
        event: String,
    },
}
