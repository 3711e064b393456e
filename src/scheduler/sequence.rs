//! Timed sequence generation for a single supervisor.
//!
//! # Algorithm
//!
//! For at most `products × depth` steps:
//! 1. Walk the ranked policy list of the current state and take the first
//!    event that is not preempted by an earlier uncontrollable timer, has
//!    quota left (controllable events) and satisfies every declared
//!    alternation.
//! 2. Fire it: spend quota, update the clocks, move the supervisor.
//! 3. Record the event and the elapsed time.
//!
//! No eligible event is a model inconsistency and aborts the run, except
//! when the batch is already finished (target state, quotas spent). A run
//! that ends off-target gets a `+∞` time sentinel instead of an error.

use tracing::{debug, warn};

use super::execution::Execution;
use super::problem::SchedulingProblem;
use super::Decision;
use crate::error::SimulationError;
use crate::mdp::PolicyTable;
use crate::models::{Automaton, Event, StateId};

/// Generated event trace with elapsed times.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    /// Fired events in order.
    pub events: Vec<Event>,
    /// Elapsed time after each event; a trailing `+∞` marks an
    /// incomplete schedule.
    pub times: Vec<f64>,
    /// Whether the run ended where it was expected to.
    pub completed: bool,
}

impl Sequence {
    /// Event labels in firing order.
    pub fn labels(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.label.as_str()).collect()
    }

    /// Elapsed time of the last fired event (0 for an empty trace).
    pub fn makespan(&self) -> f64 {
        self.times
            .iter()
            .rev()
            .copied()
            .find(|t| t.is_finite())
            .unwrap_or(0.0)
    }

    /// Number of fired events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no event fired.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Single-supervisor simulator.
///
/// # Example
/// ```
/// use u_desplan::mdp::{self, ParallelismReward, SolverConfig};
/// use u_desplan::models::{Automaton, Event, State};
/// use u_desplan::scheduler::{SchedulingProblem, SequenceGenerator, TimingModel};
///
/// let idle = State::marked("0");
/// let busy = State::unmarked("1").with_tasks(1.0);
/// let machine = Automaton::builder("M1")
///     .with_initial(&idle)
///     .with_transition(&idle, &Event::controllable("1"), &busy)
///     .with_transition(&busy, &Event::uncontrollable("2"), &idle)
///     .build()
///     .unwrap();
///
/// let problem = SchedulingProblem::new("M1", 2)
///     .with_quota("1", 1)
///     .with_timing(TimingModel::new().with_duration("1", "2", 10.0));
/// let policy = mdp::plan(&machine, &ParallelismReward, &SolverConfig::default(), problem.tie_break).unwrap();
///
/// let seq = SequenceGenerator::new(&problem).generate(&machine, &policy, 3).unwrap();
/// assert_eq!(seq.labels(), vec!["1", "2", "1", "2", "1", "2"]);
/// assert_eq!(seq.makespan(), 30.0);
/// ```
#[derive(Debug, Clone)]
pub struct SequenceGenerator<'a> {
    problem: &'a SchedulingProblem,
    jitter: Option<(f64, u64)>,
}

impl<'a> SequenceGenerator<'a> {
    /// Creates a generator with nominal durations.
    pub fn new(problem: &'a SchedulingProblem) -> Self {
        Self {
            problem,
            jitter: None,
        }
    }

    /// Perturbs every timer reset with Gaussian noise of `std_dev`, seeded
    /// with `seed` at the start of each run.
    pub fn with_jitter(mut self, std_dev: f64, seed: u64) -> Self {
        self.jitter = Some((std_dev, seed));
        self
    }

    /// Generates the event/time trace for a batch of `products`.
    ///
    /// # Errors
    /// - [`SimulationError::PolicyMismatch`] when `policy` was not extracted
    ///   from `supervisor`
    /// - [`SimulationError::UnknownTargetState`]
    /// - [`SimulationError::NoFeasibleAction`], [`SimulationError::InvalidClock`]
    ///   and [`SimulationError::QuotaUnderflow`] abort the run
    pub fn generate(
        &self,
        supervisor: &Automaton,
        policy: &PolicyTable,
        products: u32,
    ) -> Result<Sequence, SimulationError> {
        if !policy.matches(supervisor) {
            return Err(SimulationError::PolicyMismatch(format!(
                "policy does not belong to supervisor '{}'",
                supervisor.name()
            )));
        }
        let target = match &self.problem.target {
            Some(label) => supervisor
                .state_id(label)
                .ok_or_else(|| SimulationError::UnknownTargetState(label.clone()))?,
            None => supervisor.initial(),
        };

        let mut execution =
            Execution::start(self.problem, supervisor.events(), products, self.jitter);
        let mut state = supervisor.initial();
        let mut events = Vec::new();
        let mut times = Vec::new();

        for step in 0..self.problem.budget(products) {
            match self.decide(supervisor, policy, state, &execution) {
                Decision::Fired { event, successor } => {
                    execution.fire(&event, &supervisor.state(state).label)?;
                    times.push(execution.clock().elapsed());
                    events.push(event);
                    state = successor;
                }
                Decision::Infeasible => {
                    if state == target && execution.restriction().is_exhausted() {
                        break;
                    }
                    return Err(SimulationError::NoFeasibleAction {
                        step,
                        state: supervisor.state(state).label.clone(),
                    });
                }
            }
        }

        let completed = state == target;
        if !completed {
            warn!(
                problem = %self.problem.name,
                state = %supervisor.state(state),
                "sequence ended off target"
            );
            times.push(f64::INFINITY);
        }

        let sequence = Sequence {
            events,
            times,
            completed,
        };
        debug!(
            problem = %self.problem.name,
            products,
            steps = sequence.len(),
            makespan = sequence.makespan(),
            "sequence generated"
        );
        Ok(sequence)
    }

    /// First eligible entry of the ranked policy list.
    fn decide(
        &self,
        supervisor: &Automaton,
        policy: &PolicyTable,
        state: StateId,
        execution: &Execution<'_>,
    ) -> Decision {
        policy
            .ranked(state)
            .iter()
            .filter(|a| execution.is_eligible(&a.event))
            .find_map(|a| {
                supervisor
                    .step_label(state, &a.event.label)
                    .map(|successor| Decision::Fired {
                        event: a.event.clone(),
                        successor,
                    })
            })
            .unwrap_or(Decision::Infeasible)
    }
}
