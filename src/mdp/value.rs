//! Value iteration.
//!
//! # Algorithm
//!
//! Synchronous Bellman sweeps over two buffers:
//!
//! ```text
//! V_next[s] = max(0, max_e Σ_s' P(s,e,s') · (r(s,e,s') + γ · V_prev[s']))
//! ```
//!
//! States without actions keep value 0. Sweeps stop once the aggregate
//! change `Σ_s |V_next[s] − V_prev[s]|` falls below the threshold. This is
//! a practical stopping rule, not a sup-norm error bound.
//!
//! # Reference
//! Puterman (1994), "Markov Decision Processes", §6.3

use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use super::table::{Action, TransitionProbabilityTable};
use super::Reward;
use crate::error::SolveError;
use crate::models::StateId;

/// Discount and stopping parameters.
///
/// # Example
/// ```
/// use u_desplan::mdp::SolverConfig;
///
/// let config = SolverConfig::default().with_gamma(0.9);
/// assert_eq!(config.threshold, 0.001);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Discount factor in (0, 1).
    pub gamma: f64,
    /// Stopping threshold on the aggregate change of one sweep.
    pub threshold: f64,
    /// Sweep cap.
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            gamma: 0.7,
            threshold: 0.001,
            max_iterations: 100_000,
        }
    }
}

impl SolverConfig {
    /// Sets the discount factor.
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Sets the stopping threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the sweep cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Checks the discount factor and the threshold.
    pub fn validate(&self) -> Result<(), SolveError> {
        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(SolveError::InvalidDiscount(self.gamma));
        }
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(SolveError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}

/// Converged value per state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueTable {
    values: Vec<f64>,
    iterations: usize,
    residual: f64,
}

impl ValueTable {
    /// Value of a state.
    #[inline]
    pub fn value(&self, state: StateId) -> f64 {
        self.values[state.0]
    }

    /// All values, indexed by state id.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Sweeps performed.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Aggregate change of the last sweep.
    pub fn residual(&self) -> f64 {
        self.residual
    }

    /// Sum of all values.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// Runs value iteration to convergence.
///
/// # Errors
/// - [`SolveError::InvalidDiscount`] / [`SolveError::InvalidThreshold`]
/// - [`SolveError::NotConverged`] when `max_iterations` sweeps are not enough
pub fn solve(
    table: &TransitionProbabilityTable,
    reward: &dyn Reward,
    config: &SolverConfig,
) -> Result<ValueTable, SolveError> {
    config.validate()?;

    let n = table.state_count();
    let mut prev = vec![0.0; n];
    let mut next = vec![0.0; n];
    let mut residual = f64::INFINITY;

    for iteration in 1..=config.max_iterations {
        sweep(table, reward, config.gamma, &prev, &mut next);
        residual = prev
            .iter()
            .zip(&next)
            .map(|(a, b)| (a - b).abs())
            .sum::<f64>();
        trace!(iteration, residual, "value iteration sweep");
        std::mem::swap(&mut prev, &mut next);

        if residual < config.threshold {
            info!(
                reward = reward.name(),
                iterations = iteration,
                residual,
                "value iteration converged"
            );
            return Ok(ValueTable {
                values: prev,
                iterations: iteration,
                residual,
            });
        }
    }

    Err(SolveError::NotConverged {
        iterations: config.max_iterations,
        residual,
    })
}

/// One synchronous sweep: reads only `prev`, writes only `next`.
///
/// # Panics
/// Panics if `prev` or `next` is shorter than the table's state count.
pub fn sweep(
    table: &TransitionProbabilityTable,
    reward: &dyn Reward,
    gamma: f64,
    prev: &[f64],
    next: &mut [f64],
) {
    for (s, slot) in next.iter_mut().enumerate().take(table.state_count()) {
        let state = StateId(s);
        *slot = table
            .actions(state)
            .iter()
            .map(|a| q_value(table, reward, gamma, prev, state, a))
            .fold(0.0, f64::max);
    }
}

/// Expected discounted return of one action against a value vector.
pub(crate) fn q_value(
    table: &TransitionProbabilityTable,
    reward: &dyn Reward,
    gamma: f64,
    values: &[f64],
    origin: StateId,
    action: &Action,
) -> f64 {
    let from = table.state(origin);
    let event = table.event(action.event);
    action
        .outcomes
        .iter()
        .map(|o| {
            let r = reward.reward(from, event, table.state(o.successor));
            o.probability * (r + gamma * values[o.successor.0])
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::tests::{buffer, machine};
    use crate::mdp::{BufferReward, EventReward, ParallelismReward};
    use crate::models::Automaton;
    use crate::synthesis::monolithic_supervisor;

    fn small_factory() -> Automaton {
        monolithic_supervisor(
            &[machine("M1", "1", "2"), machine("M2", "3", "4")],
            &[buffer("E", "2", "3")],
        )
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let c = SolverConfig::default();
        assert_eq!(c.gamma, 0.7);
        assert_eq!(c.threshold, 0.001);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let table = TransitionProbabilityTable::build(&small_factory());
        let bad_gamma = SolverConfig::default().with_gamma(1.0);
        assert!(matches!(
            solve(&table, &ParallelismReward, &bad_gamma),
            Err(SolveError::InvalidDiscount(_))
        ));
        let bad_threshold = SolverConfig::default().with_threshold(0.0);
        assert!(matches!(
            solve(&table, &ParallelismReward, &bad_threshold),
            Err(SolveError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_converges_with_positive_values() {
        let table = TransitionProbabilityTable::build(&small_factory());
        let v = solve(&table, &ParallelismReward, &SolverConfig::default()).unwrap();
        assert!(v.iterations() > 1);
        assert!(v.residual() < 0.001);
        assert!(v.values().iter().all(|&x| x > 0.0));
    }

    #[test]
    fn test_value_sums_are_non_decreasing() {
        let table = TransitionProbabilityTable::build(&small_factory());
        let n = table.state_count();
        let mut prev = vec![0.0; n];
        let mut next = vec![0.0; n];
        let mut last_sum = 0.0;
        for _ in 0..50 {
            sweep(&table, &ParallelismReward, 0.7, &prev, &mut next);
            let sum: f64 = next.iter().sum();
            assert!(sum >= last_sum - 1e-12);
            last_sum = sum;
            std::mem::swap(&mut prev, &mut next);
        }
    }

    #[test]
    fn test_not_converged() {
        let table = TransitionProbabilityTable::build(&small_factory());
        let config = SolverConfig::default()
            .with_threshold(1e-12)
            .with_max_iterations(2);
        assert!(matches!(
            solve(&table, &ParallelismReward, &config),
            Err(SolveError::NotConverged { iterations: 2, .. })
        ));
    }

    #[test]
    fn test_zero_reward_gives_zero_values() {
        let table = TransitionProbabilityTable::build(&small_factory());
        let v = solve(&table, &EventReward::new(), &SolverConfig::default()).unwrap();
        assert_eq!(v.iterations(), 1);
        assert_eq!(v.total(), 0.0);
    }

    #[test]
    fn test_buffer_reward_prefers_full_buffer() {
        let sup = small_factory();
        let table = TransitionProbabilityTable::build(&sup);
        let v = solve(&table, &BufferReward, &SolverConfig::default()).unwrap();
        // Finishing M1 fills the buffer, so the busy state is worth more
        let busy = sup.state_id("1|0|E").unwrap();
        let idle = sup.initial();
        assert!(v.value(busy) > v.value(idle));
    }
}
