//! Timed sequence generation over concurrent local supervisors.
//!
//! Each local supervisor (inverse projected onto the full alphabet) keeps
//! its own current state. Per step:
//! 1. Joint-enabled set: events enabled by every supervisor.
//! 2. Combined score: sum of the supervisors' policy scores per event.
//! 3. With a controllable event in the set, the first eligible event of
//!    the combined ranking fires (same eligibility as the single
//!    generator). With only uncontrollable events, the race rule applies:
//!    among the joint-enabled events whose timer expires first, the first
//!    by label order.
//! 4. Every supervisor steps along the chosen event.
//!
//! For a cyclic problem every supervisor must end in its initial state;
//! otherwise a warning is logged and the time trace gets a `+∞` sentinel.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::execution::Execution;
use super::problem::SchedulingProblem;
use super::sequence::Sequence;
use super::Decision;
use crate::error::SimulationError;
use crate::mdp::{PolicyTable, RankedAction};
use crate::models::{Automaton, Event, StateId};

/// Events enabled by every supervisor at its current state, sorted by label.
///
/// # Panics
/// Panics if `states` is shorter than `supervisors`.
pub fn joint_enabled(supervisors: &[Automaton], states: &[StateId]) -> Vec<Event> {
    let Some((first, rest)) = supervisors.split_first() else {
        return Vec::new();
    };
    let mut enabled: Vec<Event> = first
        .enabled(states[0])
        .filter(|e| {
            rest.iter()
                .zip(&states[1..])
                .all(|(sup, &s)| sup.step_label(s, &e.label).is_some())
        })
        .cloned()
        .collect();
    enabled.sort_by(|a, b| a.label.cmp(&b.label));
    enabled
}

/// Steps every supervisor along `event`.
fn step_all(
    supervisors: &[Automaton],
    states: &[StateId],
    event: &Event,
) -> Result<Vec<StateId>, SimulationError> {
    supervisors
        .iter()
        .zip(states)
        .enumerate()
        .map(|(i, (sup, &s))| {
            sup.step_label(s, &event.label)
                .ok_or_else(|| SimulationError::Desynchronized {
                    supervisor: i,
                    event: event.label.clone(),
                })
        })
        .collect()
}

/// Multi-supervisor simulator.
#[derive(Debug, Clone)]
pub struct ModularCoordinator<'a> {
    problem: &'a SchedulingProblem,
    jitter: Option<(f64, u64)>,
}

impl<'a> ModularCoordinator<'a> {
    /// Creates a coordinator with nominal durations.
    pub fn new(problem: &'a SchedulingProblem) -> Self {
        Self {
            problem,
            jitter: None,
        }
    }

    /// Perturbs every timer reset with seeded Gaussian noise.
    pub fn with_jitter(mut self, std_dev: f64, seed: u64) -> Self {
        self.jitter = Some((std_dev, seed));
        self
    }

    /// Generates the joint event/time trace for a batch of `products`.
    ///
    /// `policies[i]` must have been extracted from `supervisors[i]`.
    ///
    /// # Errors
    /// - [`SimulationError::PolicyMismatch`] for mismatched inputs
    /// - [`SimulationError::NoFeasibleAction`] when the joint-enabled set
    ///   holds no eligible event
    /// - [`SimulationError::Desynchronized`], [`SimulationError::InvalidClock`],
    ///   [`SimulationError::QuotaUnderflow`]
    pub fn generate(
        &self,
        supervisors: &[Automaton],
        policies: &[PolicyTable],
        products: u32,
    ) -> Result<Sequence, SimulationError> {
        if supervisors.is_empty() || supervisors.len() != policies.len() {
            return Err(SimulationError::PolicyMismatch(format!(
                "{} supervisor(s) for {} policy table(s)",
                supervisors.len(),
                policies.len()
            )));
        }
        if let Some(i) = (0..supervisors.len()).find(|&i| !policies[i].matches(&supervisors[i])) {
            return Err(SimulationError::PolicyMismatch(format!(
                "policy {i} does not belong to supervisor '{}'",
                supervisors[i].name()
            )));
        }

        let initial: Vec<StateId> = supervisors.iter().map(Automaton::initial).collect();
        let mut states = initial.clone();
        let mut execution = Execution::start(
            self.problem,
            &Self::alphabet(supervisors),
            products,
            self.jitter,
        );
        let mut events = Vec::new();
        let mut times = Vec::new();

        for step in 0..self.problem.budget(products) {
            match self.decide(supervisors, policies, &states, &execution)? {
                Decision::Fired { event, successor } => {
                    let label = Self::joint_label(supervisors, &states);
                    execution.fire(&event, &label)?;
                    times.push(execution.clock().elapsed());
                    events.push(event);
                    states = successor;
                }
                Decision::Infeasible => {
                    if states == initial && execution.restriction().is_exhausted() {
                        break;
                    }
                    return Err(SimulationError::NoFeasibleAction {
                        step,
                        state: Self::joint_label(supervisors, &states),
                    });
                }
            }
        }

        let completed = if self.problem.cyclic {
            states == initial
        } else {
            execution.restriction().is_exhausted()
        };
        if !completed {
            warn!(
                problem = %self.problem.name,
                state = %Self::joint_label(supervisors, &states),
                "modular sequence did not return to the initial states"
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
            supervisors = supervisors.len(),
            products,
            steps = sequence.len(),
            makespan = sequence.makespan(),
            "modular sequence generated"
        );
        Ok(sequence)
    }

    fn decide(
        &self,
        supervisors: &[Automaton],
        policies: &[PolicyTable],
        states: &[StateId],
        execution: &Execution<'_>,
    ) -> Result<Decision<Vec<StateId>>, SimulationError> {
        let ranking = self.combined_ranking(supervisors, policies, states);

        let chosen = if ranking.iter().any(|a| a.event.is_controllable()) {
            ranking
                .into_iter()
                .find(|a| execution.is_eligible(&a.event))
                .map(|a| a.event)
        } else {
            self.race(ranking, execution)
        };

        let Some(event) = chosen else {
            return Ok(Decision::Infeasible);
        };
        let successor = step_all(supervisors, states, &event)?;
        Ok(Decision::Fired { event, successor })
    }

    /// Joint-enabled events ranked by summed score.
    fn combined_ranking(
        &self,
        supervisors: &[Automaton],
        policies: &[PolicyTable],
        states: &[StateId],
    ) -> Vec<RankedAction> {
        let enabled = joint_enabled(supervisors, states);
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for (policy, &s) in policies.iter().zip(states) {
            for action in policy.ranked(s) {
                *totals.entry(action.event.label.as_str()).or_insert(0.0) += action.score;
            }
        }

        let mut ranking: Vec<RankedAction> = enabled
            .into_iter()
            .map(|event| {
                let score = totals.get(event.label.as_str()).copied().unwrap_or(0.0);
                RankedAction { event, score }
            })
            .collect();
        let tie_break = self.problem.tie_break;
        ranking.sort_by(|a, b| tie_break.compare(a, b));
        ranking
    }

    /// Race among the ranked uncontrollable events: earliest timer wins,
    /// ties by label.
    fn race(&self, ranking: Vec<RankedAction>, execution: &Execution<'_>) -> Option<Event> {
        let clock = execution.clock();
        let running: Vec<(Event, f64)> = ranking
            .into_iter()
            .map(|a| {
                let remaining = clock.remaining(&a.event.label);
                (a.event, remaining)
            })
            .filter(|(_, remaining)| remaining.is_finite())
            .collect();
        let earliest = running.iter().map(|&(_, r)| r).reduce(f64::min)?;
        let tie_break = self.problem.tie_break;
        running
            .into_iter()
            .filter(|&(_, remaining)| remaining <= earliest)
            .map(|(e, _)| e)
            .min_by(|a, b| tie_break.compare_labels(&a.label, &b.label))
    }

    fn alphabet(supervisors: &[Automaton]) -> Vec<Event> {
        let mut merged: BTreeMap<&str, &Event> = BTreeMap::new();
        for sup in supervisors {
            for e in sup.events() {
                merged.entry(e.label.as_str()).or_insert(e);
            }
        }
        merged.into_values().cloned().collect()
    }

    fn joint_label(supervisors: &[Automaton], states: &[StateId]) -> String {
        supervisors
            .iter()
            .zip(states)
            .map(|(sup, &s)| sup.state(s).label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::tests::{buffer, machine, shared_resource};
    use crate::mdp::{self, ParallelismReward, SolverConfig, TieBreak};
    use crate::scheduler::problem::tests::shared_resource_problem;
    use crate::models::State;
    use crate::scheduler::{SequenceGenerator, TimingModel};
    use crate::synthesis::{local_modular_supervisors, monolithic_supervisor};

    fn plan_all(supervisors: &[Automaton], tie_break: TieBreak) -> Vec<PolicyTable> {
        supervisors
            .iter()
            .map(|s| mdp::plan(s, &ParallelismReward, &SolverConfig::default(), tie_break).unwrap())
            .collect()
    }

    /// `p0 -x-> p1 -s-> p0` or `p0 -s-> p1 -x-> p0` with shared `s`.
    fn local(name: &str, private: &str, shared_first: bool) -> Automaton {
        let p0 = State::marked(format!("{name}0"));
        let p1 = State::unmarked(format!("{name}1"));
        let (a, b) = if shared_first {
            (Event::controllable("s"), Event::controllable(private))
        } else {
            (Event::controllable(private), Event::controllable("s"))
        };
        Automaton::builder(name)
            .with_initial(&p0)
            .with_transition(&p0, &a, &p1)
            .with_transition(&p1, &b, &p0)
            .build()
            .unwrap()
    }

    fn alphabet() -> Vec<Event> {
        vec![
            Event::controllable("s"),
            Event::controllable("x"),
            Event::controllable("y"),
        ]
    }

    #[test]
    fn test_joint_enabled_requires_every_supervisor() {
        let a = local("a", "x", true).inverse_projection(&alphabet());
        let b = local("b", "y", true).inverse_projection(&alphabet());
        let states = [a.initial(), b.initial()];
        let labels: Vec<String> = joint_enabled(&[a.clone(), b.clone()], &states)
            .into_iter()
            .map(|e| e.label)
            .collect();
        // x and y are self-loops in the other supervisor but not enabled at home
        assert_eq!(labels, vec!["s".to_string()]);

        let c = local("c", "y", false).inverse_projection(&alphabet());
        let labels: Vec<String> = joint_enabled(&[a, c], &states)
            .into_iter()
            .map(|e| e.label)
            .collect();
        assert_eq!(labels, vec!["y".to_string()]);
    }

    #[test]
    fn test_shared_event_blocked_reports_infeasibility() {
        // Raw local supervisors: s at a's initial state, but b needs y first
        let a = local("a", "x", true);
        let b = local("b", "y", false);
        let sups = vec![a, b];
        let policies = plan_all(&sups, TieBreak::default());
        let problem = SchedulingProblem::new("AB", 4)
            .with_quota("s", 1)
            .with_quota("x", 1)
            .with_quota("y", 1);
        assert!(joint_enabled(&sups, &[sups[0].initial(), sups[1].initial()]).is_empty());
        let err = ModularCoordinator::new(&problem)
            .generate(&sups, &policies, 1)
            .unwrap_err();
        assert!(matches!(err, SimulationError::NoFeasibleAction { step: 0, .. }));
    }

    #[test]
    fn test_shared_event_fires_in_lock_step() {
        let a = local("a", "x", true).inverse_projection(&alphabet());
        let b = local("b", "y", true).inverse_projection(&alphabet());
        let sups = vec![a, b];
        let policies = plan_all(&sups, TieBreak::default());
        let problem = SchedulingProblem::new("AB", 3)
            .with_quota("s", 1)
            .with_quota("x", 1)
            .with_quota("y", 1);
        let seq = ModularCoordinator::new(&problem)
            .generate(&sups, &policies, 1)
            .unwrap();
        assert_eq!(seq.labels()[0], "s");
        assert_eq!(seq.len(), 3);
        assert!(seq.completed);
    }

    fn extended_small_factory() -> (Vec<Automaton>, Vec<Automaton>, SchedulingProblem) {
        let plants = vec![
            machine("M1", "1", "2"),
            machine("M2", "3", "4"),
            machine("M3", "5", "6"),
        ];
        let specs = vec![buffer("E1", "2", "3"), buffer("E2", "4", "5")];
        let problem = SchedulingProblem::new("SFextended", 6)
            .with_quota("1", 1)
            .with_quota("3", 1)
            .with_quota("5", 1)
            .with_timing(
                TimingModel::new()
                    .with_duration("1", "2", 10.0)
                    .with_duration("3", "4", 5.0)
                    .with_duration("5", "6", 5.0),
            );
        (plants, specs, problem)
    }

    #[test]
    fn test_extended_small_factory_matches_monolithic() {
        let (plants, specs, problem) = extended_small_factory();
        let locals = local_modular_supervisors(&plants, &specs).unwrap();
        let policies = plan_all(&locals, problem.tie_break);
        let modular = ModularCoordinator::new(&problem)
            .generate(&locals, &policies, 2)
            .unwrap();
        assert!(modular.completed);
        assert_eq!(modular.len(), 12);

        let mono = monolithic_supervisor(&plants, &specs).unwrap();
        let policy = mdp::plan(
            &mono,
            &ParallelismReward,
            &SolverConfig::default(),
            problem.tie_break,
        )
        .unwrap();
        let single = SequenceGenerator::new(&problem)
            .generate(&mono, &policy, 2)
            .unwrap();
        assert!(single.completed);

        // Every product passes through all three machines
        for seq in [&modular, &single] {
            for label in ["1", "2", "3", "4", "5", "6"] {
                assert_eq!(seq.labels().iter().filter(|&&l| l == label).count(), 2);
            }
        }
    }

    #[test]
    fn test_cyclic_mismatch_appends_sentinel() {
        let (plants, specs, problem) = extended_small_factory();
        let locals = local_modular_supervisors(&plants, &specs).unwrap();
        let policies = plan_all(&locals, problem.tie_break);
        // Too few steps to bring the parts home
        let short = SchedulingProblem {
            depth: 3,
            ..problem
        };
        let seq = ModularCoordinator::new(&short)
            .generate(&locals, &policies, 1)
            .unwrap();
        assert!(!seq.completed);
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.times.last().copied(), Some(f64::INFINITY));
    }

    #[test]
    fn test_race_ignores_timers_outside_joint_set() {
        let alphabet = vec![
            Event::controllable("c"),
            Event::uncontrollable("u"),
            Event::uncontrollable("w"),
        ];
        let problem = SchedulingProblem::new("race", 2)
            .with_quota("c", 1)
            .with_timing(
                TimingModel::new()
                    .with_duration("c", "u", 5.0)
                    .with_duration("c", "w", 1.0),
            );
        let mut execution = Execution::start(&problem, &alphabet, 1, None);
        execution.fire(&alphabet[0], "start").unwrap();

        // w expires first but only u is jointly enabled
        let ranking = vec![RankedAction {
            event: alphabet[1].clone(),
            score: 0.0,
        }];
        let coordinator = ModularCoordinator::new(&problem);
        assert_eq!(
            coordinator.race(ranking, &execution),
            Some(alphabet[1].clone())
        );

        let both = vec![
            RankedAction {
                event: alphabet[2].clone(),
                score: 0.0,
            },
            RankedAction {
                event: alphabet[1].clone(),
                score: 1.0,
            },
        ];
        assert_eq!(coordinator.race(both, &execution), Some(alphabet[2].clone()));
        assert_eq!(coordinator.race(Vec::new(), &execution), None);
    }

    #[test]
    fn test_step_all_reports_desynchronized_supervisor() {
        let a = local("a", "x", true).inverse_projection(&alphabet());
        let b = local("b", "y", true);
        let sups = [a, b];
        let states = [sups[0].initial(), sups[1].initial()];

        let next = step_all(&sups, &states, &Event::controllable("s")).unwrap();
        assert_eq!(next.len(), 2);
        assert_ne!(next[0], states[0]);

        // y is a self-loop in a but b only takes it after s
        let err = step_all(&sups, &states, &Event::controllable("y")).unwrap_err();
        assert_eq!(
            err,
            SimulationError::Desynchronized {
                supervisor: 1,
                event: "y".to_string(),
            }
        );
    }

    #[test]
    fn test_paired_alternation_in_lock_step() {
        let problem = shared_resource_problem();
        let sups = vec![shared_resource()];
        let policies = plan_all(&sups, problem.tie_break);
        let seq = ModularCoordinator::new(&problem)
            .generate(&sups, &policies, 3)
            .unwrap();
        assert!(seq.completed);
        assert_eq!(
            seq.labels(),
            vec!["a", "fa", "b", "fb", "a", "fa", "b", "fb", "a", "fa", "b", "fb"]
        );
    }

    #[test]
    fn test_mismatched_inputs() {
        let (plants, specs, problem) = extended_small_factory();
        let locals = local_modular_supervisors(&plants, &specs).unwrap();
        let policies = plan_all(&locals[..1], problem.tie_break);
        assert!(matches!(
            ModularCoordinator::new(&problem).generate(&locals, &policies, 1),
            Err(SimulationError::PolicyMismatch(_))
        ));
    }
}
