//! Mutable state of one batch run, shared by both generators.

use std::collections::BTreeMap;

use super::clock::{EventClock, Jitter};
use super::problem::SchedulingProblem;
use super::restriction::Restriction;
use crate::error::SimulationError;
use crate::models::Event;

/// Quota, clock and firing counts of a run in progress.
#[derive(Debug, Clone)]
pub(crate) struct Execution<'p> {
    problem: &'p SchedulingProblem,
    restriction: Restriction,
    clock: EventClock,
    counts: BTreeMap<String, u32>,
    jitter: Option<Jitter>,
}

impl<'p> Execution<'p> {
    pub fn start(
        problem: &'p SchedulingProblem,
        alphabet: &[Event],
        products: u32,
        jitter: Option<(f64, u64)>,
    ) -> Self {
        Self {
            problem,
            restriction: problem.initial_restriction(products),
            clock: EventClock::initial(alphabet, &problem.timing),
            counts: BTreeMap::new(),
            jitter: jitter.map(|(std_dev, seed)| Jitter::new(std_dev, seed)),
        }
    }

    pub fn restriction(&self) -> &Restriction {
        &self.restriction
    }

    pub fn clock(&self) -> &EventClock {
        &self.clock
    }

    /// Temporal, quota and alternation feasibility of `event`.
    pub fn is_eligible(&self, event: &Event) -> bool {
        if self.clock.is_preempted(&event.label) || !self.restriction.allows(event) {
            return false;
        }
        !event.is_controllable()
            || self
                .problem
                .alternation_allows(&event.label, &self.counts, &self.restriction)
    }

    /// Applies one firing. Nothing changes if the firing is invalid.
    pub fn fire(&mut self, event: &Event, state: &str) -> Result<(), SimulationError> {
        let restriction = self.restriction.fired(event, state)?;
        let timing = &self.problem.timing;
        let clock = match &mut self.jitter {
            Some(jitter) => self
                .clock
                .fired_with(event, state, timing, |d| jitter.sample(d))?,
            None => self.clock.fired(event, state, timing)?,
        };

        self.restriction = restriction;
        self.clock = clock;
        *self.counts.entry(event.label.clone()).or_insert(0) += 1;
        Ok(())
    }
}
