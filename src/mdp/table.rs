//! Transition probability table.
//!
//! Controllable events are deterministic actions. Uncontrollable events
//! enabled at the same state race each other: choosing an uncontrollable
//! action lands on any of the `k` racing destinations with probability
//! `1/k`.

use serde::{Deserialize, Serialize};

use crate::models::{Automaton, Event, EventId, State, StateId};

/// One possible successor of an action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Successor state.
    pub successor: StateId,
    /// Probability of reaching it.
    pub probability: f64,
}

/// An action `(state, event)` with its successor distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Triggering event.
    pub event: EventId,
    /// Successor distribution; probabilities sum to one.
    pub outcomes: Vec<Outcome>,
}

/// Probabilistic action model of a supervisor, grouped by origin state.
///
/// Carries a copy of the supervisor's states and alphabet so reward
/// functions can be evaluated without the automaton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionProbabilityTable {
    states: Vec<State>,
    events: Vec<Event>,
    actions: Vec<Vec<Action>>,
}

impl TransitionProbabilityTable {
    /// Builds the table of a supervisor.
    ///
    /// # Complexity
    /// O(Σ_s |enabled(s)| · k_s) where `k_s` is the number of uncontrollable
    /// events enabled at `s`.
    pub fn build(supervisor: &Automaton) -> Self {
        let actions = (0..supervisor.state_count())
            .map(|s| Self::actions_of(supervisor, StateId(s)))
            .collect();

        Self {
            states: supervisor.states().to_vec(),
            events: supervisor.events().to_vec(),
            actions,
        }
    }

    fn actions_of(supervisor: &Automaton, state: StateId) -> Vec<Action> {
        let outgoing = supervisor.outgoing(state);
        let racing: Vec<(EventId, StateId)> = outgoing
            .iter()
            .copied()
            .filter(|&(e, _)| !supervisor.event(e).is_controllable())
            .collect();

        outgoing
            .iter()
            .map(|&(event, destination)| {
                if supervisor.event(event).is_controllable() {
                    return Action {
                        event,
                        outcomes: vec![Outcome {
                            successor: destination,
                            probability: 1.0,
                        }],
                    };
                }

                let p = 1.0 / racing.len() as f64;
                // Own destination first, then the other racers in event order
                let outcomes = std::iter::once(destination)
                    .chain(
                        racing
                            .iter()
                            .filter(|&&(other, _)| other != event)
                            .map(|&(_, d)| d),
                    )
                    .map(|successor| Outcome {
                        successor,
                        probability: p,
                    })
                    .collect();
                Action { event, outcomes }
            })
            .collect()
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// State by id.
    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.0]
    }

    /// Event by id.
    pub fn event(&self, id: EventId) -> &Event {
        &self.events[id.0]
    }

    /// Actions available at a state, sorted by event.
    #[inline]
    pub fn actions(&self, state: StateId) -> &[Action] {
        &self.actions[state.0]
    }

    /// Total number of actions.
    pub fn action_count(&self) -> usize {
        self.actions.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::tests::{buffer, machine};
    use crate::synthesis::monolithic_supervisor;

    fn small_factory_table() -> (Automaton, TransitionProbabilityTable) {
        let sup = monolithic_supervisor(
            &[machine("M1", "1", "2"), machine("M2", "3", "4")],
            &[buffer("E", "2", "3")],
        )
        .unwrap();
        let table = TransitionProbabilityTable::build(&sup);
        (sup, table)
    }

    #[test]
    fn test_one_action_per_transition() {
        let (sup, table) = small_factory_table();
        assert_eq!(table.state_count(), sup.state_count());
        assert_eq!(table.action_count(), sup.transition_count());
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (sup, table) = small_factory_table();
        for s in 0..table.state_count() {
            for action in table.actions(StateId(s)) {
                let total: f64 = action.outcomes.iter().map(|o| o.probability).sum();
                assert!((total - 1.0).abs() < 1e-12, "state {}", sup.state(StateId(s)));
            }
        }
    }

    #[test]
    fn test_controllable_actions_are_deterministic() {
        let (sup, table) = small_factory_table();
        let init = sup.initial();
        let actions = table.actions(init);
        assert_eq!(actions.len(), 1);
        assert!(table.event(actions[0].event).is_controllable());
        assert_eq!(actions[0].outcomes.len(), 1);
        assert_eq!(
            Some(actions[0].outcomes[0].successor),
            sup.step_label(init, "1")
        );
    }

    #[test]
    fn test_uncontrollable_race() {
        // Both machines busy: events 2 and 4 race
        let (sup, table) = small_factory_table();
        let both = sup.state_id("1|1|E").unwrap();
        let actions: Vec<&Action> = table
            .actions(both)
            .iter()
            .filter(|a| !table.event(a.event).is_controllable())
            .collect();
        assert_eq!(actions.len(), 2);
        for action in actions {
            assert_eq!(action.outcomes.len(), 2);
            assert!((action.outcomes[0].probability - 0.5).abs() < 1e-12);
            let own = sup.step(both, action.event);
            assert_eq!(Some(action.outcomes[0].successor), own);
        }
    }
}
