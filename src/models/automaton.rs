//! Deterministic finite automaton with arena-indexed states.
//!
//! Every state receives a dense [`StateId`] at construction time and every
//! event a dense [`EventId`] (alphabet sorted by label). All downstream
//! tables (probabilities, values, policies) are flat vectors indexed by
//! these ids.
//!
//! Automata are immutable once built; composition, synthesis, and inverse
//! projection produce new automata.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::{Event, Marking, State};
use crate::error::ModelError;
use crate::validation::validate_definition;

/// Dense index of a state within one automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub usize);

/// Dense index of an event within one automaton's alphabet.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EventId(pub usize);

/// One deterministic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Origin state.
    pub origin: StateId,
    /// Triggering event.
    pub event: EventId,
    /// Destination state.
    pub destination: StateId,
}

/// A deterministic finite automaton `(Q, Σ, δ, q0, Qm)`.
///
/// # Invariants
/// - The alphabet is sorted by label and labels are unique.
/// - Each outgoing list is sorted by event and holds at most one entry per
///   event (determinism).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automaton {
    name: String,
    events: Vec<Event>,
    states: Vec<State>,
    outgoing: Vec<Vec<(EventId, StateId)>>,
    initial: StateId,
}

impl Automaton {
    /// Starts a builder for a named automaton.
    pub fn builder(name: impl Into<String>) -> AutomatonBuilder {
        AutomatonBuilder::new(name)
    }

    /// Assembles an automaton from already indexed parts.
    ///
    /// `events` must be sorted by label; outgoing lists are sorted here.
    pub(crate) fn from_parts(
        name: String,
        events: Vec<Event>,
        states: Vec<State>,
        mut outgoing: Vec<Vec<(EventId, StateId)>>,
        initial: StateId,
    ) -> Self {
        debug_assert!(events.windows(2).all(|w| w[0].label < w[1].label));
        debug_assert_eq!(states.len(), outgoing.len());
        for list in &mut outgoing {
            list.sort_by_key(|&(e, _)| e);
            list.dedup_by_key(|&mut (e, _)| e);
        }
        Self {
            name,
            events,
            states,
            outgoing,
            initial,
        }
    }

    /// Automaton name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a copy with a different name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Alphabet, sorted by label.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Event by id.
    #[inline]
    pub fn event(&self, id: EventId) -> &Event {
        &self.events[id.0]
    }

    /// Looks up an event id by label.
    pub fn event_id(&self, label: &str) -> Option<EventId> {
        self.events
            .binary_search_by(|e| e.label.as_str().cmp(label))
            .ok()
            .map(EventId)
    }

    /// All states, indexed by [`StateId`].
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// State by id.
    #[inline]
    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.0]
    }

    /// Looks up a state id by label.
    pub fn state_id(&self, label: &str) -> Option<StateId> {
        self.states
            .iter()
            .position(|s| s.label == label)
            .map(StateId)
    }

    /// Initial state.
    pub fn initial(&self) -> StateId {
        self.initial
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Number of transitions.
    pub fn transition_count(&self) -> usize {
        self.outgoing.iter().map(Vec::len).sum()
    }

    /// Whether a state is marked.
    #[inline]
    pub fn is_marked(&self, id: StateId) -> bool {
        self.states[id.0].is_marked()
    }

    /// Ids of all marked states.
    pub fn marked_states(&self) -> Vec<StateId> {
        (0..self.states.len())
            .map(StateId)
            .filter(|&s| self.is_marked(s))
            .collect()
    }

    /// Outgoing `(event, destination)` pairs of a state, sorted by event.
    #[inline]
    pub fn outgoing(&self, id: StateId) -> &[(EventId, StateId)] {
        &self.outgoing[id.0]
    }

    /// Destination of `event` from `state`, if defined.
    pub fn step(&self, state: StateId, event: EventId) -> Option<StateId> {
        let list = &self.outgoing[state.0];
        list.binary_search_by_key(&event, |&(e, _)| e)
            .ok()
            .map(|i| list[i].1)
    }

    /// Destination of the event with `label` from `state`, if defined.
    pub fn step_label(&self, state: StateId, label: &str) -> Option<StateId> {
        self.event_id(label).and_then(|e| self.step(state, e))
    }

    /// Events enabled at a state.
    pub fn enabled(&self, state: StateId) -> impl Iterator<Item = &Event> + '_ {
        self.outgoing[state.0].iter().map(|&(e, _)| &self.events[e.0])
    }

    /// Iterates over all transitions, grouped by origin.
    pub fn transitions(&self) -> impl Iterator<Item = Transition> + '_ {
        self.outgoing.iter().enumerate().flat_map(|(origin, list)| {
            list.iter().map(move |&(event, destination)| Transition {
                origin: StateId(origin),
                event,
                destination,
            })
        })
    }

    /// Whether no state has two transitions with the same event.
    pub fn is_deterministic(&self) -> bool {
        self.outgoing
            .iter()
            .all(|list| list.windows(2).all(|w| w[0].0 != w[1].0))
    }

    /// Extends the alphabet with `alphabet`, adding a self-loop at every
    /// state for each event that is not already in the automaton's own
    /// alphabet.
    ///
    /// The result reacts to foreign events without changing state, so it
    /// can be stepped in lock-step with automata over a larger alphabet.
    pub fn inverse_projection(&self, alphabet: &[Event]) -> Automaton {
        let mut merged: BTreeMap<&str, &Event> =
            self.events.iter().map(|e| (e.label.as_str(), e)).collect();
        for e in alphabet {
            merged.entry(e.label.as_str()).or_insert(e);
        }
        let events: Vec<Event> = merged.into_values().cloned().collect();

        // Old id → new id; events outside the own alphabet get self-loops
        let mut remap = vec![EventId(0); self.events.len()];
        let mut foreign = Vec::new();
        for (i, e) in events.iter().enumerate() {
            match self.event_id(&e.label) {
                Some(old) => remap[old.0] = EventId(i),
                None => foreign.push(EventId(i)),
            }
        }

        let outgoing = self
            .outgoing
            .iter()
            .enumerate()
            .map(|(s, list)| {
                list.iter()
                    .map(|&(e, d)| (remap[e.0], d))
                    .chain(foreign.iter().map(|&e| (e, StateId(s))))
                    .collect()
            })
            .collect();

        Automaton::from_parts(
            self.name.clone(),
            events,
            self.states.clone(),
            outgoing,
            self.initial,
        )
    }
}

/// Builder for [`Automaton`] from labeled transitions.
///
/// States are identified by label and marking; the attributes of the first
/// occurrence of a state are kept.
///
/// # Example
/// ```
/// use u_desplan::models::{Automaton, Event, State};
///
/// let idle = State::marked("0");
/// let busy = State::unmarked("1").with_tasks(1.0);
/// let start = Event::controllable("1");
/// let finish = Event::uncontrollable("2");
///
/// let m1 = Automaton::builder("M1")
///     .with_initial(&idle)
///     .with_transition(&idle, &start, &busy)
///     .with_transition(&busy, &finish, &idle)
///     .build()
///     .unwrap();
///
/// assert_eq!(m1.state_count(), 2);
/// assert_eq!(m1.transition_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AutomatonBuilder {
    name: String,
    initial: Option<State>,
    transitions: Vec<(State, Event, State)>,
    extra_events: Vec<Event>,
}

impl AutomatonBuilder {
    /// Creates an empty builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the initial state.
    pub fn with_initial(mut self, state: &State) -> Self {
        self.initial = Some(state.clone());
        self
    }

    /// Adds a transition.
    pub fn with_transition(mut self, from: &State, event: &Event, to: &State) -> Self {
        self.transitions
            .push((from.clone(), event.clone(), to.clone()));
        self
    }

    /// Adds an event to the alphabet without any transition.
    pub fn with_event(mut self, event: &Event) -> Self {
        self.extra_events.push(event.clone());
        self
    }

    /// Validates the definition and builds the automaton.
    pub fn build(self) -> Result<Automaton, ModelError> {
        validate_definition(
            &self.name,
            self.initial.as_ref(),
            &self.transitions,
            &self.extra_events,
        )
        .map_err(|errors| ModelError::Invalid {
            name: self.name.clone(),
            errors,
        })?;

        let initial = match self.initial {
            Some(s) => s,
            None => {
                return Err(ModelError::Invalid {
                    name: self.name,
                    errors: Vec::new(),
                })
            }
        };

        let alphabet: BTreeMap<&str, &Event> = self
            .transitions
            .iter()
            .map(|(_, e, _)| e)
            .chain(self.extra_events.iter())
            .map(|e| (e.label.as_str(), e))
            .collect();
        let events: Vec<Event> = alphabet.into_values().cloned().collect();

        let mut index: HashMap<(String, Marking), StateId> = HashMap::new();
        let mut states: Vec<State> = Vec::new();
        let mut intern = |s: &State, states: &mut Vec<State>| -> StateId {
            *index
                .entry((s.label.clone(), s.marking))
                .or_insert_with(|| {
                    states.push(s.clone());
                    StateId(states.len() - 1)
                })
        };

        let ids: HashMap<&str, EventId> = events
            .iter()
            .enumerate()
            .map(|(i, e)| (e.label.as_str(), EventId(i)))
            .collect();

        let initial_id = intern(&initial, &mut states);
        let mut edges = Vec::with_capacity(self.transitions.len());
        for (from, event, to) in &self.transitions {
            let f = intern(from, &mut states);
            let t = intern(to, &mut states);
            let e = ids
                .get(event.label.as_str())
                .copied()
                .ok_or_else(|| ModelError::Invalid {
                    name: self.name.clone(),
                    errors: Vec::new(),
                })?;
            edges.push((f, e, t));
        }

        let mut outgoing = vec![Vec::new(); states.len()];
        for (f, e, t) in edges {
            outgoing[f.0].push((e, t));
        }

        Ok(Automaton::from_parts(
            self.name, events, states, outgoing, initial_id,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(name: &str, start: &str, finish: &str) -> Automaton {
        let idle = State::marked("0");
        let busy = State::unmarked("1").with_tasks(1.0);
        Automaton::builder(name)
            .with_initial(&idle)
            .with_transition(&idle, &Event::controllable(start), &busy)
            .with_transition(&busy, &Event::uncontrollable(finish), &idle)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_indexes_states_and_events() {
        let m = machine("M1", "1", "2");
        assert_eq!(m.name(), "M1");
        assert_eq!(m.state_count(), 2);
        assert_eq!(m.events().len(), 2);
        assert_eq!(m.initial(), StateId(0));
        assert!(m.is_marked(m.initial()));
        assert_eq!(m.marked_states(), vec![StateId(0)]);
        assert!(m.is_deterministic());
    }

    #[test]
    fn test_step_and_enabled() {
        let m = machine("M1", "1", "2");
        let s0 = m.initial();
        let s1 = m.step_label(s0, "1").unwrap();
        assert_eq!(m.state(s1).label, "1");
        assert!(m.step_label(s0, "2").is_none());
        assert_eq!(m.step_label(s1, "2"), Some(s0));
        let enabled: Vec<&str> = m.enabled(s1).map(|e| e.label.as_str()).collect();
        assert_eq!(enabled, vec!["2"]);
    }

    #[test]
    fn test_alphabet_sorted_by_label() {
        let m = machine("M", "b", "a");
        let labels: Vec<&str> = m.events().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b"]);
        assert_eq!(m.event_id("b"), Some(EventId(1)));
        assert_eq!(m.event_id("z"), None);
    }

    #[test]
    fn test_build_rejects_nondeterminism() {
        let a = State::marked("a");
        let result = Automaton::builder("bad")
            .with_initial(&a)
            .with_transition(&a, &Event::controllable("x"), &State::unmarked("b"))
            .with_transition(&a, &Event::controllable("x"), &State::unmarked("c"))
            .build();
        assert!(matches!(result, Err(ModelError::Invalid { .. })));
    }

    #[test]
    fn test_single_state_automaton() {
        let a = State::marked("a");
        let m = Automaton::builder("idle")
            .with_initial(&a)
            .with_event(&Event::controllable("x"))
            .build()
            .unwrap();
        assert_eq!(m.state_count(), 1);
        assert_eq!(m.transition_count(), 0);
        assert_eq!(m.events().len(), 1);
    }

    #[test]
    fn test_inverse_projection_adds_self_loops() {
        let m = machine("M1", "1", "2");
        let alphabet = vec![
            Event::controllable("1"),
            Event::uncontrollable("2"),
            Event::controllable("3"),
            Event::uncontrollable("4"),
        ];
        let p = m.inverse_projection(&alphabet);
        assert_eq!(p.events().len(), 4);
        assert_eq!(p.state_count(), 2);
        // Each state gains two self-loops
        assert_eq!(p.transition_count(), 2 + 2 * 2);
        for s in 0..p.state_count() {
            let s = StateId(s);
            assert_eq!(p.step_label(s, "3"), Some(s));
            assert_eq!(p.step_label(s, "4"), Some(s));
        }
        // Own behaviour is unchanged
        let s1 = p.step_label(p.initial(), "1").unwrap();
        assert_eq!(p.state(s1).label, "1");
        assert!(p.step_label(p.initial(), "2").is_none());
        assert!(p.is_deterministic());
    }

    #[test]
    fn test_inverse_projection_remaps_interleaved_labels() {
        // Foreign labels sort between and before the own ones
        let m = machine("M", "b", "d");
        let alphabet = vec![
            Event::controllable("a"),
            Event::controllable("c"),
            Event::uncontrollable("e"),
        ];
        let p = m.inverse_projection(&alphabet);
        let labels: Vec<&str> = p.events().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "c", "d", "e"]);

        let idle = p.initial();
        let busy = p.step_label(idle, "b").unwrap();
        assert_eq!(p.state(busy).label, "1");
        assert_eq!(p.step_label(busy, "d"), Some(idle));
        assert!(p.step_label(idle, "d").is_none());
        let d = p.event(p.event_id("d").unwrap());
        assert_eq!(d.label, "d");
        assert!(!d.is_controllable());
        for s in [idle, busy] {
            for foreign in ["a", "c", "e"] {
                assert_eq!(p.step_label(s, foreign), Some(s));
            }
        }
    }

    #[test]
    fn test_transitions_iterator() {
        let m = machine("M1", "1", "2");
        let all: Vec<Transition> = m.transitions().collect();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|t| m.step(t.origin, t.event) == Some(t.destination)));
    }
}
