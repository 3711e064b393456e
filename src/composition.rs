//! Parallel composition (synchronous product) of automata.
//!
//! # Algorithm
//!
//! Breadth-first exploration from the tuple of initial states. An event
//! owned by several components (shared) fires only when every owner has a
//! transition for it from its current component state, and all owners
//! advance together. A private event advances only its owner.
//!
//! A composite state is marked iff every component state is marked; its
//! active-task and buffer attributes are the component sums.
//!
//! # Complexity
//! O(|Q_1| · … · |Q_n| · |Σ| · n) in the worst case; synchronization usually
//! prunes the reachable product far below that bound.
//!
//! # Reference
//! Cassandras & Lafortune (2008), "Introduction to Discrete Event Systems", §2.3.2

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use tracing::debug;

use crate::error::ModelError;
use crate::models::{Automaton, Event, EventId, State, StateId};

/// Reachable product together with the component tuple of each state.
pub(crate) struct Product {
    pub automaton: Automaton,
    /// `tuples[s][c]` is the state of component `c` in product state `s`.
    pub tuples: Vec<Vec<StateId>>,
}

/// Composes automata into their reachable synchronous product.
///
/// # Errors
/// - [`ModelError::EmptyComposition`] for an empty slice
/// - [`ModelError::ConflictingEvent`] when components disagree on the
///   controllability of a shared label
///
/// # Example
/// ```
/// use u_desplan::composition::parallel_composition;
/// use u_desplan::models::{Automaton, Event, State};
///
/// let idle = State::marked("0");
/// let busy = State::unmarked("1");
/// let machine = |name: &str, start: &str, finish: &str| {
///     Automaton::builder(name)
///         .with_initial(&idle)
///         .with_transition(&idle, &Event::controllable(start), &busy)
///         .with_transition(&busy, &Event::uncontrollable(finish), &idle)
///         .build()
///         .unwrap()
/// };
///
/// let both = parallel_composition(&[machine("M1", "1", "2"), machine("M2", "3", "4")]).unwrap();
/// assert_eq!(both.state_count(), 4);
/// assert_eq!(both.transition_count(), 8);
/// ```
pub fn parallel_composition(components: &[Automaton]) -> Result<Automaton, ModelError> {
    let refs: Vec<&Automaton> = components.iter().collect();
    product(&refs).map(|p| p.automaton)
}

/// Merges the alphabets of all components by label.
pub(crate) fn unify_alphabet(components: &[&Automaton]) -> Result<Vec<Event>, ModelError> {
    let mut merged: BTreeMap<&str, &Event> = BTreeMap::new();
    for a in components {
        for e in a.events() {
            match merged.get(e.label.as_str()) {
                Some(prev) if prev.controllability != e.controllability => {
                    return Err(ModelError::ConflictingEvent {
                        label: e.label.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    merged.insert(&e.label, e);
                }
            }
        }
    }
    Ok(merged.into_values().cloned().collect())
}

/// Builds the reachable product, keeping the component tuple of each state.
pub(crate) fn product(components: &[&Automaton]) -> Result<Product, ModelError> {
    if components.is_empty() {
        return Err(ModelError::EmptyComposition);
    }

    let events = unify_alphabet(components)?;

    // Per component: global event → local event, local event → global event
    let to_local: Vec<Vec<Option<EventId>>> = components
        .iter()
        .map(|a| events.iter().map(|e| a.event_id(&e.label)).collect())
        .collect();
    let to_global: Vec<Vec<usize>> = to_local
        .iter()
        .zip(components)
        .map(|(local, a)| {
            let mut global = vec![0; a.events().len()];
            for (g, l) in local.iter().enumerate() {
                if let Some(l) = l {
                    global[l.0] = g;
                }
            }
            global
        })
        .collect();

    let initial: Vec<StateId> = components.iter().map(|a| a.initial()).collect();
    let mut index: HashMap<Vec<StateId>, StateId> = HashMap::new();
    index.insert(initial.clone(), StateId(0));
    let mut tuples = vec![initial];
    let mut outgoing: Vec<Vec<(EventId, StateId)>> = vec![Vec::new()];
    let mut queue = VecDeque::from([StateId(0)]);

    while let Some(current) = queue.pop_front() {
        let tuple = tuples[current.0].clone();

        // Only events enabled somewhere can fire
        let mut candidates = BTreeSet::new();
        for (c, a) in components.iter().enumerate() {
            for &(e, _) in a.outgoing(tuple[c]) {
                candidates.insert(to_global[c][e.0]);
            }
        }

        'events: for g in candidates {
            let mut next = tuple.clone();
            for (c, a) in components.iter().enumerate() {
                if let Some(local) = to_local[c][g] {
                    match a.step(tuple[c], local) {
                        Some(dest) => next[c] = dest,
                        None => continue 'events,
                    }
                }
            }

            let id = match index.get(&next) {
                Some(&id) => id,
                None => {
                    let id = StateId(tuples.len());
                    index.insert(next.clone(), id);
                    tuples.push(next);
                    outgoing.push(Vec::new());
                    queue.push_back(id);
                    id
                }
            };
            outgoing[current.0].push((EventId(g), id));
        }
    }

    let states: Vec<State> = tuples
        .iter()
        .map(|t| State::composite(t.iter().zip(components).map(|(&s, a)| a.state(s))))
        .collect();
    let name = components
        .iter()
        .map(|a| a.name())
        .collect::<Vec<_>>()
        .join("||");

    debug!(
        product = %name,
        states = states.len(),
        "parallel composition explored"
    );

    Ok(Product {
        automaton: Automaton::from_parts(name, events, states, outgoing, StateId(0)),
        tuples,
    })
}
