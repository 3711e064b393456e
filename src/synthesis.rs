//! Supervisor synthesis.
//!
//! Computes the supremal controllable, non-blocking supervisor of a plant
//! under a specification, either as one monolithic automaton or as a family
//! of local modular supervisors.
//!
//! # Algorithm (monolithic)
//!
//! 1. `P = plant ∥ specification`
//! 2. Controllability: remove every state where the plant enables an
//!    uncontrollable event that `P` does not allow (or that leads to a
//!    removed state).
//! 3. Non-blocking: remove every state that cannot reach a marked state.
//! 4. Repeat 2–3 until no state is removed, then keep the part reachable
//!    from the initial state.
//!
//! # Local modular synthesis
//!
//! Each specification is paired with the plants that share at least one
//! event with it. A plant no specification touches becomes a local
//! supervisor of its own (its trimmed behaviour). The local supervisors must be non-conflicting (their joint
//! behaviour non-blocking); otherwise synthesis fails with
//! [`SynthesisError::Conflicting`]. The returned supervisors are inverse
//! projected onto the full alphabet so they can be stepped in lock-step.
//!
//! # References
//! - Ramadge & Wonham (1987), "Supervisory control of a class of discrete event processes"
//! - de Queiroz & Cury (2000), "Modular supervisory control of large scale discrete event systems"

use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::{debug, info};

use crate::composition::{parallel_composition, product, unify_alphabet};
use crate::error::SynthesisError;
use crate::models::{Automaton, EventId, StateId};

/// A supervisor is an automaton that is deterministic, safe, controllable
/// and non-blocking with respect to its plant.
pub type Supervisor = Automaton;

/// Synthesizes the monolithic supervisor of `plants` under `specs`.
///
/// Plants and specifications are each composed first. With no
/// specification the result is the trimmed plant.
///
/// # Errors
/// - [`SynthesisError::NoPlants`] for an empty plant list
/// - [`SynthesisError::EmptySupervisor`] when no supervisor exists
/// - [`SynthesisError::Model`] for incompatible alphabets
pub fn monolithic_supervisor(
    plants: &[Automaton],
    specs: &[Automaton],
) -> Result<Supervisor, SynthesisError> {
    if plants.is_empty() {
        return Err(SynthesisError::NoPlants);
    }
    let plant = parallel_composition(plants)?;

    let supervisor = if specs.is_empty() {
        trim(&plant).ok_or_else(|| SynthesisError::EmptySupervisor {
            name: plant.name().to_string(),
        })?
    } else {
        let spec = parallel_composition(specs)?;
        supremal_controllable(&plant, &spec)?
    };

    info!(
        supervisor = %supervisor.name(),
        states = supervisor.state_count(),
        transitions = supervisor.transition_count(),
        "monolithic supervisor synthesized"
    );
    Ok(supervisor)
}

/// Synthesizes one local supervisor per specification and extends each to
/// the full alphabet of `plants` and `specs` by inverse projection.
///
/// # Errors
/// - [`SynthesisError::UnconstrainedSpecification`] when a specification
///   shares no event with any plant
/// - [`SynthesisError::Conflicting`] when the local supervisors block jointly
/// - any error of [`monolithic_supervisor`] for a local pairing
pub fn local_modular_supervisors(
    plants: &[Automaton],
    specs: &[Automaton],
) -> Result<Vec<Supervisor>, SynthesisError> {
    if plants.is_empty() {
        return Err(SynthesisError::NoPlants);
    }
    let everything: Vec<&Automaton> = plants.iter().chain(specs.iter()).collect();
    let alphabet = unify_alphabet(&everything)?;

    if specs.is_empty() {
        let free = monolithic_supervisor(plants, specs)?;
        return Ok(vec![free.inverse_projection(&alphabet)]);
    }

    let mut locals = Vec::with_capacity(specs.len());
    for spec in specs {
        let local_plants: Vec<Automaton> = plants
            .iter()
            .filter(|p| shares_event(p, spec))
            .cloned()
            .collect();
        if local_plants.is_empty() {
            return Err(SynthesisError::UnconstrainedSpecification {
                name: spec.name().to_string(),
            });
        }

        let local = monolithic_supervisor(&local_plants, std::slice::from_ref(spec))?
            .renamed(format!("Sup({})", spec.name()));
        debug!(
            specification = %spec.name(),
            plants = local_plants.len(),
            states = local.state_count(),
            "local supervisor synthesized"
        );
        locals.push(local);
    }

    // Plants outside every pairing still constrain their own events
    for plant in plants.iter().filter(|p| !specs.iter().any(|s| shares_event(p, s))) {
        let free = monolithic_supervisor(std::slice::from_ref(plant), &[])?
            .renamed(format!("Sup({})", plant.name()));
        debug!(plant = %plant.name(), "unconstrained plant kept as local supervisor");
        locals.push(free);
    }

    check_nonconflicting(&locals)?;

    Ok(locals
        .iter()
        .map(|s| s.inverse_projection(&alphabet))
        .collect())
}

/// Checks that local supervisors never block when run jointly.
pub fn check_nonconflicting(locals: &[Supervisor]) -> Result<(), SynthesisError> {
    if locals.len() < 2 {
        return Ok(());
    }
    let joint = parallel_composition(locals)?;
    let alive = vec![true; joint.state_count()];
    let co = coreachable(&joint, &alive);

    let blocking: Vec<usize> = (0..joint.state_count()).filter(|&s| !co[s]).collect();
    match blocking.first() {
        None => Ok(()),
        Some(&s) => Err(SynthesisError::Conflicting {
            blocking_states: blocking.len(),
            example: joint.state(StateId(s)).label.clone(),
        }),
    }
}

/// Verifies that the joint behaviour of local supervisors equals the
/// monolithic supervisor (same enabled events and marking along every
/// common path).
pub fn verify_modular(
    locals: &[Supervisor],
    monolithic: &Supervisor,
) -> Result<(), SynthesisError> {
    let joint = parallel_composition(locals)?;
    let joint = trim(&joint).ok_or_else(|| SynthesisError::ModularMismatch {
        state: joint.state(joint.initial()).label.clone(),
        reason: "joint local behaviour is empty".to_string(),
    })?;

    let start = (joint.initial(), monolithic.initial());
    let mut seen = BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);

    while let Some((j, m)) = queue.pop_front() {
        let label = || joint.state(j).label.clone();

        if joint.is_marked(j) != monolithic.is_marked(m) {
            return Err(SynthesisError::ModularMismatch {
                state: label(),
                reason: "marking differs".to_string(),
            });
        }

        let joint_events: BTreeSet<&str> = joint.enabled(j).map(|e| e.label.as_str()).collect();
        let mono_events: BTreeSet<&str> =
            monolithic.enabled(m).map(|e| e.label.as_str()).collect();
        if joint_events != mono_events {
            return Err(SynthesisError::ModularMismatch {
                state: label(),
                reason: format!("enabled {joint_events:?}, monolithic enables {mono_events:?}"),
            });
        }

        for event in joint_events {
            let next = joint
                .step_label(j, event)
                .zip(monolithic.step_label(m, event));
            if let Some(pair) = next {
                if seen.insert(pair) {
                    queue.push_back(pair);
                }
            }
        }
    }

    Ok(())
}

/// Restricts an automaton to its reachable and co-reachable part.
///
/// Returns `None` when the initial state cannot reach a marked state.
pub fn trim(automaton: &Automaton) -> Option<Automaton> {
    let alive = vec![true; automaton.state_count()];
    let co = coreachable(automaton, &alive);
    if !co[automaton.initial().0] {
        return None;
    }
    Some(restrict(automaton, &co, automaton.name().to_string()))
}

/// Supremal controllable and non-blocking sub-automaton of `plant ∥ spec`.
fn supremal_controllable(plant: &Automaton, spec: &Automaton) -> Result<Automaton, SynthesisError> {
    let prod = product(&[plant, spec])?;
    let p = &prod.automaton;
    let n = p.state_count();

    // Uncontrollable plant events as (plant id, product id)
    let uncontrollable: Vec<(EventId, EventId)> = plant
        .events()
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.is_controllable())
        .filter_map(|(i, e)| p.event_id(&e.label).map(|g| (EventId(i), g)))
        .collect();

    let mut alive = vec![true; n];
    let mut rounds = 0usize;
    loop {
        rounds += 1;
        let mut changed = false;

        for s in 0..n {
            if !alive[s] {
                continue;
            }
            let plant_state = prod.tuples[s][0];
            let bad = uncontrollable.iter().any(|&(pe, ge)| {
                plant.step(plant_state, pe).is_some()
                    && !matches!(p.step(StateId(s), ge), Some(d) if alive[d.0])
            });
            if bad {
                alive[s] = false;
                changed = true;
            }
        }

        let co = coreachable(p, &alive);
        for s in 0..n {
            if alive[s] && !co[s] {
                alive[s] = false;
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    let name = format!("Sup({})", p.name());
    if !alive[p.initial().0] {
        return Err(SynthesisError::EmptySupervisor { name });
    }
    debug!(
        product_states = n,
        kept = alive.iter().filter(|&&a| a).count(),
        rounds,
        "controllability fixed point reached"
    );
    Ok(restrict(p, &alive, name))
}

/// Marks the alive states that can reach an alive marked state through
/// alive states.
fn coreachable(automaton: &Automaton, alive: &[bool]) -> Vec<bool> {
    let n = automaton.state_count();
    let mut reverse: Vec<Vec<usize>> = vec![Vec::new(); n];
    for t in automaton.transitions() {
        if alive[t.origin.0] && alive[t.destination.0] {
            reverse[t.destination.0].push(t.origin.0);
        }
    }

    let mut co = vec![false; n];
    let mut queue: VecDeque<usize> = (0..n)
        .filter(|&s| alive[s] && automaton.is_marked(StateId(s)))
        .collect();
    for &s in &queue {
        co[s] = true;
    }
    while let Some(s) = queue.pop_front() {
        for &pred in &reverse[s] {
            if !co[pred] {
                co[pred] = true;
                queue.push_back(pred);
            }
        }
    }
    co
}

/// Keeps the alive states reachable from the initial state, re-indexed
/// densely in breadth-first order. The alphabet is kept whole.
fn restrict(automaton: &Automaton, alive: &[bool], name: String) -> Automaton {
    let mut index: HashMap<StateId, StateId> = HashMap::new();
    let mut order = vec![automaton.initial()];
    index.insert(automaton.initial(), StateId(0));
    let mut outgoing: Vec<Vec<(EventId, StateId)>> = vec![Vec::new()];

    let mut head = 0;
    while head < order.len() {
        let old = order[head];
        for &(e, dest) in automaton.outgoing(old) {
            if !alive[dest.0] {
                continue;
            }
            let new_dest = *index.entry(dest).or_insert_with(|| {
                order.push(dest);
                outgoing.push(Vec::new());
                StateId(order.len() - 1)
            });
            outgoing[head].push((e, new_dest));
        }
        head += 1;
    }

    let states = order.iter().map(|&s| automaton.state(s).clone()).collect();
    Automaton::from_parts(
        name,
        automaton.events().to_vec(),
        states,
        outgoing,
        StateId(0),
    )
}

fn shares_event(a: &Automaton, b: &Automaton) -> bool {
    a.events().iter().any(|e| b.event_id(&e.label).is_some())
}
