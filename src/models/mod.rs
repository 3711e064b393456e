//! Discrete-event system models.
//!
//! Provides the automaton primitives that supervisory control operates on:
//! events with a controllability flag, states with marking and reward
//! attributes, and deterministic automata with dense state/event indices.
//!
//! # Domain Mappings
//!
//! | u-desplan | Manufacturing |
//! |-----------|---------------|
//! | Event (controllable) | Start of an operation, robot move |
//! | Event (uncontrollable) | End of an operation, breakdown |
//! | State | Machine / buffer configuration |
//! | Automaton | Machine, robot, conveyor, or buffer model |
//! | Supervisor | Control logic that is safe and non-blocking |
//!
//! # Reference
//! Ramadge & Wonham (1989), "The control of discrete event systems"

mod automaton;
mod event;
mod state;

pub use automaton::{Automaton, AutomatonBuilder, EventId, StateId, Transition};
pub use event::{Controllability, Event};
pub use state::{Marking, State};
