//! Supervisory-control production planning.
//!
//! Models a manufacturing system as a network of finite automata,
//! synthesizes a controllable and non-blocking supervisor, solves an MDP
//! over the supervisor's state graph for a dispatch policy and executes
//! that policy against event clocks and production quotas.
//!
//! # Modules
//!
//! - **`models`**: `Event`, `State`, `Automaton` and their builders
//! - **`validation`**: Structural checks for automaton definitions
//! - **`composition`**: Parallel composition (synchronous product)
//! - **`synthesis`**: Monolithic and local modular supervisors
//! - **`mdp`**: Transition probabilities, value iteration, ranked policies
//! - **`scheduler`**: Timed sequence generation, modular coordination, KPIs
//! - **`error`**: Error types per layer
//!
//! # Pipeline
//!
//! ```text
//! plants, specs ──synthesis──▶ supervisor ──mdp──▶ policy
//!                                  │                 │
//!                                  └──── scheduler ◀─┘ ──▶ (events, times)
//! ```
//!
//! # References
//!
//! - Ramadge & Wonham (1989), "The control of discrete event systems"
//! - Cassandras & Lafortune (2008), "Introduction to Discrete Event Systems"
//! - Puterman (1994), "Markov Decision Processes"

pub mod composition;
pub mod error;
pub mod mdp;
pub mod models;
pub mod scheduler;
pub mod synthesis;
pub mod validation;
