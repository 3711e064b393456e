//! Markov decision process view of a supervisor.
//!
//! Turns a supervisor's state graph into a probabilistic action model,
//! solves it by value iteration under a pluggable reward and extracts a
//! ranked dispatch policy.
//!
//! # Usage
//!
//! ```
//! use u_desplan::mdp::{self, ParallelismReward, SolverConfig, TieBreak};
//! use u_desplan::models::{Automaton, Event, State};
//!
//! let idle = State::marked("0");
//! let busy = State::unmarked("1").with_tasks(1.0);
//! let machine = Automaton::builder("M1")
//!     .with_initial(&idle)
//!     .with_transition(&idle, &Event::controllable("1"), &busy)
//!     .with_transition(&busy, &Event::uncontrollable("2"), &idle)
//!     .build()
//!     .unwrap();
//!
//! let policy = mdp::plan(
//!     &machine,
//!     &ParallelismReward,
//!     &SolverConfig::default(),
//!     TieBreak::default(),
//! )
//! .unwrap();
//! assert_eq!(policy.best(machine.initial()).unwrap().event.label, "1");
//! ```
//!
//! # References
//!
//! - Bellman (1957), "Dynamic Programming"
//! - Puterman (1994), "Markov Decision Processes: Discrete Stochastic Dynamic Programming"

mod policy;
mod reward;
mod table;
mod value;

pub use policy::{
    extract_policy, ControllabilityOrder, LabelOrder, PolicyTable, RankedAction, TieBreak,
};
pub use reward::{BufferReward, EventReward, ParallelismReward, Reward};
pub use table::{Action, Outcome, TransitionProbabilityTable};
pub use value::{solve, sweep, SolverConfig, ValueTable};

use crate::error::SolveError;
use crate::models::Automaton;

/// Builds the table, solves it and extracts the policy in one call.
pub fn plan(
    supervisor: &Automaton,
    reward: &dyn Reward,
    config: &SolverConfig,
    tie_break: TieBreak,
) -> Result<PolicyTable, SolveError> {
    let table = TransitionProbabilityTable::build(supervisor);
    let values = solve(&table, reward, config)?;
    extract_policy(&table, &values, reward, config, tie_break)
}
