//! Reward functions.
//!
//! | Reward | Value of `(s, e, s')` |
//! |--------|------------------------|
//! | [`ParallelismReward`] | active tasks of `s'` |
//! | [`BufferReward`] | buffer occupancy of `s'` |
//! | [`EventReward`] | fixed value per event label |

use std::collections::HashMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::models::{Event, State};

/// A reward for taking `event` from `origin` and landing on `successor`.
pub trait Reward: Send + Sync + Debug {
    /// Reward name (e.g., "parallelism").
    fn name(&self) -> &'static str;

    /// Scalar reward of one transition.
    fn reward(&self, origin: &State, event: &Event, successor: &State) -> f64;
}

/// Rewards keeping many tasks active at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelismReward;

impl Reward for ParallelismReward {
    fn name(&self) -> &'static str {
        "parallelism"
    }

    fn reward(&self, _origin: &State, _event: &Event, successor: &State) -> f64 {
        successor.active_tasks
    }
}

/// Rewards keeping parts in buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferReward;

impl Reward for BufferReward {
    fn name(&self) -> &'static str {
        "buffer"
    }

    fn reward(&self, _origin: &State, _event: &Event, successor: &State) -> f64 {
        f64::from(successor.buffer)
    }
}

/// Fixed reward per event label; unlisted events earn `default`.
///
/// # Example
/// ```
/// use u_desplan::mdp::EventReward;
///
/// let reward = EventReward::new()
///     .with_reward("1", 3.0)
///     .with_reward("3", 2.0)
///     .with_reward("5", 1.0);
/// assert_eq!(reward.value("3"), 2.0);
/// assert_eq!(reward.value("2"), 0.0);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventReward {
    table: HashMap<String, f64>,
    default: f64,
}

impl EventReward {
    /// Creates an empty table (every event earns 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reward of one event.
    pub fn with_reward(mut self, label: impl Into<String>, value: f64) -> Self {
        self.table.insert(label.into(), value);
        self
    }

    /// Sets the reward of unlisted events.
    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }

    /// Reward of an event label.
    pub fn value(&self, label: &str) -> f64 {
        self.table.get(label).copied().unwrap_or(self.default)
    }
}

impl Reward for EventReward {
    fn name(&self) -> &'static str {
        "event"
    }

    fn reward(&self, _origin: &State, event: &Event, _successor: &State) -> f64 {
        self.value(&event.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallelism_uses_successor() {
        let origin = State::marked("0|0").with_tasks(0.0);
        let succ = State::unmarked("1|1").with_tasks(2.0);
        let r = ParallelismReward.reward(&origin, &Event::controllable("3"), &succ);
        assert!((r - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_buffer_uses_successor() {
        let origin = State::marked("0|0|E");
        let succ = State::unmarked("0|0|F").with_buffer(1);
        assert_eq!(
            BufferReward.reward(&origin, &Event::uncontrollable("2"), &succ),
            1.0
        );
    }

    #[test]
    fn test_event_reward_ignores_states() {
        let r = EventReward::new().with_reward("1", 3.0).with_default(0.5);
        let a = State::marked("a");
        let b = State::unmarked("b").with_tasks(7.0);
        assert_eq!(r.reward(&a, &Event::controllable("1"), &b), 3.0);
        assert_eq!(r.reward(&a, &Event::controllable("9"), &b), 0.5);
        assert_eq!(r.name(), "event");
    }
}
