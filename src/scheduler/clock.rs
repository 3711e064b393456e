//! Event clocks.
//!
//! Each event carries the remaining time until it becomes temporally
//! eligible. Controllable events normally sit at 0 (ready when the
//! supervisor allows them); uncontrollable events sit at `+∞` until an
//! upstream event starts their timer.
//!
//! # Firing rule
//!
//! Firing `e` with remaining time `δ = clock[e]`:
//! 1. every other clock is decremented by `δ`; controllable clocks are
//!    clamped at 0, a negative uncontrollable clock is fatal
//! 2. `clock[e]` becomes 0 (controllable) or `+∞` (uncontrollable)
//! 3. the elapsed time advances by `δ`
//! 4. every timer reset triggered by `e` sets its target clock to the
//!    (optionally jittered) nominal duration
//!
//! Firing returns a new clock; the old one is left untouched.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::models::Event;

/// Tolerance below zero accepted for an uncontrollable clock.
const CLOCK_EPSILON: f64 = 1e-9;

/// Firing `trigger` starts the timer of `target` with `duration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerReset {
    /// Event that starts the timer.
    pub trigger: String,
    /// Event whose clock is set.
    pub target: String,
    /// Nominal duration.
    pub duration: f64,
}

/// Nominal durations and initial delays of one model.
///
/// # Example
/// ```
/// use u_desplan::scheduler::TimingModel;
///
/// let timing = TimingModel::new()
///     .with_duration("1", "2", 25.0)
///     .with_duration("3", "4", 25.0);
/// assert_eq!(timing.resets_for("1").count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingModel {
    resets: Vec<TimerReset>,
    delays: BTreeMap<String, f64>,
}

impl TimingModel {
    /// Creates a model without durations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Firing `trigger` sets the clock of `target` to `duration`.
    pub fn with_duration(
        mut self,
        trigger: impl Into<String>,
        target: impl Into<String>,
        duration: f64,
    ) -> Self {
        self.resets.push(TimerReset {
            trigger: trigger.into(),
            target: target.into(),
            duration,
        });
        self
    }

    /// Initial clock of a controllable event (default 0).
    pub fn with_delay(mut self, label: impl Into<String>, delay: f64) -> Self {
        self.delays.insert(label.into(), delay);
        self
    }

    /// Resets triggered by an event.
    pub fn resets_for<'a>(&'a self, trigger: &'a str) -> impl Iterator<Item = &'a TimerReset> + 'a {
        self.resets.iter().filter(move |r| r.trigger == trigger)
    }

    /// All resets.
    pub fn resets(&self) -> &[TimerReset] {
        &self.resets
    }
}

/// Gaussian perturbation of timer durations.
#[derive(Debug, Clone)]
pub struct Jitter {
    std_dev: f64,
    rng: StdRng,
}

impl Jitter {
    /// Creates a seeded jitter source.
    pub fn new(std_dev: f64, seed: u64) -> Self {
        Self {
            std_dev,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Samples `nominal + std_dev · z`, clamped at 0.
    pub fn sample(&mut self, nominal: f64) -> f64 {
        // Box–Muller
        let u1 = 1.0 - self.rng.random::<f64>();
        let u2 = self.rng.random::<f64>();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        (nominal + self.std_dev * z).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Timer {
    event: Event,
    remaining: f64,
}

/// Remaining time per event plus the elapsed time of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventClock {
    timers: Vec<Timer>,
    elapsed: f64,
}

impl EventClock {
    /// Initial clock over an alphabet sorted by label.
    pub fn initial(alphabet: &[Event], timing: &TimingModel) -> Self {
        let mut timers: Vec<Timer> = alphabet
            .iter()
            .map(|event| {
                let remaining = if event.is_controllable() {
                    timing.delays.get(&event.label).copied().unwrap_or(0.0)
                } else {
                    f64::INFINITY
                };
                Timer {
                    event: event.clone(),
                    remaining,
                }
            })
            .collect();
        timers.sort_by(|a, b| a.event.label.cmp(&b.event.label));
        Self {
            timers,
            elapsed: 0.0,
        }
    }

    fn index(&self, label: &str) -> Option<usize> {
        self.timers
            .binary_search_by(|t| t.event.label.as_str().cmp(label))
            .ok()
    }

    /// Remaining time of an event; `+∞` for unknown events.
    pub fn remaining(&self, label: &str) -> f64 {
        self.index(label)
            .map(|i| self.timers[i].remaining)
            .unwrap_or(f64::INFINITY)
    }

    /// Elapsed time since the start of the run.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Smallest finite uncontrollable clock.
    pub fn min_uncontrollable(&self) -> Option<f64> {
        self.timers
            .iter()
            .filter(|t| !t.event.is_controllable() && t.remaining.is_finite())
            .map(|t| t.remaining)
            .reduce(f64::min)
    }

    /// Whether a running uncontrollable timer expires strictly before
    /// `label` becomes eligible.
    pub fn is_preempted(&self, label: &str) -> bool {
        let own = self.remaining(label);
        self.timers.iter().any(|t| {
            !t.event.is_controllable() && t.remaining.is_finite() && t.remaining < own
        })
    }

    /// Clock after firing `event` with nominal durations.
    pub fn fired(
        &self,
        event: &Event,
        state: &str,
        timing: &TimingModel,
    ) -> Result<Self, SimulationError> {
        self.fired_with(event, state, timing, |d| d)
    }

    /// Clock after firing `event`, passing every reset duration through
    /// `perturb`.
    ///
    /// # Errors
    /// [`SimulationError::InvalidClock`] when the fired event's clock is not
    /// a finite non-negative number, or when another uncontrollable clock
    /// would become negative or NaN.
    pub fn fired_with(
        &self,
        event: &Event,
        state: &str,
        timing: &TimingModel,
        mut perturb: impl FnMut(f64) -> f64,
    ) -> Result<Self, SimulationError> {
        let invalid = |label: &str, value: f64| SimulationError::InvalidClock {
            event: label.to_string(),
            state: state.to_string(),
            value,
        };

        let delta = self.remaining(&event.label);
        if !(delta.is_finite() && delta >= 0.0) {
            return Err(invalid(&event.label, delta));
        }

        let mut next = self.clone();
        for timer in &mut next.timers {
            if timer.event.label == event.label {
                timer.remaining = if event.is_controllable() {
                    0.0
                } else {
                    f64::INFINITY
                };
                continue;
            }
            let value = timer.remaining - delta;
            if timer.event.is_controllable() {
                timer.remaining = value.max(0.0);
            } else if value.is_nan() || value < -CLOCK_EPSILON {
                return Err(invalid(&timer.event.label, value));
            } else {
                timer.remaining = value.max(0.0);
            }
        }
        next.elapsed += delta;

        for reset in timing.resets_for(&event.label) {
            if let Some(i) = next.index(&reset.target) {
                next.timers[i].remaining = perturb(reset.duration);
            }
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alphabet() -> Vec<Event> {
        vec![
            Event::controllable("1"),
            Event::uncontrollable("2"),
            Event::controllable("3"),
            Event::uncontrollable("4"),
        ]
    }

    fn timing() -> TimingModel {
        TimingModel::new()
            .with_duration("1", "2", 25.0)
            .with_duration("3", "4", 25.0)
    }

    #[test]
    fn test_initial_clock() {
        let clock = EventClock::initial(&alphabet(), &timing());
        assert_eq!(clock.remaining("1"), 0.0);
        assert_eq!(clock.remaining("2"), f64::INFINITY);
        assert_eq!(clock.elapsed(), 0.0);
        assert!(clock.min_uncontrollable().is_none());
    }

    #[test]
    fn test_firing_starts_and_expires_timers() {
        let t = timing();
        let c0 = EventClock::initial(&alphabet(), &t);
        let c1 = c0.fired(&Event::controllable("1"), "0|0|E", &t).unwrap();
        assert_eq!(c1.remaining("2"), 25.0);
        assert_eq!(c1.elapsed(), 0.0);
        // Copy on write
        assert_eq!(c0.remaining("2"), f64::INFINITY);

        let c2 = c1.fired(&Event::uncontrollable("2"), "1|0|E", &t).unwrap();
        assert_eq!(c2.remaining("2"), f64::INFINITY);
        assert_eq!(c2.elapsed(), 25.0);
    }

    #[test]
    fn test_running_timers_are_decremented() {
        let t = timing();
        let c = EventClock::initial(&alphabet(), &t)
            .fired(&Event::controllable("1"), "s", &t)
            .unwrap()
            .fired(&Event::controllable("3"), "s", &t)
            .unwrap();
        assert_eq!(c.min_uncontrollable(), Some(25.0));
        let c = c.fired(&Event::uncontrollable("2"), "s", &t).unwrap();
        assert_eq!(c.remaining("4"), 0.0);
        assert_eq!(c.elapsed(), 25.0);
    }

    #[test]
    fn test_preemption() {
        let t = timing().with_delay("3", 30.0);
        let c = EventClock::initial(&alphabet(), &t)
            .fired(&Event::controllable("1"), "s", &t)
            .unwrap();
        // Event 2 expires at 25, before event 3 becomes ready at 30
        assert!(c.is_preempted("3"));
        assert!(!c.is_preempted("2"));
        assert!(!c.is_preempted("1"));
    }

    #[test]
    fn test_controllable_delay_is_clamped() {
        let t = timing().with_delay("3", 10.0);
        let c = EventClock::initial(&alphabet(), &t)
            .fired(&Event::controllable("1"), "s", &t)
            .unwrap()
            .fired(&Event::uncontrollable("2"), "s", &t)
            .unwrap();
        assert_eq!(c.remaining("3"), 0.0);
    }

    #[test]
    fn test_firing_disabled_timer_is_fatal() {
        let t = timing();
        let c = EventClock::initial(&alphabet(), &t);
        let err = c.fired(&Event::uncontrollable("4"), "0|0|E", &t).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidClock { ref event, .. } if event == "4"));
    }

    #[test]
    fn test_overtaken_uncontrollable_clock_is_fatal() {
        let t = timing().with_duration("3", "4", 5.0);
        let c = EventClock::initial(&alphabet(), &t)
            .fired(&Event::controllable("1"), "s", &t)
            .unwrap()
            .fired(&Event::controllable("3"), "s", &t)
            .unwrap();
        // Firing 2 (25) while 4 expires at 5 drives clock 4 negative
        let err = c.fired(&Event::uncontrollable("2"), "s", &t).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidClock { ref event, .. } if event == "4"));
    }

    #[test]
    fn test_jitter_is_reproducible_and_non_negative() {
        let mut a = Jitter::new(5.0, 7);
        let mut b = Jitter::new(5.0, 7);
        for _ in 0..100 {
            let x = a.sample(1.0);
            assert_eq!(x, b.sample(1.0));
            assert!(x >= 0.0);
        }
    }

    #[test]
    fn test_zero_jitter_is_nominal() {
        let mut j = Jitter::new(0.0, 1);
        assert_eq!(j.sample(25.0), 25.0);
    }
}
