//! Sequence quality metrics (KPIs).
//!
//! Computes performance indicators from a generated sequence.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan | Elapsed time of the last fired event |
//! | Throughput | Products per time unit (completed runs only) |
//! | Firings | Count per event label |
//! | Controllable firings | Count of supervisor decisions |
//! | Idle steps | Steps that did not advance time |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use std::collections::BTreeMap;

use super::sequence::Sequence;

/// Sequence performance indicators.
#[derive(Debug, Clone)]
pub struct SequenceKpi {
    /// Elapsed time of the last fired event.
    pub makespan: f64,
    /// Whether the run ended where it was expected to.
    pub completed: bool,
    /// Number of fired events.
    pub steps: usize,
    /// Number of fired controllable events.
    pub controllable_firings: usize,
    /// Firings per event label.
    pub firings: BTreeMap<String, usize>,
    /// Steps that fired at the same time as the previous one.
    pub idle_steps: usize,
    /// Products per time unit; 0 for incomplete or instantaneous runs.
    pub throughput: f64,
}

impl SequenceKpi {
    /// Computes KPIs of a sequence generated for `products` products.
    pub fn calculate(sequence: &Sequence, products: u32) -> Self {
        let makespan = sequence.makespan();

        let mut firings = BTreeMap::new();
        for event in &sequence.events {
            *firings.entry(event.label.clone()).or_insert(0) += 1;
        }
        let controllable_firings = sequence
            .events
            .iter()
            .filter(|e| e.is_controllable())
            .count();

        let mut previous = 0.0;
        let mut idle_steps = 0;
        for &t in sequence.times.iter().take(sequence.events.len()) {
            if t <= previous {
                idle_steps += 1;
            }
            previous = t;
        }

        let throughput = if sequence.completed && makespan > 0.0 {
            f64::from(products) / makespan
        } else {
            0.0
        };

        Self {
            makespan,
            completed: sequence.completed,
            steps: sequence.len(),
            controllable_firings,
            firings,
            idle_steps,
            throughput,
        }
    }

    /// Whether the run completed within `max_makespan`.
    pub fn meets_makespan(&self, max_makespan: f64) -> bool {
        self.completed && self.makespan <= max_makespan
    }
}
