//! Production quotas.
//!
//! A [`Restriction`] holds the remaining permitted firings of each
//! controllable event for one batch. Uncontrollable events are never
//! quota-limited. Controllable events without an entry have quota 0.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::models::Event;

/// Remaining firings per controllable event.
///
/// Firing returns a new restriction, so runs sharing a starting quota
/// never alias each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    quotas: BTreeMap<String, u32>,
}

impl Restriction {
    /// Creates an empty restriction (every controllable event blocked).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the quota of an event.
    pub fn with_quota(mut self, label: impl Into<String>, quota: u32) -> Self {
        self.quotas.insert(label.into(), quota);
        self
    }

    /// Remaining quota of an event label.
    pub fn quota(&self, label: &str) -> u32 {
        self.quotas.get(label).copied().unwrap_or(0)
    }

    /// Whether an event may fire as far as quotas go.
    pub fn allows(&self, event: &Event) -> bool {
        !event.is_controllable() || self.quota(&event.label) > 0
    }

    /// Sum of all remaining quotas.
    pub fn total(&self) -> u64 {
        self.quotas.values().map(|&q| u64::from(q)).sum()
    }

    /// Whether every quota is spent.
    pub fn is_exhausted(&self) -> bool {
        self.quotas.values().all(|&q| q == 0)
    }

    /// Restriction after firing `event` in `state`.
    ///
    /// # Errors
    /// [`SimulationError::QuotaUnderflow`] for a controllable event with no
    /// remaining quota.
    pub fn fired(&self, event: &Event, state: &str) -> Result<Self, SimulationError> {
        if !event.is_controllable() {
            return Ok(self.clone());
        }
        let remaining = self
            .quota(&event.label)
            .checked_sub(1)
            .ok_or_else(|| SimulationError::QuotaUnderflow {
                event: event.label.clone(),
                state: state.to_string(),
            })?;
        let mut next = self.clone();
        next.quotas.insert(event.label.clone(), remaining);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlisted_controllable_has_no_quota() {
        let r = Restriction::new().with_quota("1", 2);
        assert!(r.allows(&Event::controllable("1")));
        assert!(!r.allows(&Event::controllable("3")));
        assert!(r.allows(&Event::uncontrollable("2")));
    }

    #[test]
    fn test_firing_decrements_copy() {
        let r = Restriction::new().with_quota("1", 1);
        let next = r.fired(&Event::controllable("1"), "s").unwrap();
        assert_eq!(next.quota("1"), 0);
        assert_eq!(r.quota("1"), 1);
        assert!(next.is_exhausted());
        assert_eq!(next.total(), 0);
    }

    #[test]
    fn test_uncontrollable_leaves_quota() {
        let r = Restriction::new().with_quota("1", 1);
        assert_eq!(r.fired(&Event::uncontrollable("2"), "s").unwrap(), r);
    }

    #[test]
    fn test_underflow() {
        let r = Restriction::new().with_quota("1", 0);
        assert!(matches!(
            r.fired(&Event::controllable("1"), "s"),
            Err(SimulationError::QuotaUnderflow { .. })
        ));
    }
}
