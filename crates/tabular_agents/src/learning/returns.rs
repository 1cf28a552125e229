//! Monte Carlo bookkeeping: first-visit returns and importance-sampling weights.

use crate::learning::pairs;
use crate::state::StateKey;
use crate::types::ActionIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Every first-visit return observed for each `(state, action)` pair.
///
/// Only grows. Monte Carlo control estimates `Q(s, a)` as the mean of its list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnsLedger {
    #[serde(with = "pairs")]
    returns: HashMap<(StateKey, ActionIndex), Vec<f64>>,
}

impl ReturnsLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a return and gives back the new sample mean.
    pub fn append(&mut self, state: StateKey, action: ActionIndex, ret: f64) -> f64 {
        let list = self.returns.entry((state, action)).or_default();
        list.push(ret);
        list.iter().sum::<f64>() / list.len() as f64
    }

    /// All returns recorded for the pair.
    pub fn returns(&self, state: &StateKey, action: ActionIndex) -> &[f64] {
        self.returns
            .get(&(state.clone(), action))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of pairs with at least one return.
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    /// Returns true if no return has been recorded.
    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// Total number of returns across all pairs.
    pub fn total_returns(&self) -> usize {
        self.returns.values().map(Vec::len).sum()
    }
}

/// Cumulative importance-sampling weights `C(s, a)`.
///
/// Weights are added, never subtracted, so every entry is non-decreasing and
/// non-negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cumulants {
    #[serde(with = "pairs")]
    weights: HashMap<(StateKey, ActionIndex), f64>,
}

impl Cumulants {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// `C(s, a)`, `0.0` if never touched.
    pub fn get(&self, state: &StateKey, action: ActionIndex) -> f64 {
        self.weights
            .get(&(state.clone(), action))
            .copied()
            .unwrap_or(0.0)
    }

    /// Adds `weight` (clamped at zero) and returns the new cumulative value.
    pub fn add(&mut self, state: StateKey, action: ActionIndex, weight: f64) -> f64 {
        let c = self.weights.entry((state, action)).or_insert(0.0);
        *c += weight.max(0.0);
        *c
    }

    /// Number of touched pairs.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Returns true if no pair has been touched.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Iterates over `((state, action), weight)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (&(StateKey, ActionIndex), &f64)> {
        self.weights.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_mean() {
        let mut ledger = ReturnsLedger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.append(StateKey::Int(0), 1, 2.0), 2.0);
        assert_eq!(ledger.append(StateKey::Int(0), 1, 4.0), 3.0);
        assert_eq!(ledger.returns(&StateKey::Int(0), 1), &[2.0, 4.0]);
        assert!(ledger.returns(&StateKey::Int(0), 0).is_empty());
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.total_returns(), 2);
    }

    #[test]
    fn test_cumulants_non_decreasing() {
        let mut c = Cumulants::new();
        let s = StateKey::Text("a".into());
        let mut last = 0.0;
        for w in [1.0, 0.5, 0.0, -3.0, 2.0] {
            let now = c.add(s.clone(), 0, w);
            assert!(now >= last);
            assert!(now >= 0.0);
            last = now;
        }
        assert_eq!(c.get(&s, 0), 3.5);
        assert_eq!(c.get(&s, 1), 0.0);
    }

    #[test]
    fn test_serde() {
        let mut ledger = ReturnsLedger::new();
        ledger.append(StateKey::Tuple(vec![StateKey::Int(1)]), 0, -1.0);
        let json = serde_json::to_string(&ledger).unwrap();
        let back: ReturnsLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(ledger, back);

        let mut c = Cumulants::new();
        c.add(StateKey::Int(2), 1, 0.25);
        let json = serde_json::to_string(&c).unwrap();
        let back: Cumulants = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
