//! Sparse action-value and state-value tables.

use crate::learning::pairs;
use crate::state::StateKey;
use crate::types::ActionIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A sparse table of action values `Q(s, a)`.
///
/// Unvisited entries read as `0.0`. Entries are only ever written by updates
/// and planning; nothing is evicted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueTable {
    #[serde(with = "pairs")]
    rows: HashMap<StateKey, Vec<f64>>,
}

impl ValueTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets `Q(state, action)`.
    pub fn get(&self, state: &StateKey, action: ActionIndex) -> f64 {
        self.rows
            .get(state)
            .and_then(|row| row.get(action))
            .copied()
            .unwrap_or(0.0)
    }

    /// Sets `Q(state, action)`.
    pub fn set(&mut self, state: &StateKey, action: ActionIndex, value: f64) {
        let row = self.rows.entry(state.clone()).or_default();
        if row.len() <= action {
            row.resize(action + 1, 0.0);
        }
        row[action] = value;
    }

    /// Moves `Q(state, action)` toward `target` by step size `alpha`.
    ///
    /// Returns the new value.
    pub fn update_toward(
        &mut self,
        state: &StateKey,
        action: ActionIndex,
        target: f64,
        alpha: f64,
    ) -> f64 {
        let current = self.get(state, action);
        let new_value = current + alpha * (target - current);
        self.set(state, action, new_value);
        new_value
    }

    /// The values of all `n_actions` actions in `state`.
    pub fn values(&self, state: &StateKey, n_actions: usize) -> Vec<f64> {
        let mut values = vec![0.0; n_actions];
        if let Some(row) = self.rows.get(state) {
            for (slot, v) in values.iter_mut().zip(row.iter()) {
                *slot = *v;
            }
        }
        values
    }

    /// `max_a Q(state, a)`; `0.0` when there are no actions.
    pub fn max_value(&self, state: &StateKey, n_actions: usize) -> f64 {
        if n_actions == 0 {
            return 0.0;
        }
        self.values(state, n_actions)
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Number of states with stored entries.
    pub fn state_count(&self) -> usize {
        self.rows.len()
    }

    /// Iterates over every stored `((state, action), value)` entry.
    pub fn entries(&self) -> impl Iterator<Item = (&StateKey, ActionIndex, f64)> + '_ {
        self.rows
            .iter()
            .flat_map(|(s, row)| row.iter().enumerate().map(move |(a, v)| (s, a, *v)))
    }
}

/// A sparse table of state values `V(s)`; unknown states read as `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateValues {
    #[serde(with = "pairs")]
    values: HashMap<StateKey, f64>,
}

impl StateValues {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets `V(state)`.
    pub fn get(&self, state: &StateKey) -> f64 {
        self.values.get(state).copied().unwrap_or(0.0)
    }

    /// Sets `V(state)`.
    pub fn set(&mut self, state: StateKey, value: f64) {
        self.values.insert(state, value);
    }

    /// Number of stored states.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over stored `(state, value)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (&StateKey, &f64)> {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(i: i64) -> StateKey {
        StateKey::Int(i)
    }

    #[test]
    fn test_defaults_to_zero() {
        let q = ValueTable::new();
        assert_eq!(q.get(&key(0), 3), 0.0);
        assert_eq!(q.values(&key(0), 3), vec![0.0; 3]);
        assert_eq!(q.max_value(&key(0), 3), 0.0);
        assert_eq!(q.max_value(&key(0), 0), 0.0);
        assert_eq!(q.state_count(), 0);
    }

    #[test]
    fn test_set_and_get() {
        let mut q = ValueTable::new();
        q.set(&key(1), 2, -4.0);
        assert_eq!(q.get(&key(1), 2), -4.0);
        assert_eq!(q.get(&key(1), 0), 0.0);
        assert_eq!(q.values(&key(1), 4), vec![0.0, 0.0, -4.0, 0.0]);
        assert_eq!(q.max_value(&key(1), 3), 0.0);
        assert_eq!(q.state_count(), 1);
    }

    #[test]
    fn test_update_toward() {
        let mut q = ValueTable::new();
        let v = q.update_toward(&key(0), 0, 10.0, 0.1);
        assert!((v - 1.0).abs() < 1e-12);
        let v = q.update_toward(&key(0), 0, 10.0, 0.5);
        assert!((v - 5.5).abs() < 1e-12);
    }

    #[test]
    fn test_entries_and_serde() {
        let mut q = ValueTable::new();
        q.set(&StateKey::Tuple(vec![key(1), key(2)]), 1, 3.0);
        q.set(&key(0), 0, 1.0);
        assert_eq!(q.entries().count(), 3);

        let json = serde_json::to_string(&q).unwrap();
        let back: ValueTable = serde_json::from_str(&json).unwrap();
        assert_eq!(q, back);
    }

    #[test]
    fn test_state_values() {
        let mut v = StateValues::new();
        assert!(v.is_empty());
        assert_eq!(v.get(&key(3)), 0.0);
        v.set(key(3), 2.0);
        assert_eq!(v.get(&key(3)), 2.0);
        assert_eq!(v.len(), 1);

        let json = serde_json::to_string(&v).unwrap();
        let back: StateValues = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
