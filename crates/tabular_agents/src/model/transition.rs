//! A tabular model of `p(s', r | s, a)`.

use crate::learning::{pairs, StateValues};
use crate::state::StateKey;
use crate::types::ActionIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

const NORMALIZATION_TOLERANCE: f64 = 1e-6;

/// One possible result of taking an action in a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub next_state: StateKey,
    pub reward: f64,
    pub probability: f64,
    pub done: bool,
}

/// Transition probabilities indexed by `(state, action)`.
///
/// Terminal states (any state reached with `done`) are tracked separately and
/// contribute no continuation value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionModel {
    #[serde(with = "pairs")]
    outcomes: HashMap<(StateKey, ActionIndex), Vec<Outcome>>,
    terminal: HashSet<StateKey>,
}

impl TransitionModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds probability mass for `(state, action) -> (next_state, reward, done)`.
    ///
    /// Mass for an outcome already present (same next state, reward and
    /// termination) is accumulated.
    pub fn add(
        &mut self,
        state: StateKey,
        action: ActionIndex,
        next_state: StateKey,
        reward: f64,
        probability: f64,
        done: bool,
    ) {
        if done {
            self.terminal.insert(next_state.clone());
        }
        let list = self.outcomes.entry((state, action)).or_default();
        match list
            .iter_mut()
            .find(|o| o.next_state == next_state && o.reward == reward && o.done == done)
        {
            Some(existing) => existing.probability += probability,
            None => list.push(Outcome {
                next_state,
                reward,
                probability,
                done,
            }),
        }
    }

    /// Marks a state as terminal.
    pub fn mark_terminal(&mut self, state: StateKey) {
        self.terminal.insert(state);
    }

    /// Returns true if `state` is terminal.
    pub fn is_terminal(&self, state: &StateKey) -> bool {
        self.terminal.contains(state)
    }

    /// The outcomes of `(state, action)`; empty if unmodelled.
    pub fn outcomes(&self, state: &StateKey, action: ActionIndex) -> &[Outcome] {
        self.outcomes
            .get(&(state.clone(), action))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// `p(next_state, reward | state, action)`.
    pub fn probability(
        &self,
        state: &StateKey,
        action: ActionIndex,
        next_state: &StateKey,
        reward: f64,
    ) -> f64 {
        self.outcomes(state, action)
            .iter()
            .filter(|o| &o.next_state == next_state && (o.reward - reward).abs() < 1e-9)
            .map(|o| o.probability)
            .sum()
    }

    /// Total probability mass of `(state, action)`.
    pub fn total_probability(&self, state: &StateKey, action: ActionIndex) -> f64 {
        self.outcomes(state, action)
            .iter()
            .map(|o| o.probability)
            .sum()
    }

    /// Rescales every populated pair so its probabilities sum to one.
    ///
    /// Pairs carrying no mass are dropped.
    pub fn normalize(&mut self) {
        self.outcomes.retain(|_, list| {
            let total: f64 = list.iter().map(|o| o.probability).sum();
            if total <= 0.0 {
                return false;
            }
            if (total - 1.0).abs() > NORMALIZATION_TOLERANCE {
                for o in list.iter_mut() {
                    o.probability /= total;
                }
            }
            true
        });
    }

    /// Returns true if every populated pair sums to one within `1e-6`.
    pub fn is_normalized(&self) -> bool {
        self.outcomes.values().all(|list| {
            let total: f64 = list.iter().map(|o| o.probability).sum();
            (total - 1.0).abs() <= NORMALIZATION_TOLERANCE
        })
    }

    /// Every state with at least one modelled action, in a stable order.
    pub fn states(&self) -> Vec<StateKey> {
        self.outcomes
            .keys()
            .map(|(s, _)| s.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of modelled `(state, action)` pairs.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if nothing is modelled.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Expected one-step return `Σ p (r + γ V(s'))` of `(state, action)`.
    ///
    /// Terminal next states contribute no continuation value. Returns `None`
    /// when the pair has no modelled outcomes.
    pub fn backup(
        &self,
        state: &StateKey,
        action: ActionIndex,
        values: &StateValues,
        gamma: f64,
    ) -> Option<f64> {
        let outcomes = self.outcomes(state, action);
        if outcomes.is_empty() {
            return None;
        }
        Some(
            outcomes
                .iter()
                .map(|o| {
                    let continuation = if o.done || self.is_terminal(&o.next_state) {
                        0.0
                    } else {
                        values.get(&o.next_state)
                    };
                    o.probability * (o.reward + gamma * continuation)
                })
                .sum(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(i: i64) -> StateKey {
        StateKey::Int(i)
    }

    #[test]
    fn test_add_merges_identical_outcomes() {
        let mut model = TransitionModel::new();
        model.add(k(0), 1, k(1), -1.0, 0.5, false);
        model.add(k(0), 1, k(1), -1.0, 0.25, false);
        model.add(k(0), 1, k(0), -1.0, 0.25, false);
        assert_eq!(model.outcomes(&k(0), 1).len(), 2);
        assert!((model.probability(&k(0), 1, &k(1), -1.0) - 0.75).abs() < 1e-12);
        assert_eq!(model.probability(&k(0), 1, &k(1), 5.0), 0.0);
        assert_eq!(model.probability(&k(0), 0, &k(1), -1.0), 0.0);
    }

    #[test]
    fn test_normalize_within_tolerance() {
        let mut model = TransitionModel::new();
        model.add(k(0), 0, k(1), 0.0, 3.0, false);
        model.add(k(0), 0, k(2), 1.0, 1.0, true);
        model.add(k(1), 0, k(2), 1.0, 0.3, true);
        model.add(k(1), 1, k(0), 0.0, 0.0, false);
        assert!(!model.is_normalized());

        model.normalize();
        assert!(model.is_normalized());
        assert!((model.total_probability(&k(0), 0) - 1.0).abs() <= 1e-6);
        assert!((model.probability(&k(0), 0, &k(1), 0.0) - 0.75).abs() < 1e-12);
        assert!(model.outcomes(&k(1), 1).is_empty());
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn test_terminal_tracking_and_states() {
        let mut model = TransitionModel::new();
        model.add(k(1), 0, k(2), 10.0, 1.0, true);
        model.add(k(0), 1, k(1), -1.0, 1.0, false);
        assert!(model.is_terminal(&k(2)));
        assert!(!model.is_terminal(&k(1)));
        assert_eq!(model.states(), vec![k(0), k(1)]);
    }

    #[test]
    fn test_backup() {
        let mut model = TransitionModel::new();
        model.add(k(0), 0, k(1), 1.0, 0.5, false);
        model.add(k(0), 0, k(2), 10.0, 0.5, true);
        let mut values = StateValues::new();
        values.set(k(1), 4.0);
        values.set(k(2), 100.0);

        let v = model.backup(&k(0), 0, &values, 0.5).unwrap();
        assert!((v - (0.5 * (1.0 + 2.0) + 0.5 * 10.0)).abs() < 1e-12);
        assert_eq!(model.backup(&k(0), 1, &values, 0.5), None);
    }

    #[test]
    fn test_serde() {
        let mut model = TransitionModel::new();
        model.add(StateKey::Tuple(vec![k(0), k(1)]), 2, k(3), 0.5, 1.0, true);
        let json = serde_json::to_string(&model).unwrap();
        let back: TransitionModel = serde_json::from_str(&json).unwrap();
        assert_eq!(model, back);
    }
}
