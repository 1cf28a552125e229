//! Action-selection helpers and the explicit policy table.
//!
//! Every agent selects actions through the same few functions: a greedy
//! argmax with uniformly random tie-breaking, epsilon-greedy exploration on
//! top of it, and the epsilon-greedy action distribution that Expected SARSA
//! and off-policy Monte Carlo need in closed form.

use crate::learning::pairs;
use crate::state::StateKey;
use crate::types::ActionIndex;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Indices of every action whose value equals the maximum.
pub fn best_actions(values: &[f64]) -> Vec<ActionIndex> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    values
        .iter()
        .enumerate()
        .filter(|(_, &v)| v == max)
        .map(|(i, _)| i)
        .collect()
}

/// Greedy action with ties broken uniformly at random. `None` if `values` is empty.
pub fn greedy_action<R: Rng + ?Sized>(values: &[f64], rng: &mut R) -> Option<ActionIndex> {
    best_actions(values).choose(rng).copied()
}

/// Uniformly random action in `0..n_actions`.
pub fn random_action<R: Rng + ?Sized>(n_actions: usize, rng: &mut R) -> Option<ActionIndex> {
    if n_actions == 0 {
        None
    } else {
        Some(rng.random_range(0..n_actions))
    }
}

/// With probability `epsilon` a uniformly random action, otherwise greedy.
pub fn epsilon_greedy<R: Rng + ?Sized>(
    values: &[f64],
    epsilon: f64,
    rng: &mut R,
) -> Option<ActionIndex> {
    if rng.random::<f64>() < epsilon {
        random_action(values.len(), rng)
    } else {
        greedy_action(values, rng)
    }
}

/// Probability of each action under epsilon-greedy.
///
/// `epsilon` is spread uniformly over all actions and `1 - epsilon` is split
/// evenly across the tied maximizers.
pub fn action_probabilities(values: &[f64], epsilon: f64) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let best = best_actions(values);
    let explore = epsilon / n as f64;
    let exploit = (1.0 - epsilon) / best.len() as f64;
    let mut probs = vec![explore; n];
    for a in best {
        probs[a] += exploit;
    }
    probs
}

/// `max(epsilon_min, epsilon * decay)`.
pub fn decay_epsilon(epsilon: f64, decay: f64, epsilon_min: f64) -> f64 {
    (epsilon * decay).max(epsilon_min)
}

/// An explicit deterministic policy: one action per known state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(with = "pairs")]
    actions: HashMap<StateKey, ActionIndex>,
}

impl Policy {
    /// Creates an empty policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// The action for `state`, if one has been set.
    pub fn get(&self, state: &StateKey) -> Option<ActionIndex> {
        self.actions.get(state).copied()
    }

    /// Sets the action for `state`, returning the previous one.
    pub fn set(&mut self, state: StateKey, action: ActionIndex) -> Option<ActionIndex> {
        self.actions.insert(state, action)
    }

    /// Number of states with an action.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if no state has an action.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Iterates over `(state, action)` entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&StateKey, &ActionIndex)> {
        self.actions.iter()
    }
}
