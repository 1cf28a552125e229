//! Monte Carlo control.
//!
//! Episodes are played to the end (or to the step cap) and then processed
//! backwards with `G = γG + r`:
//!
//! - **Exploring Starts**: the first action of every episode is uniformly
//!   random, then the explicit greedy policy is followed. `Q` is the mean of
//!   the first-visit returns and the policy is made greedy after every update.
//! - **On-Policy**: epsilon-greedy behaviour throughout, first-visit mean returns.
//! - **Off-Policy**: epsilon-greedy behaviour, greedy target policy, weighted
//!   importance sampling. The pass stops at the first step where the
//!   behaviour action is not greedy.
//!
//! The backward passes are plain functions over a recorded [`Trajectory`].

use crate::agent::{Agent, AgentCore};
use crate::config::AgentConfig;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::learning::{Cumulants, ReturnsLedger, ValueTable};
use crate::persistence::{replace_from_file, AgentPersistence};
use crate::policy::{best_actions, epsilon_greedy, greedy_action, random_action, Policy};
use crate::state::{State, StateKey};
use crate::types::{ActionIndex, AlgorithmKind, EpisodeMetrics, TrainingStats, Transition};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

/// The Monte Carlo control method to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum McVariant {
    /// Exploring starts with an explicit greedy policy.
    ExploringStarts,
    /// On-policy first-visit control with epsilon-greedy behaviour.
    #[default]
    OnPolicy,
    /// Off-policy control with weighted importance sampling.
    OffPolicy,
}

impl McVariant {
    /// The algorithm identifier of this variant.
    pub fn kind(&self) -> AlgorithmKind {
        match self {
            McVariant::ExploringStarts => AlgorithmKind::MonteCarloExploringStarts,
            McVariant::OnPolicy => AlgorithmKind::MonteCarloOnPolicy,
            McVariant::OffPolicy => AlgorithmKind::MonteCarloOffPolicy,
        }
    }
}

/// One `(s_t, a_t, r_{t+1})` step of an episode.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryStep {
    pub state: StateKey,
    pub action: ActionIndex,
    pub reward: f64,
}

/// A recorded episode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    steps: Vec<TrajectoryStep>,
}

impl Trajectory {
    /// Creates an empty trajectory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step.
    pub fn push(&mut self, state: StateKey, action: ActionIndex, reward: f64) {
        self.steps.push(TrajectoryStep {
            state,
            action,
            reward,
        });
    }

    /// The recorded steps, in time order.
    pub fn steps(&self) -> &[TrajectoryStep] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no step was recorded.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Undiscounted sum of rewards.
    pub fn total_reward(&self) -> f64 {
        self.steps.iter().map(|s| s.reward).sum()
    }

    /// For each step, whether it is the first occurrence of its `(state, action)` pair.
    pub fn first_visits(&self) -> Vec<bool> {
        let mut first: HashMap<(&StateKey, ActionIndex), usize> = HashMap::new();
        for (t, step) in self.steps.iter().enumerate() {
            first.entry((&step.state, step.action)).or_insert(t);
        }
        self.steps
            .iter()
            .enumerate()
            .map(|(t, step)| first.get(&(&step.state, step.action)) == Some(&t))
            .collect()
    }
}

impl FromIterator<(StateKey, ActionIndex, f64)> for Trajectory {
    fn from_iter<I: IntoIterator<Item = (StateKey, ActionIndex, f64)>>(iter: I) -> Self {
        Self {
            steps: iter
                .into_iter()
                .map(|(state, action, reward)| TrajectoryStep {
                    state,
                    action,
                    reward,
                })
                .collect(),
        }
    }
}

/// First-visit backward pass.
///
/// Appends the return of each pair's first occurrence to `returns`, sets `Q`
/// to the mean of its returns, and calls `on_update` with the updated state.
/// Returns the number of pairs updated.
pub fn first_visit_update<F>(
    trajectory: &Trajectory,
    gamma: f64,
    q: &mut ValueTable,
    returns: &mut ReturnsLedger,
    mut on_update: F,
) -> usize
where
    F: FnMut(&StateKey, &ValueTable),
{
    let first = trajectory.first_visits();
    let mut g = 0.0;
    let mut updated = 0;
    for (t, step) in trajectory.steps().iter().enumerate().rev() {
        g = gamma * g + step.reward;
        if first[t] {
            let mean = returns.append(step.state.clone(), step.action, g);
            q.set(&step.state, step.action, mean);
            on_update(&step.state, q);
            updated += 1;
        }
    }
    updated
}

/// Weighted importance-sampling backward pass for an epsilon-greedy
/// behaviour policy and a greedy target policy.
///
/// Returns the number of steps processed before the pass stopped.
#[allow(clippy::too_many_arguments)]
pub fn weighted_importance_update<R: Rng + ?Sized>(
    trajectory: &Trajectory,
    gamma: f64,
    epsilon: f64,
    n_actions: usize,
    q: &mut ValueTable,
    cumulants: &mut Cumulants,
    target: &mut Policy,
    rng: &mut R,
) -> usize {
    let mut g = 0.0;
    let mut w = 1.0;
    let mut processed = 0;
    for step in trajectory.steps().iter().rev() {
        // W grows geometrically along tied steps; stop before C(s, a) overflows.
        if !(cumulants.get(&step.state, step.action) + w).is_finite() {
            break;
        }
        g = gamma * g + step.reward;
        processed += 1;

        let c = cumulants.add(step.state.clone(), step.action, w);
        let current = q.get(&step.state, step.action);
        q.set(&step.state, step.action, current + (w / c) * (g - current));

        let best = best_actions(&q.values(&step.state, n_actions));
        if !best.contains(&step.action) {
            if let Some(&greedy) = best.choose(rng) {
                target.set(step.state.clone(), greedy);
            }
            break;
        }
        target.set(step.state.clone(), step.action);

        let behaviour = epsilon / n_actions as f64 + (1.0 - epsilon) / best.len() as f64;
        w /= behaviour;
        if !w.is_finite() {
            break;
        }
    }
    processed
}

/// A Monte Carlo control agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloAgent {
    core: AgentCore,
    variant: McVariant,
    q: ValueTable,
    returns: ReturnsLedger,
    cumulants: Cumulants,
    policy: Policy,
}

impl MonteCarloAgent {
    /// Creates an agent for an environment with `n_actions` actions.
    pub fn new(variant: McVariant, config: AgentConfig, n_actions: usize) -> Result<Self> {
        Ok(Self {
            core: AgentCore::new(variant.kind(), config, n_actions)?,
            variant,
            q: ValueTable::new(),
            returns: ReturnsLedger::new(),
            cumulants: Cumulants::new(),
            policy: Policy::new(),
        })
    }

    /// The algorithm variant.
    pub fn variant(&self) -> McVariant {
        self.variant
    }

    /// The learned action values.
    pub fn q_table(&self) -> &ValueTable {
        &self.q
    }

    /// First-visit returns (Exploring Starts and On-Policy).
    pub fn returns(&self) -> &ReturnsLedger {
        &self.returns
    }

    /// Importance-sampling weights (Off-Policy).
    pub fn cumulants(&self) -> &Cumulants {
        &self.cumulants
    }

    /// The explicit policy (Exploring Starts) or target policy (Off-Policy).
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn core(&self) -> &AgentCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    /// Learns from one complete episode.
    pub fn learn_episode(&mut self, trajectory: &Trajectory) -> Result<()> {
        if let Some(step) = trajectory
            .steps()
            .iter()
            .find(|s| s.action >= self.core.n_actions)
        {
            return Err(Error::InvalidAction {
                action: step.action,
                n_actions: self.core.n_actions,
            });
        }
        let gamma = self.core.config.gamma;
        let n_actions = self.core.n_actions;
        match self.variant {
            McVariant::ExploringStarts => {
                let policy = &mut self.policy;
                let rng = &mut self.core.rng;
                first_visit_update(trajectory, gamma, &mut self.q, &mut self.returns, |s, q| {
                    if let Some(best) = greedy_action(&q.values(s, n_actions), rng) {
                        policy.set(s.clone(), best);
                    }
                });
            }
            McVariant::OnPolicy => {
                first_visit_update(trajectory, gamma, &mut self.q, &mut self.returns, |_, _| {});
            }
            McVariant::OffPolicy => {
                weighted_importance_update(
                    trajectory,
                    gamma,
                    self.core.epsilon,
                    n_actions,
                    &mut self.q,
                    &mut self.cumulants,
                    &mut self.policy,
                    &mut self.core.rng,
                );
            }
        }
        Ok(())
    }

    fn generate_episode(&mut self, env: &mut dyn Environment) -> Result<Trajectory> {
        let mut trajectory = Trajectory::new();
        let mut state = env.reset()?;
        let mut action = match self.variant {
            McVariant::ExploringStarts => random_action(self.core.n_actions, self.core.rng())
                .ok_or_else(|| Error::Internal("action space is empty".to_string()))?,
            _ => self.select_action(&state, true)?,
        };

        while trajectory.len() < self.core.config.max_steps_per_episode {
            let step = env.step(action)?;
            trajectory.push(state.key(), action, step.reward);
            if step.done {
                break;
            }
            state = step.next_state;
            action = self.select_action(&state, true)?;
        }
        Ok(trajectory)
    }
}

impl Agent for MonteCarloAgent {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn kind(&self) -> AlgorithmKind {
        self.core.kind
    }

    fn config(&self) -> &AgentConfig {
        &self.core.config
    }

    fn metrics(&self) -> &EpisodeMetrics {
        &self.core.metrics
    }

    fn train(&mut self, env: &mut dyn Environment, episodes: usize) -> Result<()> {
        self.core.check_env(env)?;
        let started = Instant::now();
        for episode in 0..episodes {
            let trajectory = self.generate_episode(env)?;
            self.learn_episode(&trajectory)?;
            self.core.decay_epsilon();
            self.core
                .end_episode(episode, trajectory.total_reward(), trajectory.len());
        }
        self.core.finish_training(started, episodes);
        Ok(())
    }

    fn select_action(&mut self, state: &State, training: bool) -> Result<ActionIndex> {
        let key = state.key();
        let n_actions = self.core.n_actions;
        let action = match (self.variant, training) {
            (McVariant::ExploringStarts, true) => match self.policy.get(&key) {
                Some(a) => Some(a),
                None => random_action(n_actions, self.core.rng()),
            },
            (McVariant::OnPolicy | McVariant::OffPolicy, true) => {
                let epsilon = self.core.epsilon;
                epsilon_greedy(&self.q.values(&key, n_actions), epsilon, self.core.rng())
            }
            (McVariant::OnPolicy, false) => {
                greedy_action(&self.q.values(&key, n_actions), self.core.rng())
            }
            (McVariant::ExploringStarts | McVariant::OffPolicy, false) => {
                match self.policy.get(&key) {
                    Some(a) => Some(a),
                    None => greedy_action(&self.q.values(&key, n_actions), self.core.rng()),
                }
            }
        };
        action.ok_or_else(|| Error::Internal("action space is empty".to_string()))
    }

    /// Monte Carlo methods learn from whole episodes; see [`MonteCarloAgent::learn_episode`].
    fn update(&mut self, _transition: &Transition) -> Result<()> {
        Ok(())
    }

    fn action_values(&self, state: &State) -> Vec<f64> {
        self.q.values(&state.key(), self.core.n_actions)
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.save_to_file(path)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        replace_from_file(self, path)
    }

    fn reseed(&mut self, seed: u64) {
        self.core.reseed(seed);
    }

    fn training_stats(&self) -> TrainingStats {
        self.core.training_stats()
    }
}
