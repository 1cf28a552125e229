//! Dyna-Q and Dyna-Q+: Q-Learning with simulated experience from a learned model.
//!
//! Every real step performs a Q-Learning update, records the observed outcome
//! in a deterministic model (the last observation wins), and then replays
//! `n_planning_steps` transitions sampled uniformly from the pairs seen so far.
//!
//! Dyna-Q+ adds an exploration bonus `κ √Δt` to simulated rewards, where `Δt`
//! is the number of real steps since the pair was last tried. The bonus only
//! applies once `Δt` exceeds `τ`.

use super::select_from_table;
use crate::agent::{Agent, AgentCore};
use crate::config::AgentConfig;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::learning::{pairs, ValueTable};
use crate::persistence::{replace_from_file, AgentPersistence};
use crate::state::{State, StateKey};
use crate::types::{ActionIndex, AlgorithmKind, EpisodeMetrics, TrainingStats, Transition};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

/// The Dyna algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DynaVariant {
    /// Plain Dyna-Q.
    #[default]
    DynaQ,
    /// Dyna-Q+ with an exploration bonus for long-untried pairs.
    DynaQPlus,
}

impl DynaVariant {
    /// The algorithm identifier of this variant.
    pub fn kind(&self) -> AlgorithmKind {
        match self {
            DynaVariant::DynaQ => AlgorithmKind::DynaQ,
            DynaVariant::DynaQPlus => AlgorithmKind::DynaQPlus,
        }
    }
}

/// The last observed outcome of a `(state, action)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub next_state: StateKey,
    pub reward: f64,
    pub done: bool,
    /// Global time step of the last real visit.
    pub last_visit: u64,
}

/// A Dyna-Q or Dyna-Q+ agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynaAgent {
    core: AgentCore,
    variant: DynaVariant,
    q: ValueTable,
    #[serde(with = "pairs")]
    model: HashMap<(StateKey, ActionIndex), ModelEntry>,
    /// Every pair with a model entry, once each, in first-visit order.
    visited: Vec<(StateKey, ActionIndex)>,
    time_step: u64,
}

impl DynaAgent {
    /// Creates an agent for an environment with `n_actions` actions.
    pub fn new(variant: DynaVariant, config: AgentConfig, n_actions: usize) -> Result<Self> {
        Ok(Self {
            core: AgentCore::new(variant.kind(), config, n_actions)?,
            variant,
            q: ValueTable::new(),
            model: HashMap::new(),
            visited: Vec::new(),
            time_step: 0,
        })
    }

    /// The algorithm variant.
    pub fn variant(&self) -> DynaVariant {
        self.variant
    }

    /// The learned action values.
    pub fn q_table(&self) -> &ValueTable {
        &self.q
    }

    /// The model entry of a pair, if it has been tried.
    pub fn model_entry(&self, state: &State, action: ActionIndex) -> Option<&ModelEntry> {
        self.model.get(&(state.key(), action))
    }

    /// Number of pairs that planning can sample from.
    pub fn planning_candidates(&self) -> usize {
        self.visited.len()
    }

    /// Number of pairs in the model.
    pub fn model_size(&self) -> usize {
        self.model.len()
    }

    /// Real steps taken so far.
    pub fn time_step(&self) -> u64 {
        self.time_step
    }

    pub fn core(&self) -> &AgentCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    /// Dyna-Q+ bonus for simulating `(state, action)` at the current time.
    ///
    /// A pair never tried for real receives the bonus for the whole elapsed
    /// time. Dyna-Q always returns `0.0`.
    pub fn exploration_bonus(&self, state: &StateKey, action: ActionIndex) -> f64 {
        if self.variant != DynaVariant::DynaQPlus {
            return 0.0;
        }
        let kappa = self.core.config.kappa;
        match self.model.get(&(state.clone(), action)) {
            None => kappa * (self.time_step as f64).sqrt(),
            Some(entry) => {
                let elapsed = self.time_step.saturating_sub(entry.last_visit);
                if elapsed > self.core.config.tau {
                    kappa * (elapsed as f64).sqrt()
                } else {
                    0.0
                }
            }
        }
    }

    fn q_update(
        &mut self,
        state: &StateKey,
        action: ActionIndex,
        reward: f64,
        next: &StateKey,
        done: bool,
    ) {
        let continuation = if done {
            0.0
        } else {
            self.q.max_value(next, self.core.n_actions)
        };
        let target = reward + self.core.config.gamma * continuation;
        self.q
            .update_toward(state, action, target, self.core.config.alpha);
    }

    /// Replays one simulated transition from a uniformly sampled visited pair.
    fn plan_once(&mut self) -> Result<()> {
        let Some(pair) = self.visited.choose(self.core.rng()).cloned() else {
            return Ok(());
        };
        let entry = self.model.get(&pair).cloned().ok_or_else(|| {
            Error::Internal(format!("visited pair {} / {} has no model entry", pair.0, pair.1))
        })?;
        let reward = entry.reward + self.exploration_bonus(&pair.0, pair.1);
        self.q_update(&pair.0, pair.1, reward, &entry.next_state, entry.done);
        Ok(())
    }

    fn run_episode(&mut self, env: &mut dyn Environment) -> Result<(f64, usize)> {
        let mut state = env.reset()?;
        let mut total = 0.0;
        let mut steps = 0;

        while steps < self.core.config.max_steps_per_episode {
            let action = self.select_action(&state, true)?;
            let step = env.step(action)?;
            total += step.reward;
            steps += 1;

            let transition =
                Transition::new(state, action, step.reward, step.next_state, step.done);
            self.update(&transition)?;
            if step.done {
                break;
            }
            state = transition.next_state;
        }
        Ok((total, steps))
    }
}

impl Agent for DynaAgent {
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
            let (total, steps) = self.run_episode(env)?;
            self.core.decay_epsilon();
            self.core.end_episode(episode, total, steps);
        }
        self.core.finish_training(started, episodes);
        Ok(())
    }

    fn select_action(&mut self, state: &State, training: bool) -> Result<ActionIndex> {
        select_from_table(&self.q, &mut self.core, &state.key(), training)
    }

    /// One real step: advance the clock, learn from the transition, record it
    /// in the model, then plan.
    fn update(&mut self, transition: &Transition) -> Result<()> {
        self.core.check_action(transition.action)?;
        self.time_step += 1;

        let state = transition.state.key();
        let next = transition.next_state.key();
        let action = transition.action;
        self.q_update(&state, action, transition.reward, &next, transition.done);

        let pair = (state, action);
        if !self.model.contains_key(&pair) {
            self.visited.push(pair.clone());
        }
        self.model.insert(
            pair,
            ModelEntry {
                next_state: next,
                reward: transition.reward,
                done: transition.done,
                last_visit: self.time_step,
            },
        );

        for _ in 0..self.core.config.n_planning_steps {
            self.plan_once()?;
        }
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
