//! Policy Iteration and Value Iteration over a [`TransitionModel`].
//!
//! The model is acquired once, at construction, through [`ModelBuilder`].
//! Each training "episode" is one iteration of the chosen method followed by
//! a short greedy probe of the environment, whose mean return is recorded in
//! the agent's metrics.

use crate::agent::{Agent, AgentCore};
use crate::config::AgentConfig;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::learning::StateValues;
use crate::model::{ModelBuilder, TransitionModel};
use crate::persistence::{replace_from_file, AgentPersistence};
use crate::policy::{best_actions, greedy_action, random_action, Policy};
use crate::state::{State, StateKey};
use crate::types::{mean, ActionIndex, AlgorithmKind, EpisodeMetrics, TrainingStats, Transition};
use log::{info, warn};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// Greedy episodes played after every iteration.
const PROBE_EPISODES: usize = 10;
/// Step cap of a probe episode.
const PROBE_MAX_STEPS: usize = 100;

/// The dynamic programming method to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DpVariant {
    /// Alternate full policy evaluation and greedy improvement.
    #[default]
    PolicyIteration,
    /// Bellman optimality sweeps.
    ValueIteration,
}

impl DpVariant {
    /// The algorithm identifier of this variant.
    pub fn kind(&self) -> AlgorithmKind {
        match self {
            DpVariant::PolicyIteration => AlgorithmKind::PolicyIteration,
            DpVariant::ValueIteration => AlgorithmKind::ValueIteration,
        }
    }
}

/// A dynamic programming agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DpAgent {
    core: AgentCore,
    variant: DpVariant,
    model: TransitionModel,
    values: StateValues,
    policy: Policy,
}

impl DpAgent {
    /// Builds the transition model of `env` and creates an agent over it.
    ///
    /// Fails with [`Error::UnsupportedEnvironment`] when no model can be
    /// acquired from the environment.
    pub fn new(variant: DpVariant, config: AgentConfig, env: &mut dyn Environment) -> Result<Self> {
        let mut core = AgentCore::new(variant.kind(), config, env.n_actions())?;
        let (model, source) = ModelBuilder::new(&core.config).build(env, core.rng())?;
        info!(
            "{}: model from {:?} source, {} states",
            core.name,
            source,
            model.states().len()
        );
        Ok(Self::with_core(core, variant, model))
    }

    /// Creates an agent over a known model.
    pub fn from_model(
        variant: DpVariant,
        config: AgentConfig,
        n_actions: usize,
        mut model: TransitionModel,
    ) -> Result<Self> {
        let core = AgentCore::new(variant.kind(), config, n_actions)?;
        model.normalize();
        Ok(Self::with_core(core, variant, model))
    }

    fn with_core(core: AgentCore, variant: DpVariant, model: TransitionModel) -> Self {
        let mut policy = Policy::new();
        for state in model.states() {
            if model.is_terminal(&state) {
                continue;
            }
            if let Some(action) =
                (0..core.n_actions).find(|&a| !model.outcomes(&state, a).is_empty())
            {
                policy.set(state, action);
            }
        }
        Self {
            core,
            variant,
            model,
            values: StateValues::new(),
            policy,
        }
    }

    /// The algorithm variant.
    pub fn variant(&self) -> DpVariant {
        self.variant
    }

    /// The model the agent plans with.
    pub fn transition_model(&self) -> &TransitionModel {
        &self.model
    }

    /// The current state-value estimates.
    pub fn values(&self) -> &StateValues {
        &self.values
    }

    /// The current policy.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// `V(state)`; `0.0` for states outside the model.
    pub fn state_value(&self, state: &State) -> f64 {
        self.values.get(&state.key())
    }

    /// The policy's action in `state`, if the state is modelled.
    pub fn policy_action(&self, state: &State) -> Option<ActionIndex> {
        self.policy.get(&state.key())
    }

    pub fn core(&self) -> &AgentCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    /// Non-terminal states with at least one modelled action.
    fn planning_states(&self) -> Vec<StateKey> {
        self.model
            .states()
            .into_iter()
            .filter(|s| !self.model.is_terminal(s))
            .collect()
    }

    /// Model action values of `state`; unmodelled actions score `-inf`.
    fn q_values(&self, state: &StateKey) -> Vec<f64> {
        let gamma = self.core.config.gamma;
        (0..self.core.n_actions)
            .map(|a| {
                self.model
                    .backup(state, a, &self.values, gamma)
                    .unwrap_or(f64::NEG_INFINITY)
            })
            .collect()
    }

    /// Evaluates the current policy in place until the largest change in a
    /// sweep is below `theta` or the sweep cap is reached.
    ///
    /// Returns the number of sweeps run.
    pub fn evaluate_policy(&mut self) -> usize {
        let states = self.planning_states();
        let gamma = self.core.config.gamma;
        let theta = self.core.config.theta;
        let cap = self.core.config.max_evaluation_sweeps;

        for sweep in 1..=cap {
            let mut delta: f64 = 0.0;
            for state in &states {
                let Some(action) = self.policy.get(state) else {
                    continue;
                };
                let Some(value) = self.model.backup(state, action, &self.values, gamma) else {
                    continue;
                };
                delta = delta.max((value - self.values.get(state)).abs());
                self.values.set(state.clone(), value);
            }
            if delta < theta {
                return sweep;
            }
        }
        warn!(
            "{}: policy evaluation stopped at the {}-sweep cap",
            self.core.name, cap
        );
        cap
    }

    /// Makes the policy greedy with respect to the current values.
    ///
    /// An action that is still among the maximizers is kept; otherwise a
    /// maximizer is picked at random. Returns true if no action changed.
    pub fn improve_policy(&mut self) -> bool {
        let mut stable = true;
        for state in self.planning_states() {
            let q = self.q_values(&state);
            let best = best_actions(&q);
            let current = self.policy.get(&state);
            if current.is_some_and(|a| best.contains(&a)) {
                continue;
            }
            if let Some(&action) = best.choose(self.core.rng()) {
                self.policy.set(state, action);
                stable = false;
            }
        }
        stable
    }

    /// One Bellman optimality sweep, then a greedy policy refresh.
    ///
    /// Returns the largest value change.
    pub fn value_sweep(&mut self) -> f64 {
        let mut delta: f64 = 0.0;
        for state in self.planning_states() {
            let best = self
                .q_values(&state)
                .into_iter()
                .fold(f64::NEG_INFINITY, f64::max);
            if best == f64::NEG_INFINITY {
                continue;
            }
            delta = delta.max((best - self.values.get(&state)).abs());
            self.values.set(state, best);
        }
        self.improve_policy();
        delta
    }

    /// Mean return of a few short greedy episodes.
    fn probe(&mut self, env: &mut dyn Environment) -> Result<f64> {
        let mut returns = Vec::with_capacity(PROBE_EPISODES);
        for _ in 0..PROBE_EPISODES {
            let mut state = env.reset()?;
            let mut total = 0.0;
            for _ in 0..PROBE_MAX_STEPS {
                let action = self.select_action(&state, false)?;
                let step = env.step(action)?;
                total += step.reward;
                if step.done {
                    break;
                }
                state = step.next_state;
            }
            returns.push(total);
        }
        Ok(mean(&returns))
    }
}

impl Agent for DpAgent {
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

    /// Runs up to `episodes` iterations, stopping early once converged.
    fn train(&mut self, env: &mut dyn Environment, episodes: usize) -> Result<()> {
        self.core.check_env(env)?;
        let started = Instant::now();
        let mut converged = false;
        let mut iterations = 0;

        for iteration in 0..episodes {
            converged = match self.variant {
                DpVariant::PolicyIteration => {
                    self.evaluate_policy();
                    self.improve_policy()
                }
                DpVariant::ValueIteration => self.value_sweep() < self.core.config.theta,
            };
            let probe = self.probe(env)?;
            self.core.end_episode(iteration, probe, 1);
            iterations = iteration + 1;
            if converged {
                self.core.convergence_episode = Some(iterations);
                info!("{} converged after {} iterations", self.core.name, iterations);
                break;
            }
        }
        if !converged && episodes > 0 {
            warn!(
                "{} did not converge within {} iterations",
                self.core.name, episodes
            );
        }
        self.core.finish_training(started, iterations);
        Ok(())
    }

    /// Follows the policy, falling back to the model's greedy action for
    /// states without one. During training an epsilon above zero adds
    /// uniform exploration.
    fn select_action(&mut self, state: &State, training: bool) -> Result<ActionIndex> {
        let n_actions = self.core.n_actions;
        if training {
            let epsilon = self.core.epsilon;
            if epsilon > 0.0 && self.core.rng().random::<f64>() < epsilon {
                return random_action(n_actions, self.core.rng())
                    .ok_or_else(|| Error::Internal("action space is empty".to_string()));
            }
        }
        let key = state.key();
        if let Some(action) = self.policy.get(&key) {
            return Ok(action);
        }
        let q = self.q_values(&key);
        greedy_action(&q, self.core.rng())
            .ok_or_else(|| Error::Internal("action space is empty".to_string()))
    }

    /// Planning methods learn from the model, not from transitions.
    fn update(&mut self, _transition: &Transition) -> Result<()> {
        Ok(())
    }

    /// One-step lookahead values; `-inf` for actions the model does not cover.
    fn action_values(&self, state: &State) -> Vec<f64> {
        self.q_values(&state.key())
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
