//! Acquiring a transition model from an environment.
//!
//! Sources are tried in order:
//!
//! 1. The environment's own model ([`Environment::transition_model`]).
//! 2. Enumerated probing: every state from [`Environment::all_states`] is
//!    forced with [`Environment::set_state`] and every action is sampled.
//! 3. Discovery (opt-in): states are found by random rollouts and then probed
//!    as in (2). If the environment cannot be forced into a state, the model
//!    is estimated from the transitions the rollouts observed.
//!
//! Anything else is an [`Error::UnsupportedEnvironment`].

use crate::config::AgentConfig;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::model::TransitionModel;
use crate::policy::random_action;
use crate::state::{State, StateKey};
use crate::types::ActionIndex;
use log::{debug, info};
use rand::Rng;
use std::collections::{HashMap, HashSet};

/// Where a built model came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    /// Supplied by the environment.
    Environment,
    /// Probed from an enumerated state list.
    Enumerated,
    /// Probed from states found by random rollouts.
    Discovered,
    /// Estimated from the rollouts themselves.
    Observed,
}

/// Bucket key of a sampled outcome: next state, reward bucket, termination.
type OutcomeBucket = (StateKey, i64, bool);

/// Builds [`TransitionModel`]s for dynamic programming agents.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    samples: usize,
    reward_resolution: f64,
    allow_discovery: bool,
    discovery_episodes: usize,
    discovery_max_steps: usize,
}

impl ModelBuilder {
    /// Creates a builder from the probing fields of `config`.
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            samples: config.model_samples.max(1),
            reward_resolution: config.reward_resolution,
            allow_discovery: config.allow_state_discovery,
            discovery_episodes: config.discovery_episodes,
            discovery_max_steps: config.discovery_max_steps,
        }
    }

    /// Builds a normalized model, reporting which source produced it.
    pub fn build<E, R>(&self, env: &mut E, rng: &mut R) -> Result<(TransitionModel, ModelSource)>
    where
        E: Environment + ?Sized,
        R: Rng + ?Sized,
    {
        if let Some(mut model) = env.transition_model() {
            model.normalize();
            info!(
                "Using environment transition model: {} state-action pairs",
                model.len()
            );
            return Ok((model, ModelSource::Environment));
        }

        if let Some(states) = env.all_states() {
            if let Some(model) = self.probe(env, &states)? {
                info!(
                    "Built transition model by probing {} states: {} state-action pairs",
                    states.len(),
                    model.len()
                );
                return Ok((model, ModelSource::Enumerated));
            }
        }

        if !self.allow_discovery {
            return Err(Error::UnsupportedEnvironment(
                "no transition model, state enumeration or state forcing available".to_string(),
            ));
        }

        let (states, observed) = self.discover(env, rng)?;
        if let Some(model) = self.probe(env, &states)? {
            info!(
                "Built transition model from {} discovered states: {} state-action pairs",
                states.len(),
                model.len()
            );
            return Ok((model, ModelSource::Discovered));
        }

        let model = self.to_model(observed);
        if model.is_empty() {
            return Err(Error::UnsupportedEnvironment(
                "state discovery observed no transitions".to_string(),
            ));
        }
        info!(
            "Estimated transition model from rollouts over {} states: {} state-action pairs",
            states.len(),
            model.len()
        );
        Ok((model, ModelSource::Observed))
    }

    fn bucket_reward(&self, reward: f64) -> i64 {
        (reward / self.reward_resolution).round() as i64
    }

    /// Samples every (state, action) pair from a forced state.
    ///
    /// Returns `None` when the environment cannot be forced into a state.
    fn probe<E>(&self, env: &mut E, states: &[State]) -> Result<Option<TransitionModel>>
    where
        E: Environment + ?Sized,
    {
        let samples = if env.is_deterministic() { 1 } else { self.samples };
        let n_actions = env.n_actions();
        let mut counts: HashMap<(StateKey, ActionIndex), HashMap<OutcomeBucket, usize>> =
            HashMap::new();

        for state in states {
            let key = state.key();
            for action in 0..n_actions {
                for _ in 0..samples {
                    if let Err(e) = env.reset() {
                        debug!("Discarding probe of {} / {}: reset failed: {}", key, action, e);
                        continue;
                    }
                    match env.set_state(state) {
                        Ok(()) => {}
                        Err(Error::UnsupportedEnvironment(_)) => return Ok(None),
                        Err(e) => {
                            debug!("Discarding probe of {} / {}: {}", key, action, e);
                            continue;
                        }
                    }
                    match env.step(action) {
                        Ok(step) => {
                            let bucket = (
                                step.next_state.key(),
                                self.bucket_reward(step.reward),
                                step.done,
                            );
                            *counts
                                .entry((key.clone(), action))
                                .or_default()
                                .entry(bucket)
                                .or_insert(0) += 1;
                        }
                        Err(e) => {
                            debug!("Discarding probe of {} / {}: {}", key, action, e);
                        }
                    }
                }
            }
        }

        env.reset()?;
        Ok(Some(self.to_model(counts)))
    }

    /// Random rollouts collecting visited states and observed transitions.
    fn discover<E, R>(
        &self,
        env: &mut E,
        rng: &mut R,
    ) -> Result<(
        Vec<State>,
        HashMap<(StateKey, ActionIndex), HashMap<OutcomeBucket, usize>>,
    )>
    where
        E: Environment + ?Sized,
        R: Rng + ?Sized,
    {
        let mut seen = HashSet::new();
        let mut states = Vec::new();
        let mut observed: HashMap<(StateKey, ActionIndex), HashMap<OutcomeBucket, usize>> =
            HashMap::new();
        let mut remember = |state: &State, seen: &mut HashSet<StateKey>| {
            if seen.insert(state.key()) {
                states.push(state.clone());
            }
        };

        for _ in 0..self.discovery_episodes {
            let mut state = match env.reset() {
                Ok(s) => s,
                Err(e) => {
                    debug!("Discovery rollout skipped: reset failed: {}", e);
                    continue;
                }
            };
            remember(&state, &mut seen);
            for _ in 0..self.discovery_max_steps {
                let Some(action) = random_action(env.n_actions(), rng) else {
                    break;
                };
                let step = match env.step(action) {
                    Ok(step) => step,
                    Err(e) => {
                        debug!("Discovery rollout stopped: {}", e);
                        break;
                    }
                };
                let bucket = (
                    step.next_state.key(),
                    self.bucket_reward(step.reward),
                    step.done,
                );
                *observed
                    .entry((state.key(), action))
                    .or_default()
                    .entry(bucket)
                    .or_insert(0) += 1;
                if !step.done {
                    remember(&step.next_state, &mut seen);
                }
                if step.done {
                    break;
                }
                state = step.next_state;
            }
        }

        debug!("Discovered {} states", states.len());
        Ok((states, observed))
    }

    fn to_model(
        &self,
        counts: HashMap<(StateKey, ActionIndex), HashMap<OutcomeBucket, usize>>,
    ) -> TransitionModel {
        let mut model = TransitionModel::new();
        for ((state, action), buckets) in counts {
            let total: usize = buckets.values().sum();
            if total == 0 {
                continue;
            }
            for ((next_state, reward_bucket, done), count) in buckets {
                model.add(
                    state.clone(),
                    action,
                    next_state,
                    reward_bucket as f64 * self.reward_resolution,
                    count as f64 / total as f64,
                    done,
                );
            }
        }
        model.normalize();
        model
    }
}
