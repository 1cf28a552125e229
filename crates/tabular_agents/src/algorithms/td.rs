//! Temporal-difference control: SARSA, Expected SARSA and Q-Learning.
//!
//! All three share the update `Q(s,a) += α (target - Q(s,a))` and differ only
//! in how the target bootstraps from the next state:
//!
//! - **Q-Learning**: `r + γ max_a' Q(s',a')`
//! - **SARSA**: `r + γ Q(s',a')`, where `a'` is the action actually taken next
//! - **Expected SARSA**: `r + γ Σ π(a'|s') Q(s',a')` under the epsilon-greedy policy
//!
//! Terminal transitions bootstrap zero. Epsilon decays after every episode.

use super::select_from_table;
use crate::agent::{Agent, AgentCore};
use crate::config::AgentConfig;
use crate::environment::Environment;
use crate::error::Result;
use crate::learning::ValueTable;
use crate::persistence::{replace_from_file, AgentPersistence};
use crate::policy::action_probabilities;
use crate::state::State;
use crate::types::{ActionIndex, AlgorithmKind, EpisodeMetrics, TrainingStats, Transition};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// The TD control algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TdVariant {
    /// On-policy TD control.
    Sarsa,
    /// TD control bootstrapping on the expected next value.
    ExpectedSarsa,
    /// Off-policy TD control.
    #[default]
    QLearning,
}

impl TdVariant {
    /// The algorithm identifier of this variant.
    pub fn kind(&self) -> AlgorithmKind {
        match self {
            TdVariant::Sarsa => AlgorithmKind::Sarsa,
            TdVariant::ExpectedSarsa => AlgorithmKind::ExpectedSarsa,
            TdVariant::QLearning => AlgorithmKind::QLearning,
        }
    }
}

/// A temporal-difference control agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TdAgent {
    core: AgentCore,
    variant: TdVariant,
    q: ValueTable,
}

impl TdAgent {
    /// Creates an agent for an environment with `n_actions` actions.
    pub fn new(variant: TdVariant, config: AgentConfig, n_actions: usize) -> Result<Self> {
        Ok(Self {
            core: AgentCore::new(variant.kind(), config, n_actions)?,
            variant,
            q: ValueTable::new(),
        })
    }

    /// The algorithm variant.
    pub fn variant(&self) -> TdVariant {
        self.variant
    }

    /// The learned action values.
    pub fn q_table(&self) -> &ValueTable {
        &self.q
    }

    /// The current exploration rate.
    pub fn epsilon(&self) -> f64 {
        self.core.epsilon
    }

    pub fn core(&self) -> &AgentCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    /// Value of the next state that the target bootstraps from.
    fn bootstrap(&mut self, transition: &Transition) -> Result<f64> {
        if transition.done {
            return Ok(0.0);
        }
        let n = self.core.n_actions;
        let next = transition.next_state.key();
        let value = match self.variant {
            TdVariant::QLearning => self.q.max_value(&next, n),
            TdVariant::Sarsa => {
                let next_action = match transition.next_action {
                    Some(a) => {
                        self.core.check_action(a)?;
                        a
                    }
                    None => select_from_table(&self.q, &mut self.core, &next, true)?,
                };
                self.q.get(&next, next_action)
            }
            TdVariant::ExpectedSarsa => {
                let values = self.q.values(&next, n);
                action_probabilities(&values, self.core.epsilon)
                    .iter()
                    .zip(values.iter())
                    .map(|(p, q)| p * q)
                    .sum()
            }
        };
        Ok(value)
    }

    fn run_episode(&mut self, env: &mut dyn Environment) -> Result<(f64, usize)> {
        let mut state = env.reset()?;
        let mut action = self.select_action(&state, true)?;
        let mut total = 0.0;
        let mut steps = 0;

        while steps < self.core.config.max_steps_per_episode {
            let step = env.step(action)?;
            total += step.reward;
            steps += 1;

            let mut transition =
                Transition::new(state, action, step.reward, step.next_state, step.done);
            let mut next_action = None;
            if self.variant == TdVariant::Sarsa && !step.done {
                let a = self.select_action(&transition.next_state, true)?;
                transition = transition.with_next_action(a);
                next_action = Some(a);
            }
            self.update(&transition)?;

            if step.done {
                break;
            }
            state = transition.next_state;
            action = match next_action {
                Some(a) => a,
                None => self.select_action(&state, true)?,
            };
        }
        Ok((total, steps))
    }
}

impl Agent for TdAgent {
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

    /// Applies one TD update. A SARSA transition without `next_action`
    /// bootstraps from an action sampled from the exploration policy.
    fn update(&mut self, transition: &Transition) -> Result<()> {
        self.core.check_action(transition.action)?;
        let target = transition.reward + self.core.config.gamma * self.bootstrap(transition)?;
        self.q.update_toward(
            &transition.state.key(),
            transition.action,
            target,
            self.core.config.alpha,
        );
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn agent(variant: TdVariant) -> TdAgent {
        let config = AgentConfig::default()
            .with_alpha(0.5)
            .with_gamma(0.9)
            .with_epsilon(0.2)
            .with_seed(3);
        TdAgent::new(variant, config, 2).unwrap()
    }

    fn seed_next_state(agent: &mut TdAgent) {
        let s1 = State::Int(1).key();
        agent.q.set(&s1, 0, 2.0);
        agent.q.set(&s1, 1, 4.0);
    }

    #[test]
    fn test_q_learning_update() {
        let mut agent = agent(TdVariant::QLearning);
        seed_next_state(&mut agent);
        agent
            .update(&Transition::new(State::Int(0), 1, 1.0, State::Int(1), false))
            .unwrap();
        // 0 + 0.5 * (1 + 0.9 * 4 - 0)
        assert!((agent.q_table().get(&State::Int(0).key(), 1) - 2.3).abs() < 1e-12);
    }

    #[test]
    fn test_sarsa_uses_next_action() {
        let mut agent = agent(TdVariant::Sarsa);
        seed_next_state(&mut agent);
        agent
            .update(
                &Transition::new(State::Int(0), 1, 1.0, State::Int(1), false).with_next_action(0),
            )
            .unwrap();
        // 0.5 * (1 + 0.9 * 2)
        assert!((agent.q_table().get(&State::Int(0).key(), 1) - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_expected_sarsa_update() {
        let mut agent = agent(TdVariant::ExpectedSarsa);
        seed_next_state(&mut agent);
        agent
            .update(&Transition::new(State::Int(0), 0, 1.0, State::Int(1), false))
            .unwrap();
        // π = [0.1, 0.9]; E[Q] = 0.2 + 3.6 = 3.8; 0.5 * (1 + 0.9 * 3.8)
        assert!((agent.q_table().get(&State::Int(0).key(), 0) - 2.21).abs() < 1e-12);
    }

    #[test]
    fn test_terminal_bootstraps_zero() {
        for variant in [TdVariant::QLearning, TdVariant::Sarsa, TdVariant::ExpectedSarsa] {
            let mut agent = agent(variant);
            seed_next_state(&mut agent);
            agent
                .update(&Transition::new(State::Int(0), 0, 10.0, State::Int(1), true))
                .unwrap();
            assert!((agent.q_table().get(&State::Int(0).key(), 0) - 5.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_invalid_action_rejected() {
        let mut agent = agent(TdVariant::QLearning);
        let result = agent.update(&Transition::new(State::Int(0), 5, 0.0, State::Int(1), false));
        assert!(matches!(
            result,
            Err(Error::InvalidAction {
                action: 5,
                n_actions: 2
            })
        ));
        let result = agent.update(
            &Transition::new(State::Int(0), 0, 0.0, State::Int(1), false).with_next_action(9),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_greedy_selection() {
        let mut agent = agent(TdVariant::QLearning);
        seed_next_state(&mut agent);
        for _ in 0..20 {
            assert_eq!(agent.select_action(&State::Int(1), false).unwrap(), 1);
        }
    }

    #[test]
    fn test_kind_and_name() {
        let agent = agent(TdVariant::ExpectedSarsa);
        assert_eq!(agent.kind(), AlgorithmKind::ExpectedSarsa);
        assert_eq!(agent.name(), "Expected SARSA");
        assert_eq!(agent.variant(), TdVariant::ExpectedSarsa);
    }
}
