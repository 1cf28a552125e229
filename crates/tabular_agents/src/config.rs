//! Hyperparameter configuration for tabular agents.

use crate::error::{Error, Result};
use crate::types::AlgorithmKind;
use serde::{Deserialize, Serialize};

/// Defines the hyperparameters shared by every tabular agent.
///
/// Not every field is read by every algorithm: dynamic programming ignores the
/// exploration schedule, and only the Dyna family reads the planning fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// The learning rate (alpha) for TD and Dyna updates, in `(0, 1]`.
    pub alpha: f64,
    /// The discount factor (gamma), in `[0, 1]`.
    pub gamma: f64,
    /// The initial exploration rate (epsilon) for epsilon-greedy behaviour.
    pub epsilon: f64,
    /// Multiplicative decay applied to epsilon after every episode. `1.0` keeps epsilon fixed.
    pub epsilon_decay: f64,
    /// The floor that epsilon never decays below.
    pub epsilon_min: f64,
    /// Convergence threshold for dynamic programming sweeps.
    pub theta: f64,
    /// Number of simulated updates per real step (Dyna-Q, Dyna-Q+).
    pub n_planning_steps: usize,
    /// Exploration bonus weight for Dyna-Q+.
    pub kappa: f64,
    /// Time threshold after which the Dyna-Q+ bonus applies.
    pub tau: u64,
    /// Cap on the number of steps in a single training episode.
    pub max_steps_per_episode: usize,
    /// Cap on policy evaluation sweeps per policy iteration step.
    pub max_evaluation_sweeps: usize,
    /// Number of probes per (state, action) when sampling a transition model.
    pub model_samples: usize,
    /// Rewards observed while probing are rounded to a multiple of this value.
    pub reward_resolution: f64,
    /// Allow dynamic programming agents to discover states by random rollouts.
    pub allow_state_discovery: bool,
    /// Number of random rollouts used for state discovery.
    pub discovery_episodes: usize,
    /// Step cap of each discovery rollout.
    pub discovery_max_steps: usize,
    /// Optional seed for the agent's random number generator.
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.99,
            epsilon: 0.1,
            epsilon_decay: 1.0,
            epsilon_min: 0.01,
            theta: 1e-6,
            n_planning_steps: 5,
            kappa: 1e-3,
            tau: 1000,
            max_steps_per_episode: 1000,
            max_evaluation_sweeps: 1000,
            model_samples: 10,
            reward_resolution: 0.05,
            allow_state_discovery: false,
            discovery_episodes: 100,
            discovery_max_steps: 50,
            seed: None,
        }
    }
}

impl AgentConfig {
    /// Returns the classic starting hyperparameters for an algorithm.
    ///
    /// SARSA and Dyna-Q start fully exploratory (`epsilon = 1.0`) and decay by
    /// `0.995` per episode down to `0.05`; every other algorithm keeps a fixed
    /// `epsilon = 0.1`.
    pub fn for_algorithm(kind: AlgorithmKind) -> Self {
        let base = Self::default();
        match kind {
            AlgorithmKind::Sarsa | AlgorithmKind::DynaQ => Self {
                epsilon: 1.0,
                epsilon_decay: 0.995,
                epsilon_min: 0.05,
                ..base
            },
            AlgorithmKind::PolicyIteration | AlgorithmKind::ValueIteration => Self {
                epsilon: 0.0,
                epsilon_min: 0.0,
                ..base
            },
            _ => base,
        }
    }

    /// Sets the learning rate.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the discount factor.
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Sets a fixed exploration rate and disables decay.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self.epsilon_decay = 1.0;
        self.epsilon_min = self.epsilon_min.min(epsilon);
        self
    }

    /// Sets the exploration schedule.
    pub fn with_epsilon_schedule(mut self, epsilon: f64, decay: f64, min: f64) -> Self {
        self.epsilon = epsilon;
        self.epsilon_decay = decay;
        self.epsilon_min = min;
        self
    }

    /// Sets the dynamic programming convergence threshold.
    pub fn with_theta(mut self, theta: f64) -> Self {
        self.theta = theta;
        self
    }

    /// Sets the number of planning steps per real step.
    pub fn with_planning_steps(mut self, n: usize) -> Self {
        self.n_planning_steps = n;
        self
    }

    /// Sets the Dyna-Q+ exploration bonus parameters.
    pub fn with_bonus(mut self, kappa: f64, tau: u64) -> Self {
        self.kappa = kappa;
        self.tau = tau;
        self
    }

    /// Sets the per-episode step cap.
    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps_per_episode = steps;
        self
    }

    /// Sets the number of probes per (state, action) used when sampling a model.
    pub fn with_model_samples(mut self, samples: usize) -> Self {
        self.model_samples = samples;
        self
    }

    /// Enables or disables state discovery for dynamic programming.
    pub fn with_state_discovery(mut self, enabled: bool) -> Self {
        self.allow_state_discovery = enabled;
        self
    }

    /// Fixes the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Checks that every hyperparameter lies in its valid range.
    pub fn validate(&self) -> Result<()> {
        fn unit(name: &str, v: f64) -> Result<()> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(Error::Config(format!("{} must be in [0, 1], got {}", name, v)))
            }
        }

        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(Error::Config(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        unit("gamma", self.gamma)?;
        unit("epsilon", self.epsilon)?;
        unit("epsilon_min", self.epsilon_min)?;
        if self.epsilon_min > self.epsilon {
            return Err(Error::Config(format!(
                "epsilon_min ({}) exceeds epsilon ({})",
                self.epsilon_min, self.epsilon
            )));
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            return Err(Error::Config(format!(
                "epsilon_decay must be in (0, 1], got {}",
                self.epsilon_decay
            )));
        }
        if !(self.theta > 0.0) {
            return Err(Error::Config(format!(
                "theta must be positive, got {}",
                self.theta
            )));
        }
        if !(self.kappa >= 0.0) {
            return Err(Error::Config(format!(
                "kappa must be non-negative, got {}",
                self.kappa
            )));
        }
        if !(self.reward_resolution > 0.0) {
            return Err(Error::Config(format!(
                "reward_resolution must be positive, got {}",
                self.reward_resolution
            )));
        }

        let caps = [
            ("max_steps_per_episode", self.max_steps_per_episode),
            ("max_evaluation_sweeps", self.max_evaluation_sweeps),
            ("model_samples", self.model_samples),
            ("discovery_episodes", self.discovery_episodes),
            ("discovery_max_steps", self.discovery_max_steps),
        ];
        for (name, value) in caps {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
        }
        Ok(())
    }
}
