//! The agent contract and the state every agent shares.
//!
//! Each algorithm family implements [`Agent`]. [`TabularAgent`] is the tagged
//! union over the four families that [`create_agent`](crate::create_agent)
//! returns, so callers can hold any algorithm behind one concrete type.

use crate::algorithms::{DpAgent, DynaAgent, MonteCarloAgent, TdAgent};
use crate::config::AgentConfig;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::persistence::AgentPersistence;
use crate::policy::decay_epsilon;
use crate::state::State;
use crate::types::{
    mean, std_dev, ActionIndex, AlgorithmKind, EpisodeMetrics, EvaluationReport, TrainingStats,
    Transition,
};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

/// Episodes between progress log lines.
const PROGRESS_INTERVAL: usize = 100;
/// Window of recent episodes summarised by [`TrainingStats`].
const STATS_WINDOW: usize = 100;

/// A tabular reinforcement learning agent.
pub trait Agent {
    /// Display name of the agent.
    fn name(&self) -> &str;

    /// The algorithm this agent runs.
    fn kind(&self) -> AlgorithmKind;

    /// The agent's hyperparameters.
    fn config(&self) -> &AgentConfig;

    /// Per-episode training history.
    fn metrics(&self) -> &EpisodeMetrics;

    /// Runs `episodes` training episodes (iterations, for dynamic programming).
    fn train(&mut self, env: &mut dyn Environment, episodes: usize) -> Result<()>;

    /// Chooses an action: exploratory when `training`, otherwise greedy with
    /// random tie-breaking.
    fn select_action(&mut self, state: &State, training: bool) -> Result<ActionIndex>;

    /// Learns from a single transition. A no-op for episodic and planning methods.
    fn update(&mut self, transition: &Transition) -> Result<()>;

    /// Current estimate of every action's value in `state`.
    fn action_values(&self, state: &State) -> Vec<f64>;

    /// Writes the agent, including all learned tables, to `path`.
    fn save(&self, path: &Path) -> Result<()>;

    /// Replaces this agent with the one stored at `path`.
    ///
    /// Fails with [`Error::Persistence`] if the file holds a different algorithm.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Reseeds the agent's random number generator.
    fn reseed(&mut self, seed: u64);

    /// Summary of the training run so far.
    fn training_stats(&self) -> TrainingStats;

    /// Plays `episodes` greedy episodes of at most `max_steps` steps, without learning.
    fn evaluate(
        &mut self,
        env: &mut dyn Environment,
        episodes: usize,
        max_steps: usize,
    ) -> Result<EvaluationReport> {
        let mut rewards = Vec::with_capacity(episodes);
        let mut lengths = Vec::with_capacity(episodes);
        let mut successes = 0;

        for _ in 0..episodes {
            let mut state = env.reset()?;
            let mut total = 0.0;
            let mut steps = 0;
            let mut done = false;
            let mut signalled = None;

            while !done && steps < max_steps {
                let action = self.select_action(&state, false)?;
                let step = env.step(action)?;
                total += step.reward;
                steps += 1;
                done = step.done;
                if step.info.goal_reached.is_some() {
                    signalled = step.info.goal_reached;
                }
                state = step.next_state;
            }

            let success = signalled
                .or_else(|| env.goal_reached())
                .unwrap_or(done && total > 0.0);
            if success {
                successes += 1;
            }
            rewards.push(total);
            lengths.push(steps);
        }

        Ok(EvaluationReport::from_episodes(&rewards, &lengths, successes))
    }
}

fn entropy_rng() -> StdRng {
    StdRng::from_rng(&mut rand::rng())
}

/// State shared by every agent: identity, hyperparameters, exploration rate,
/// training history and the random number generator.
///
/// The generator is not persisted; a loaded agent is reseeded from
/// `config.seed` or from the thread-local generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCore {
    pub name: String,
    pub kind: AlgorithmKind,
    pub config: AgentConfig,
    pub n_actions: usize,
    /// Current exploration rate.
    pub epsilon: f64,
    pub metrics: EpisodeMetrics,
    pub training_time: Duration,
    pub convergence_episode: Option<usize>,
    #[serde(skip, default = "entropy_rng")]
    pub(crate) rng: StdRng,
}

impl AgentCore {
    /// Validates `config` and creates the shared state for an agent.
    pub fn new(kind: AlgorithmKind, config: AgentConfig, n_actions: usize) -> Result<Self> {
        config.validate()?;
        if n_actions == 0 {
            return Err(Error::UnsupportedEnvironment(
                "action space is empty".to_string(),
            ));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => entropy_rng(),
        };
        Ok(Self {
            name: kind.name().to_string(),
            kind,
            epsilon: config.epsilon,
            config,
            n_actions,
            metrics: EpisodeMetrics::default(),
            training_time: Duration::ZERO,
            convergence_episode: None,
            rng,
        })
    }

    /// The agent's random number generator.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Reseeds the random number generator.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Restores the generator after loading from `config.seed`, if any.
    pub(crate) fn restore_rng(&mut self) {
        if let Some(seed) = self.config.seed {
            self.reseed(seed);
        }
    }

    /// Fails unless `env` has the action space this agent was built for.
    pub fn check_env(&self, env: &dyn Environment) -> Result<()> {
        if env.n_actions() != self.n_actions {
            return Err(Error::UnsupportedEnvironment(format!(
                "agent expects {} actions, environment has {}",
                self.n_actions,
                env.n_actions()
            )));
        }
        Ok(())
    }

    /// Fails unless `action` is inside the action space.
    pub fn check_action(&self, action: ActionIndex) -> Result<()> {
        crate::environment::check_action(action, self.n_actions)
    }

    /// Applies one step of the epsilon decay schedule.
    pub fn decay_epsilon(&mut self) {
        self.epsilon = decay_epsilon(
            self.epsilon,
            self.config.epsilon_decay,
            self.config.epsilon_min,
        );
    }

    /// Records a finished episode and logs progress periodically.
    pub fn end_episode(&mut self, episode: usize, total_reward: f64, steps: usize) {
        self.metrics.record(total_reward, steps);
        if (episode + 1) % PROGRESS_INTERVAL == 0 {
            debug!(
                "{} episode {}: mean reward (last {}) = {:.3}, epsilon = {:.4}",
                self.name,
                episode + 1,
                PROGRESS_INTERVAL,
                self.metrics.recent_mean_reward(PROGRESS_INTERVAL),
                self.epsilon
            );
        }
    }

    /// Adds the elapsed time to the training clock and logs a summary.
    pub fn finish_training(&mut self, started: Instant, episodes: usize) {
        self.training_time += started.elapsed();
        info!(
            "{} trained for {} episodes in {:.2?}: mean reward (last {}) = {:.3}",
            self.name,
            episodes,
            self.training_time,
            STATS_WINDOW,
            self.metrics.recent_mean_reward(STATS_WINDOW)
        );
    }

    /// Summary statistics over the recorded history.
    pub fn training_stats(&self) -> TrainingStats {
        let rewards = self.metrics.rewards();
        let recent = &rewards[rewards.len().saturating_sub(STATS_WINDOW)..];
        TrainingStats {
            algorithm: self.name.clone(),
            total_episodes: rewards.len(),
            final_mean_reward: mean(recent),
            final_std_reward: std_dev(recent),
            best_episode_reward: rewards.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            worst_episode_reward: rewards.iter().copied().fold(f64::INFINITY, f64::min),
            training_time: self.training_time,
            convergence_episode: self.convergence_episode,
        }
    }
}

/// Any of the tabular agents in this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TabularAgent {
    /// SARSA, Expected SARSA or Q-Learning.
    Td(TdAgent),
    /// Dyna-Q or Dyna-Q+.
    Dyna(DynaAgent),
    /// One of the Monte Carlo control methods.
    MonteCarlo(MonteCarloAgent),
    /// Policy Iteration or Value Iteration.
    DynamicProgramming(DpAgent),
}

macro_rules! delegate {
    ($self:expr, $agent:ident => $body:expr) => {
        match $self {
            TabularAgent::Td($agent) => $body,
            TabularAgent::Dyna($agent) => $body,
            TabularAgent::MonteCarlo($agent) => $body,
            TabularAgent::DynamicProgramming($agent) => $body,
        }
    };
}

impl TabularAgent {
    /// Loads any saved agent, whatever its algorithm.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::load_from_file(path)
    }

    /// The state shared by every agent.
    pub fn core(&self) -> &AgentCore {
        delegate!(self, a => a.core())
    }

    pub(crate) fn core_mut(&mut self) -> &mut AgentCore {
        delegate!(self, a => a.core_mut())
    }
}

impl Agent for TabularAgent {
    fn name(&self) -> &str {
        delegate!(self, a => a.name())
    }

    fn kind(&self) -> AlgorithmKind {
        delegate!(self, a => a.kind())
    }

    fn config(&self) -> &AgentConfig {
        delegate!(self, a => a.config())
    }

    fn metrics(&self) -> &EpisodeMetrics {
        delegate!(self, a => a.metrics())
    }

    fn train(&mut self, env: &mut dyn Environment, episodes: usize) -> Result<()> {
        delegate!(self, a => a.train(env, episodes))
    }

    fn select_action(&mut self, state: &State, training: bool) -> Result<ActionIndex> {
        delegate!(self, a => a.select_action(state, training))
    }

    fn update(&mut self, transition: &Transition) -> Result<()> {
        delegate!(self, a => a.update(transition))
    }

    fn action_values(&self, state: &State) -> Vec<f64> {
        delegate!(self, a => a.action_values(state))
    }

    fn save(&self, path: &Path) -> Result<()> {
        delegate!(self, a => a.save(path))
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        delegate!(self, a => a.load(path))
    }

    fn reseed(&mut self, seed: u64) {
        delegate!(self, a => a.reseed(seed))
    }

    fn training_stats(&self) -> TrainingStats {
        self.core().training_stats()
    }
}

impl From<TdAgent> for TabularAgent {
    fn from(agent: TdAgent) -> Self {
        TabularAgent::Td(agent)
    }
}

impl From<DynaAgent> for TabularAgent {
    fn from(agent: DynaAgent) -> Self {
        TabularAgent::Dyna(agent)
    }
}

impl From<MonteCarloAgent> for TabularAgent {
    fn from(agent: MonteCarloAgent) -> Self {
        TabularAgent::MonteCarlo(agent)
    }
}

impl From<DpAgent> for TabularAgent {
    fn from(agent: DpAgent) -> Self {
        TabularAgent::DynamicProgramming(agent)
    }
}
