//! Core data types shared by every agent: algorithm identifiers, transitions,
//! episode metrics and evaluation reports.

use crate::state::State;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Index of a discrete action, `0..n_actions`.
pub type ActionIndex = usize;

/// A timestamp in microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Returns the current timestamp.
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        let micros = (now.timestamp() as u64) * 1_000_000 + (now.timestamp_subsec_micros() as u64);
        Self(micros)
    }

    /// Seconds elapsed since this timestamp.
    pub fn age_secs(&self) -> u64 {
        Self::now().0.saturating_sub(self.0) / 1_000_000
    }
}

/// The tabular control algorithms provided by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmKind {
    /// Policy Iteration (dynamic programming).
    PolicyIteration,
    /// Value Iteration (dynamic programming).
    ValueIteration,
    /// Monte Carlo control with exploring starts.
    MonteCarloExploringStarts,
    /// On-policy first-visit Monte Carlo control.
    MonteCarloOnPolicy,
    /// Off-policy Monte Carlo control with weighted importance sampling.
    MonteCarloOffPolicy,
    /// SARSA (on-policy TD control).
    Sarsa,
    /// Expected SARSA.
    ExpectedSarsa,
    /// Q-Learning (off-policy TD control).
    QLearning,
    /// Dyna-Q.
    DynaQ,
    /// Dyna-Q+ with an exploration bonus.
    DynaQPlus,
}

impl AlgorithmKind {
    /// Every algorithm, in a stable order.
    pub const ALL: [AlgorithmKind; 10] = [
        AlgorithmKind::PolicyIteration,
        AlgorithmKind::ValueIteration,
        AlgorithmKind::MonteCarloExploringStarts,
        AlgorithmKind::MonteCarloOnPolicy,
        AlgorithmKind::MonteCarloOffPolicy,
        AlgorithmKind::Sarsa,
        AlgorithmKind::ExpectedSarsa,
        AlgorithmKind::QLearning,
        AlgorithmKind::DynaQ,
        AlgorithmKind::DynaQPlus,
    ];

    /// Display name of the algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmKind::PolicyIteration => "Policy Iteration",
            AlgorithmKind::ValueIteration => "Value Iteration",
            AlgorithmKind::MonteCarloExploringStarts => "MC Exploring Starts",
            AlgorithmKind::MonteCarloOnPolicy => "MC On-Policy",
            AlgorithmKind::MonteCarloOffPolicy => "MC Off-Policy",
            AlgorithmKind::Sarsa => "SARSA",
            AlgorithmKind::ExpectedSarsa => "Expected SARSA",
            AlgorithmKind::QLearning => "Q-Learning",
            AlgorithmKind::DynaQ => "Dyna-Q",
            AlgorithmKind::DynaQPlus => "Dyna-Q+",
        }
    }

    /// Whether the algorithm needs a transition model before training.
    pub fn requires_model(&self) -> bool {
        matches!(
            self,
            AlgorithmKind::PolicyIteration | AlgorithmKind::ValueIteration
        )
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single `(s, a, r, s', done)` experience, with the next action for SARSA.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: State,
    pub action: ActionIndex,
    pub reward: f64,
    pub next_state: State,
    /// The action that will actually be taken in `next_state`, if already chosen.
    pub next_action: Option<ActionIndex>,
    pub done: bool,
}

impl Transition {
    /// Creates a new transition.
    pub fn new(state: State, action: ActionIndex, reward: f64, next_state: State, done: bool) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            next_action: None,
            done,
        }
    }

    /// Associates the next action with the transition (for SARSA).
    pub fn with_next_action(mut self, next_action: ActionIndex) -> Self {
        self.next_action = Some(next_action);
        self
    }
}

/// Outcome of one training episode (or one DP iteration).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub total_reward: f64,
    pub steps: usize,
}

/// Append-only history of training episodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetrics {
    records: Vec<EpisodeRecord>,
}

impl EpisodeMetrics {
    /// Appends one episode.
    pub fn record(&mut self, total_reward: f64, steps: usize) {
        self.records.push(EpisodeRecord {
            total_reward,
            steps,
        });
    }

    /// All recorded episodes, oldest first.
    pub fn records(&self) -> &[EpisodeRecord] {
        &self.records
    }

    /// Number of recorded episodes.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rewards of every recorded episode.
    pub fn rewards(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.total_reward).collect()
    }

    /// Step counts of every recorded episode.
    pub fn lengths(&self) -> Vec<usize> {
        self.records.iter().map(|r| r.steps).collect()
    }

    /// Mean reward over the last `window` episodes.
    pub fn recent_mean_reward(&self, window: usize) -> f64 {
        let start = self.records.len().saturating_sub(window);
        let recent: Vec<f64> = self.records[start..]
            .iter()
            .map(|r| r.total_reward)
            .collect();
        mean(&recent)
    }
}

/// Result of greedy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub mean_reward: f64,
    pub std_reward: f64,
    pub min_reward: f64,
    pub max_reward: f64,
    pub mean_steps: f64,
    pub std_steps: f64,
    /// Fraction of episodes that reached the goal, in `[0, 1]`.
    pub success_rate: f64,
    pub total_episodes: usize,
}

impl EvaluationReport {
    /// Summarises per-episode rewards, step counts and success flags.
    pub fn from_episodes(rewards: &[f64], steps: &[usize], successes: usize) -> Self {
        let steps: Vec<f64> = steps.iter().map(|&s| s as f64).collect();
        let total = rewards.len();
        Self {
            mean_reward: mean(rewards),
            std_reward: std_dev(rewards),
            min_reward: rewards.iter().copied().fold(f64::INFINITY, f64::min),
            max_reward: rewards.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean_steps: mean(&steps),
            std_steps: std_dev(&steps),
            success_rate: if total == 0 {
                0.0
            } else {
                successes as f64 / total as f64
            },
            total_episodes: total,
        }
    }
}

/// Summary of a finished training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
    pub algorithm: String,
    pub total_episodes: usize,
    /// Mean reward over the last 100 episodes.
    pub final_mean_reward: f64,
    /// Standard deviation of reward over the last 100 episodes.
    pub final_std_reward: f64,
    pub best_episode_reward: f64,
    pub worst_episode_reward: f64,
    pub training_time: Duration,
    pub convergence_episode: Option<usize>,
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0 for an empty slice.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}
