#![doc = include_str!("../README.md")]
//! # Tabular Agents
//!
//! Classic tabular reinforcement learning control algorithms behind one
//! agent contract.
//!
//! ## Overview
//!
//! Every agent in this crate can:
//! - **Train** against any discrete [`Environment`]
//! - **Act** greedily or with exploration through [`Agent::select_action`]
//! - **Evaluate** itself without learning through [`Agent::evaluate`]
//! - **Persist** everything it has learned and be reloaded later
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        TabularAgent                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌───────────┐  │
//! │  │  TdAgent   │ │ DynaAgent  │ │ MonteCarlo │ │  DpAgent  │  │
//! │  │            │ │            │ │   Agent    │ │           │  │
//! │  │ • SARSA    │ │ • Dyna-Q   │ │ • ES       │ │ • PI      │  │
//! │  │ • E-SARSA  │ │ • Dyna-Q+  │ │ • On-pol.  │ │ • VI      │  │
//! │  │ • Q-Learn. │ │            │ │ • Off-pol. │ │           │  │
//! │  └─────┬──────┘ └─────┬──────┘ └─────┬──────┘ └─────┬─────┘  │
//! │        └──────────────┴──────┬───────┴──────────────┘        │
//! │                       ┌──────▼───────┐   ┌────────────────┐  │
//! │                       │ ValueTable   │   │ TransitionModel│  │
//! │                       │ Policy       │   │ ModelBuilder   │  │
//! │                       │ StateKey     │   └────────────────┘  │
//! │                       └──────────────┘                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabular_agents::{create_agent, Agent, AgentConfig, AlgorithmKind};
//!
//! let mut env = MyCorridor::new(5);
//! let config = AgentConfig::for_algorithm(AlgorithmKind::QLearning).with_seed(42);
//! let mut agent = create_agent(AlgorithmKind::QLearning, config, &mut env)?;
//!
//! agent.train(&mut env, 500)?;
//! let report = agent.evaluate(&mut env, 100, 100)?;
//! println!("success rate: {:.2}", report.success_rate);
//! ```
//!
//! ## Dynamic Programming
//!
//! Policy and Value Iteration need a model. It is taken from
//! [`Environment::transition_model`] when available, otherwise probed through
//! [`Environment::all_states`] and [`Environment::set_state`]. See
//! [`model::ModelBuilder`].

pub mod agent;
pub mod algorithms;
pub mod config;
pub mod environment;
pub mod error;
pub mod learning;
pub mod model;
pub mod persistence;
pub mod policy;
pub mod state;
pub mod types;

pub use agent::{Agent, AgentCore, TabularAgent};
pub use algorithms::{
    DpAgent, DpVariant, DynaAgent, DynaVariant, McVariant, ModelEntry, MonteCarloAgent,
    TdAgent, TdVariant, Trajectory, TrajectoryStep,
};
pub use config::AgentConfig;
pub use environment::{Environment, Step, StepInfo};
pub use error::{Error, Result};
pub use learning::{Cumulants, ReturnsLedger, StateValues, ValueTable};
pub use model::{ModelBuilder, ModelSource, Outcome, TransitionModel};
pub use persistence::{AgentPersistence, AgentSnapshot, PersistenceOptions, FORMAT_VERSION};
pub use policy::Policy;
pub use state::{State, StateKey};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Creates an agent running `kind` for `env`.
///
/// Model-free agents only read the action count from `env`. Dynamic
/// programming agents also build their transition model from it here, so an
/// environment that offers no model fails now rather than during training.
///
/// # Errors
///
/// - [`Error::Config`] if `config` does not validate.
/// - [`Error::UnsupportedEnvironment`] if `env` has no actions, or no model
///   can be acquired for a dynamic programming agent.
///
/// # See Also
///
/// - [`AgentConfig::for_algorithm`] for per-algorithm defaults
/// - [`TabularAgent::load_from`] to restore a saved agent
pub fn create_agent(
    kind: AlgorithmKind,
    config: AgentConfig,
    env: &mut dyn Environment,
) -> Result<TabularAgent> {
    let n_actions = env.n_actions();
    let agent = match kind {
        AlgorithmKind::PolicyIteration => {
            DpAgent::new(DpVariant::PolicyIteration, config, env)?.into()
        }
        AlgorithmKind::ValueIteration => {
            DpAgent::new(DpVariant::ValueIteration, config, env)?.into()
        }
        AlgorithmKind::MonteCarloExploringStarts => {
            MonteCarloAgent::new(McVariant::ExploringStarts, config, n_actions)?.into()
        }
        AlgorithmKind::MonteCarloOnPolicy => {
            MonteCarloAgent::new(McVariant::OnPolicy, config, n_actions)?.into()
        }
        AlgorithmKind::MonteCarloOffPolicy => {
            MonteCarloAgent::new(McVariant::OffPolicy, config, n_actions)?.into()
        }
        AlgorithmKind::Sarsa => TdAgent::new(TdVariant::Sarsa, config, n_actions)?.into(),
        AlgorithmKind::ExpectedSarsa => {
            TdAgent::new(TdVariant::ExpectedSarsa, config, n_actions)?.into()
        }
        AlgorithmKind::QLearning => TdAgent::new(TdVariant::QLearning, config, n_actions)?.into(),
        AlgorithmKind::DynaQ => DynaAgent::new(DynaVariant::DynaQ, config, n_actions)?.into(),
        AlgorithmKind::DynaQPlus => {
            DynaAgent::new(DynaVariant::DynaQPlus, config, n_actions)?.into()
        }
    };
    Ok(agent)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two states and no model: enough for every model-free algorithm.
    struct Flip {
        heads: bool,
    }

    impl Environment for Flip {
        fn reset(&mut self) -> Result<State> {
            self.heads = false;
            Ok(State::Bool(false))
        }

        fn step(&mut self, action: ActionIndex) -> Result<Step> {
            environment::check_action(action, 2)?;
            self.heads = action == 1;
            Ok(Step::new(State::Bool(self.heads), 1.0, true))
        }

        fn n_actions(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_create_every_model_free_agent() {
        let mut env = Flip { heads: false };
        for kind in AlgorithmKind::ALL {
            let config = AgentConfig::for_algorithm(kind);
            let result = create_agent(kind, config, &mut env);
            if kind.requires_model() {
                assert!(matches!(result, Err(Error::UnsupportedEnvironment(_))));
            } else {
                let agent = result.unwrap();
                assert_eq!(agent.kind(), kind);
                assert_eq!(agent.name(), kind.name());
            }
        }
    }

    #[test]
    fn test_create_agent_rejects_bad_config() {
        let mut env = Flip { heads: false };
        let config = AgentConfig::default().with_gamma(1.5);
        assert!(matches!(
            create_agent(AlgorithmKind::Sarsa, config, &mut env),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
