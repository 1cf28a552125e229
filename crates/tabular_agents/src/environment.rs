//! The environment contract agents train against.
//!
//! An environment exposes a discrete action space and an episodic
//! `reset`/`step` loop. Optional capabilities (a known transition model,
//! state enumeration, state forcing, goal detection) default to "not
//! supported"; dynamic programming agents and the evaluator query them
//! instead of probing for attributes.

use crate::error::{Error, Result};
use crate::model::TransitionModel;
use crate::state::State;
use crate::types::ActionIndex;
use serde::{Deserialize, Serialize};

/// Auxiliary information returned with a step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Explicit success signal for the episode, if the environment knows it.
    pub goal_reached: Option<bool>,
    /// Free-form extra fields.
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl StepInfo {
    /// Info carrying an explicit success flag.
    pub fn goal(reached: bool) -> Self {
        Self {
            goal_reached: Some(reached),
            fields: serde_json::Map::new(),
        }
    }

    /// Adds a free-form field.
    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

/// The result of one environment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub next_state: State,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

impl Step {
    /// Creates a step with empty info.
    pub fn new(next_state: State, reward: f64, done: bool) -> Self {
        Self {
            next_state,
            reward,
            done,
            info: StepInfo::default(),
        }
    }

    /// Attaches info to the step.
    pub fn with_info(mut self, info: StepInfo) -> Self {
        self.info = info;
        self
    }
}

/// A discrete-state, discrete-action episodic environment.
pub trait Environment {
    /// Starts a new episode and returns the initial state.
    fn reset(&mut self) -> Result<State>;

    /// Applies an action. Actions outside `0..n_actions()` must yield
    /// [`Error::InvalidAction`].
    fn step(&mut self, action: ActionIndex) -> Result<Step>;

    /// Size of the action space.
    fn n_actions(&self) -> usize;

    /// The valid action indices.
    fn action_space(&self) -> Vec<ActionIndex> {
        (0..self.n_actions()).collect()
    }

    /// The exact transition model, when the environment knows it.
    fn transition_model(&self) -> Option<TransitionModel> {
        None
    }

    /// Every state of the environment, when it can enumerate them.
    fn all_states(&self) -> Option<Vec<State>> {
        None
    }

    /// Forces the environment into `state` so it can be probed from there.
    fn set_state(&mut self, _state: &State) -> Result<()> {
        Err(Error::UnsupportedEnvironment(
            "environment cannot be forced into a state".to_string(),
        ))
    }

    /// Whether the current episode reached the goal, when the environment knows.
    fn goal_reached(&self) -> Option<bool> {
        None
    }

    /// Whether `step` is a deterministic function of (state, action).
    /// Deterministic environments are probed once per pair.
    fn is_deterministic(&self) -> bool {
        false
    }
}

/// Returns `InvalidAction` unless `action` is in `0..n_actions`.
pub fn check_action(action: ActionIndex, n_actions: usize) -> Result<()> {
    if action < n_actions {
        Ok(())
    } else {
        Err(Error::InvalidAction { action, n_actions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Coin {
        flips: usize,
    }

    impl Environment for Coin {
        fn reset(&mut self) -> Result<State> {
            self.flips = 0;
            Ok(State::Int(0))
        }

        fn step(&mut self, action: ActionIndex) -> Result<Step> {
            check_action(action, self.n_actions())?;
            self.flips += 1;
            Ok(Step::new(State::Int(action as i64), 1.0, self.flips >= 2))
        }

        fn n_actions(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_default_capabilities() {
        let mut env = Coin { flips: 0 };
        assert_eq!(env.action_space(), vec![0, 1]);
        assert!(env.transition_model().is_none());
        assert!(env.all_states().is_none());
        assert!(env.goal_reached().is_none());
        assert!(!env.is_deterministic());
        assert!(matches!(
            env.set_state(&State::Int(0)),
            Err(Error::UnsupportedEnvironment(_))
        ));
    }

    #[test]
    fn test_invalid_action() {
        let mut env = Coin { flips: 0 };
        env.reset().unwrap();
        assert!(matches!(
            env.step(2),
            Err(Error::InvalidAction {
                action: 2,
                n_actions: 2
            })
        ));
        let step = env.step(1).unwrap();
        assert_eq!(step.next_state, State::Int(1));
        assert!(!step.done);
    }

    #[test]
    fn test_step_info() {
        let info = StepInfo::goal(true).with_field("door", 2);
        assert_eq!(info.goal_reached, Some(true));
        assert_eq!(info.fields["door"], serde_json::json!(2));
        let step = Step::new(State::Bool(true), 0.0, true).with_info(info.clone());
        assert_eq!(step.info, info);
    }
}
