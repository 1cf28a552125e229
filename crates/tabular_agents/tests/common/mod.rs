//! Environments shared by the integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tabular_agents::environment::check_action;
use tabular_agents::{
    ActionIndex, Environment, Error, Result, State, Step, StepInfo, TransitionModel,
};

pub const LEFT: ActionIndex = 0;
pub const RIGHT: ActionIndex = 1;

/// Installs `env_logger` once per test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A corridor of `len` cells. The agent starts in cell 0; reaching the last
/// cell pays +10 and ends the episode, every other step costs 1.
#[derive(Debug, Clone)]
pub struct LineWorld {
    pub len: i64,
    pub pos: i64,
}

impl LineWorld {
    pub fn new(len: i64) -> Self {
        Self { len, pos: 0 }
    }

    pub fn goal(&self) -> i64 {
        self.len - 1
    }

    fn move_to(&self, from: i64, action: ActionIndex) -> i64 {
        if action == RIGHT {
            (from + 1).min(self.goal())
        } else {
            (from - 1).max(0)
        }
    }
}

impl Environment for LineWorld {
    fn reset(&mut self) -> Result<State> {
        self.pos = 0;
        Ok(State::Int(self.pos))
    }

    fn step(&mut self, action: ActionIndex) -> Result<Step> {
        check_action(action, 2)?;
        self.pos = self.move_to(self.pos, action);
        let done = self.pos == self.goal();
        let reward = if done { 10.0 } else { -1.0 };
        Ok(Step::new(State::Int(self.pos), reward, done))
    }

    fn n_actions(&self) -> usize {
        2
    }

    fn all_states(&self) -> Option<Vec<State>> {
        Some((0..self.len).map(State::Int).collect())
    }

    fn set_state(&mut self, state: &State) -> Result<()> {
        match state.as_int() {
            Some(pos) if (0..self.len).contains(&pos) => {
                self.pos = pos;
                Ok(())
            }
            _ => Err(Error::Environment(format!("no cell {}", state.key()))),
        }
    }

    fn goal_reached(&self) -> Option<bool> {
        Some(self.pos == self.goal())
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

/// A LineWorld that hides its states. `set_state` is optionally available.
#[derive(Debug, Clone)]
pub struct HiddenLineWorld {
    pub inner: LineWorld,
    pub can_set_state: bool,
}

impl HiddenLineWorld {
    pub fn new(len: i64, can_set_state: bool) -> Self {
        Self {
            inner: LineWorld::new(len),
            can_set_state,
        }
    }
}

impl Environment for HiddenLineWorld {
    fn reset(&mut self) -> Result<State> {
        self.inner.reset()
    }

    fn step(&mut self, action: ActionIndex) -> Result<Step> {
        self.inner.step(action)
    }

    fn n_actions(&self) -> usize {
        2
    }

    fn set_state(&mut self, state: &State) -> Result<()> {
        if self.can_set_state {
            self.inner.set_state(state)
        } else {
            Err(Error::UnsupportedEnvironment(
                "hidden corridor cannot be forced".to_string(),
            ))
        }
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

/// A `size` x `size` grid with `(row, col)` states. Actions are up, right,
/// down and left; the bottom-right cell pays +10, every other step costs 1.
/// The exact transition model is supplied.
#[derive(Debug, Clone)]
pub struct GridWorld {
    pub size: i64,
    pub row: i64,
    pub col: i64,
}

impl GridWorld {
    pub fn new(size: i64) -> Self {
        Self {
            size,
            row: 0,
            col: 0,
        }
    }

    fn cell(row: i64, col: i64) -> State {
        State::pair(row, col)
    }

    fn is_goal(&self, row: i64, col: i64) -> bool {
        row == self.size - 1 && col == self.size - 1
    }

    fn next(&self, row: i64, col: i64, action: ActionIndex) -> (i64, i64) {
        let last = self.size - 1;
        match action {
            0 => ((row - 1).max(0), col),
            1 => (row, (col + 1).min(last)),
            2 => ((row + 1).min(last), col),
            _ => (row, (col - 1).max(0)),
        }
    }
}

impl Environment for GridWorld {
    fn reset(&mut self) -> Result<State> {
        self.row = 0;
        self.col = 0;
        Ok(Self::cell(0, 0))
    }

    fn step(&mut self, action: ActionIndex) -> Result<Step> {
        check_action(action, 4)?;
        let (row, col) = self.next(self.row, self.col, action);
        self.row = row;
        self.col = col;
        let done = self.is_goal(row, col);
        let reward = if done { 10.0 } else { -1.0 };
        Ok(Step::new(Self::cell(row, col), reward, done).with_info(StepInfo::goal(done)))
    }

    fn n_actions(&self) -> usize {
        4
    }

    fn transition_model(&self) -> Option<TransitionModel> {
        let mut model = TransitionModel::new();
        for row in 0..self.size {
            for col in 0..self.size {
                if self.is_goal(row, col) {
                    continue;
                }
                for action in 0..4 {
                    let (r2, c2) = self.next(row, col, action);
                    let done = self.is_goal(r2, c2);
                    let reward = if done { 10.0 } else { -1.0 };
                    model.add(
                        Self::cell(row, col).key(),
                        action,
                        Self::cell(r2, c2).key(),
                        reward,
                        1.0,
                        done,
                    );
                }
            }
        }
        Some(model)
    }
}

/// A LineWorld where the chosen move happens with probability `0.8` and the
/// opposite move otherwise.
#[derive(Debug, Clone)]
pub struct SlipperyCorridor {
    pub inner: LineWorld,
    rng: StdRng,
}

impl SlipperyCorridor {
    pub fn new(len: i64, seed: u64) -> Self {
        Self {
            inner: LineWorld::new(len),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Environment for SlipperyCorridor {
    fn reset(&mut self) -> Result<State> {
        self.inner.reset()
    }

    fn step(&mut self, action: ActionIndex) -> Result<Step> {
        check_action(action, 2)?;
        let actual = if self.rng.random::<f64>() < 0.8 {
            action
        } else {
            1 - action
        };
        self.inner.step(actual)
    }

    fn n_actions(&self) -> usize {
        2
    }

    fn all_states(&self) -> Option<Vec<State>> {
        self.inner.all_states()
    }

    fn set_state(&mut self, state: &State) -> Result<()> {
        self.inner.set_state(state)
    }

    fn goal_reached(&self) -> Option<bool> {
        self.inner.goal_reached()
    }
}

/// Rock, paper, scissors against a scripted opponent over two rounds.
///
/// The opponent opens with rock, then plays whatever beats the agent's
/// previous move. States are `(round, agent's previous move)` tuples.
/// Win +1, draw 0, loss -1. The best total is 2.
#[derive(Debug, Clone, Default)]
pub struct RockPaperScissors {
    round: i64,
    last: Option<ActionIndex>,
}

pub const ROCK: ActionIndex = 0;
pub const PAPER: ActionIndex = 1;
pub const SCISSORS: ActionIndex = 2;

impl RockPaperScissors {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> State {
        let last = match self.last {
            Some(ROCK) => "rock",
            Some(PAPER) => "paper",
            Some(_) => "scissors",
            None => "none",
        };
        State::pair(self.round, last)
    }

    fn beats(mv: ActionIndex) -> ActionIndex {
        (mv + 1) % 3
    }
}

impl Environment for RockPaperScissors {
    fn reset(&mut self) -> Result<State> {
        self.round = 0;
        self.last = None;
        Ok(self.state())
    }

    fn step(&mut self, action: ActionIndex) -> Result<Step> {
        check_action(action, 3)?;
        let opponent = match self.last {
            None => ROCK,
            Some(previous) => Self::beats(previous),
        };
        let reward = if action == opponent {
            0.0
        } else if action == Self::beats(opponent) {
            1.0
        } else {
            -1.0
        };
        self.round += 1;
        self.last = Some(action);
        let done = self.round == 2;
        Ok(Step::new(self.state(), reward, done))
    }

    fn n_actions(&self) -> usize {
        3
    }
}

/// A one-step game that always pays `reward` and never reports success.
#[derive(Debug, Clone)]
pub struct OneShot {
    pub reward: f64,
}

impl Environment for OneShot {
    fn reset(&mut self) -> Result<State> {
        Ok(State::Text("start".to_string()))
    }

    fn step(&mut self, action: ActionIndex) -> Result<Step> {
        check_action(action, 2)?;
        Ok(Step::new(State::Text("end".to_string()), self.reward, true))
    }

    fn n_actions(&self) -> usize {
        2
    }
}

/// One state, four actions, zero reward, never terminates.
#[derive(Debug, Clone, Default)]
pub struct Treadmill;

impl Environment for Treadmill {
    fn reset(&mut self) -> Result<State> {
        Ok(State::Int(0))
    }

    fn step(&mut self, action: ActionIndex) -> Result<Step> {
        check_action(action, 4)?;
        Ok(Step::new(State::Int(0), 0.0, false))
    }

    fn n_actions(&self) -> usize {
        4
    }
}

/// An environment whose every step fails.
#[derive(Debug, Clone, Default)]
pub struct Broken;

impl Environment for Broken {
    fn reset(&mut self) -> Result<State> {
        Ok(State::Int(0))
    }

    fn step(&mut self, action: ActionIndex) -> Result<Step> {
        Err(Error::InvalidAction {
            action,
            n_actions: 0,
        })
    }

    fn n_actions(&self) -> usize {
        2
    }
}
