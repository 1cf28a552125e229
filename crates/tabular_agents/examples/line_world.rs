//! Every algorithm on a five-cell corridor
//!
//! Trains each agent, evaluates it greedily, and saves one of them to show
//! persistence.
//!
//! Run with: cargo run --example line_world

use std::path::Path;
use tabular_agents::environment::check_action;
use tabular_agents::{
    create_agent, ActionIndex, Agent, AgentConfig, AlgorithmKind, Environment, Result, State,
    Step, StepInfo, TabularAgent,
};

/// Cells `0..len`; start at 0, +10 at the last cell, -1 per other step.
struct LineWorld {
    len: i64,
    pos: i64,
}

impl Environment for LineWorld {
    fn reset(&mut self) -> Result<State> {
        self.pos = 0;
        Ok(State::Int(0))
    }

    fn step(&mut self, action: ActionIndex) -> Result<Step> {
        check_action(action, 2)?;
        let goal = self.len - 1;
        self.pos = if action == 1 {
            (self.pos + 1).min(goal)
        } else {
            (self.pos - 1).max(0)
        };
        let done = self.pos == goal;
        let reward = if done { 10.0 } else { -1.0 };
        Ok(Step::new(State::Int(self.pos), reward, done).with_info(StepInfo::goal(done)))
    }

    fn n_actions(&self) -> usize {
        2
    }

    fn all_states(&self) -> Option<Vec<State>> {
        Some((0..self.len).map(State::Int).collect())
    }

    fn set_state(&mut self, state: &State) -> Result<()> {
        if let Some(pos) = state.as_int() {
            self.pos = pos;
        }
        Ok(())
    }

    fn is_deterministic(&self) -> bool {
        true
    }
}

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Tabular Agents on LineWorld(5) ===\n");

    let mut env = LineWorld { len: 5, pos: 0 };
    println!(
        "{:<22} {:>10} {:>10} {:>8} {:>12}",
        "algorithm", "mean", "std", "steps", "success"
    );

    for kind in AlgorithmKind::ALL {
        let config = AgentConfig::for_algorithm(kind)
            .with_max_steps(200)
            .with_seed(42);
        let mut agent = create_agent(kind, config, &mut env)?;
        let episodes = if kind.requires_model() { 100 } else { 500 };
        agent.train(&mut env, episodes)?;

        let report = agent.evaluate(&mut env, 20, 50)?;
        println!(
            "{:<22} {:>10.2} {:>10.2} {:>8.1} {:>11.0}%",
            kind.name(),
            report.mean_reward,
            report.std_reward,
            report.mean_steps,
            report.success_rate * 100.0
        );
    }

    println!("\n--- Persistence ---");
    let path = Path::new("target/line_world_q_learning.json");
    let config = AgentConfig::default().with_seed(7);
    let mut agent = create_agent(AlgorithmKind::QLearning, config, &mut env)?;
    agent.train(&mut env, 500)?;
    agent.save(path)?;

    let restored = TabularAgent::load_from(path)?;
    let stats = restored.training_stats();
    println!(
        "Restored {} after {} episodes (final mean reward {:.2})",
        restored.name(),
        stats.total_episodes,
        stats.final_mean_reward
    );
    for s in 0..5 {
        let values = restored.action_values(&State::Int(s));
        println!("  Q({}) = [{:.2}, {:.2}]", s, values[0], values[1]);
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
