//! The tabular control algorithms, grouped by family.
//!
//! | Family | Agent | Algorithms |
//! |---|---|---|
//! | Temporal difference | [`TdAgent`] | SARSA, Expected SARSA, Q-Learning |
//! | Model-based planning | [`DynaAgent`] | Dyna-Q, Dyna-Q+ |
//! | Monte Carlo | [`MonteCarloAgent`] | Exploring Starts, On-Policy, Off-Policy |
//! | Dynamic programming | [`DpAgent`] | Policy Iteration, Value Iteration |

pub mod dyna;
pub mod dynamic_programming;
pub mod monte_carlo;
pub mod td;

pub use dyna::{DynaAgent, DynaVariant, ModelEntry};
pub use dynamic_programming::{DpAgent, DpVariant};
pub use monte_carlo::{McVariant, MonteCarloAgent, Trajectory, TrajectoryStep};
pub use td::{TdAgent, TdVariant};

use crate::agent::AgentCore;
use crate::error::{Error, Result};
use crate::learning::ValueTable;
use crate::policy::{epsilon_greedy, greedy_action};
use crate::state::StateKey;
use crate::types::ActionIndex;

/// Epsilon-greedy over `q` when `training`, greedy otherwise.
pub(crate) fn select_from_table(
    q: &ValueTable,
    core: &mut AgentCore,
    state: &StateKey,
    training: bool,
) -> Result<ActionIndex> {
    let values = q.values(state, core.n_actions);
    let epsilon = core.epsilon;
    let action = if training {
        epsilon_greedy(&values, epsilon, core.rng())
    } else {
        greedy_action(&values, core.rng())
    };
    action.ok_or_else(|| Error::Internal("action space is empty".to_string()))
}
