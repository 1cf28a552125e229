//! Agent state persistence.
//!
//! Saves an agent with everything it has learned (hyperparameters, training
//! history, value tables, policies, models and Monte Carlo ledgers) so it can
//! be reloaded later and evaluated without retraining.
//!
//! Every agent is written in the same tagged layout as [`TabularAgent`], so a
//! file saved from a concrete agent type can also be opened with
//! [`TabularAgent::load_from`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use tabular_agents::{Agent, AgentPersistence, TabularAgent};
//! use std::path::Path;
//!
//! // ... create and train `agent` ...
//! agent.save_to_file(Path::new("q_learning.json"))?;
//!
//! let restored = TabularAgent::load_from_file(Path::new("q_learning.json"))?;
//! assert_eq!(restored.kind(), agent.kind());
//! ```

use crate::agent::{Agent, TabularAgent};
use crate::algorithms::{DpAgent, DynaAgent, MonteCarloAgent, TdAgent};
use crate::error::{Error, Result};
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Version of the on-disk snapshot layout.
pub const FORMAT_VERSION: u32 = 1;

/// Options for configuring persistence operations.
#[derive(Debug, Clone)]
pub struct PersistenceOptions {
    /// If `true`, pretty-prints JSON output to be more human-readable.
    pub pretty: bool,
}

impl Default for PersistenceOptions {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl PersistenceOptions {
    /// Options for the smallest output.
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    /// Options for human-readable output.
    pub fn readable() -> Self {
        Self { pretty: true }
    }
}

/// The envelope written to disk around an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot<T> {
    pub format_version: u32,
    pub saved_at: Timestamp,
    pub agent: T,
}

/// Borrowed view of an agent with the same serialized form as [`TabularAgent`].
#[derive(Serialize)]
enum AgentRef<'a> {
    Td(&'a TdAgent),
    Dyna(&'a DynaAgent),
    MonteCarlo(&'a MonteCarloAgent),
    DynamicProgramming(&'a DpAgent),
}

/// A trait that provides methods for saving and loading an agent's state.
pub trait AgentPersistence: Sized {
    /// Serializes the agent with custom options.
    fn to_bytes_with_options(&self, options: &PersistenceOptions) -> Result<Vec<u8>>;

    /// Deserializes an agent.
    fn from_bytes(bytes: &[u8]) -> Result<Self>;

    /// Serializes the agent with default options.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_with_options(&PersistenceOptions::default())
    }

    /// Saves the agent to a file using default options.
    fn save_to_file(&self, path: &Path) -> Result<()> {
        self.save_to_file_with_options(path, &PersistenceOptions::default())
    }

    /// Saves the agent to a file with custom options, creating parent directories.
    fn save_to_file_with_options(&self, path: &Path, options: &PersistenceOptions) -> Result<()> {
        let bytes = self.to_bytes_with_options(options)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, bytes)?;
        log::info!("Saved agent state to {:?}", path);
        Ok(())
    }

    /// Loads an agent from a file.
    fn load_from_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let agent = Self::from_bytes(&bytes)?;
        log::info!("Loaded agent state from {:?}", path);
        Ok(agent)
    }
}

fn encode(agent: AgentRef<'_>, options: &PersistenceOptions) -> Result<Vec<u8>> {
    let snapshot = AgentSnapshot {
        format_version: FORMAT_VERSION,
        saved_at: Timestamp::now(),
        agent,
    };
    let bytes = if options.pretty {
        serde_json::to_vec_pretty(&snapshot)?
    } else {
        serde_json::to_vec(&snapshot)?
    };
    Ok(bytes)
}

impl AgentPersistence for TabularAgent {
    fn to_bytes_with_options(&self, options: &PersistenceOptions) -> Result<Vec<u8>> {
        let agent = match self {
            TabularAgent::Td(a) => AgentRef::Td(a),
            TabularAgent::Dyna(a) => AgentRef::Dyna(a),
            TabularAgent::MonteCarlo(a) => AgentRef::MonteCarlo(a),
            TabularAgent::DynamicProgramming(a) => AgentRef::DynamicProgramming(a),
        };
        encode(agent, options)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: AgentSnapshot<TabularAgent> = serde_json::from_slice(bytes)?;
        if snapshot.format_version != FORMAT_VERSION {
            return Err(Error::Persistence(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.format_version, FORMAT_VERSION
            )));
        }
        let mut agent = snapshot.agent;
        log::debug!(
            "Restoring {} snapshot saved {}s ago",
            agent.kind(),
            snapshot.saved_at.age_secs()
        );
        agent.core_mut().restore_rng();
        Ok(agent)
    }
}

macro_rules! impl_persistence {
    ($agent:ty, $variant:ident) => {
        impl AgentPersistence for $agent {
            fn to_bytes_with_options(&self, options: &PersistenceOptions) -> Result<Vec<u8>> {
                encode(AgentRef::$variant(self), options)
            }

            fn from_bytes(bytes: &[u8]) -> Result<Self> {
                match TabularAgent::from_bytes(bytes)? {
                    TabularAgent::$variant(agent) => Ok(agent),
                    other => Err(Error::Persistence(format!(
                        "snapshot holds a {} agent",
                        other.kind()
                    ))),
                }
            }
        }
    };
}

impl_persistence!(TdAgent, Td);
impl_persistence!(DynaAgent, Dyna);
impl_persistence!(MonteCarloAgent, MonteCarlo);
impl_persistence!(DpAgent, DynamicProgramming);

/// Replaces `agent` with the one saved at `path`, which must run the same algorithm.
pub(crate) fn replace_from_file<A>(agent: &mut A, path: &Path) -> Result<()>
where
    A: Agent + AgentPersistence,
{
    let loaded = A::load_from_file(path)?;
    if loaded.kind() != agent.kind() {
        return Err(Error::Persistence(format!(
            "snapshot holds a {} agent, expected {}",
            loaded.kind(),
            agent.kind()
        )));
    }
    *agent = loaded;
    Ok(())
}
