//! Learned tables shared by the algorithm families.
//!
//! - [`ValueTable`]: action values `Q(s, a)`, used by TD, Dyna and Monte Carlo agents.
//! - [`StateValues`]: state values `V(s)`, used by dynamic programming.
//! - [`ReturnsLedger`] and [`Cumulants`]: Monte Carlo bookkeeping.
//!
//! ## Example
//!
//! ```rust
//! use tabular_agents::learning::ValueTable;
//! use tabular_agents::State;
//!
//! let mut q = ValueTable::new();
//! let s = State::Int(0).key();
//!
//! assert_eq!(q.get(&s, 1), 0.0);
//! q.set(&s, 1, 2.5);
//! assert_eq!(q.values(&s, 2), vec![0.0, 2.5]);
//! assert_eq!(q.max_value(&s, 2), 2.5);
//! ```

pub mod returns;
pub mod value_table;

pub use returns::{Cumulants, ReturnsLedger};
pub use value_table::{StateValues, ValueTable};

/// Serializes a `HashMap` as a list of `(key, value)` pairs.
///
/// Table keys are structured values, which JSON object keys cannot hold.
pub(crate) mod pairs {
    use serde::de::{Deserialize, Deserializer};
    use serde::ser::{Serialize, Serializer};
    use std::collections::HashMap;
    use std::hash::Hash;

    pub fn serialize<K, V, S>(map: &HashMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<HashMap<K, V>, D::Error>
    where
        K: Deserialize<'de> + Eq + Hash,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Vec::<(K, V)>::deserialize(deserializer).map(|entries| entries.into_iter().collect())
    }
}
