//! Environment states and their canonical table keys.
//!
//! Environments describe their states with [`State`], which can be a scalar,
//! an ordered tuple, or a keyed mapping. Tables never store a `State` directly;
//! they index by [`StateKey`], a canonical, hashable form derived by a pure
//! conversion. Two semantically equal states always produce the same key, and
//! the field order of a mapping never matters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A state as reported by an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum State {
    /// A boolean state.
    Bool(bool),
    /// An integer state, e.g. a cell index.
    Int(i64),
    /// A floating-point state.
    Float(f64),
    /// A textual state.
    Text(String),
    /// An ordered tuple, e.g. `(x, y)` grid coordinates.
    Tuple(Vec<State>),
    /// A keyed mapping of named fields.
    Map(Vec<(String, State)>),
}

impl State {
    /// Creates a two-element tuple state.
    pub fn pair(a: impl Into<State>, b: impl Into<State>) -> Self {
        State::Tuple(vec![a.into(), b.into()])
    }

    /// Creates a mapping state from `(field, value)` pairs.
    pub fn map<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<State>,
        I: IntoIterator<Item = (K, V)>,
    {
        State::Map(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns the integer payload, if this is an `Int` state.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            State::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the canonical key for this state.
    pub fn key(&self) -> StateKey {
        StateKey::from(self)
    }
}

impl From<bool> for State {
    fn from(v: bool) -> Self {
        State::Bool(v)
    }
}

impl From<i64> for State {
    fn from(v: i64) -> Self {
        State::Int(v)
    }
}

impl From<i32> for State {
    fn from(v: i32) -> Self {
        State::Int(v as i64)
    }
}

impl From<usize> for State {
    fn from(v: usize) -> Self {
        State::Int(v as i64)
    }
}

impl From<f64> for State {
    fn from(v: f64) -> Self {
        State::Float(v)
    }
}

impl From<&str> for State {
    fn from(v: &str) -> Self {
        State::Text(v.to_string())
    }
}

impl From<String> for State {
    fn from(v: String) -> Self {
        State::Text(v)
    }
}

impl<A: Into<State>, B: Into<State>> From<(A, B)> for State {
    fn from((a, b): (A, B)) -> Self {
        State::pair(a, b)
    }
}

impl<T: Into<State>> From<Vec<T>> for State {
    fn from(v: Vec<T>) -> Self {
        State::Tuple(v.into_iter().map(Into::into).collect())
    }
}

const CANONICAL_NAN: u64 = 0x7ff8_0000_0000_0000;

/// The canonical, hashable key of a [`State`].
///
/// Mappings are flattened into a tuple of `(Text(field), value)` pairs sorted
/// by field name. Floats are keyed by their bit pattern, with `-0.0` folded
/// into `0.0` and every NaN folded into a single NaN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateKey {
    /// Key of a boolean state.
    Bool(bool),
    /// Key of an integer state.
    Int(i64),
    /// Bit pattern of a normalized float state.
    Float(u64),
    /// Key of a textual state.
    Text(String),
    /// Key of a tuple or (flattened, sorted) mapping state.
    Tuple(Vec<StateKey>),
}

impl StateKey {
    fn float(f: f64) -> Self {
        if f.is_nan() {
            StateKey::Float(CANONICAL_NAN)
        } else if f == 0.0 {
            StateKey::Float(0.0f64.to_bits())
        } else {
            StateKey::Float(f.to_bits())
        }
    }
}

impl From<&State> for StateKey {
    fn from(state: &State) -> Self {
        match state {
            State::Bool(b) => StateKey::Bool(*b),
            State::Int(i) => StateKey::Int(*i),
            State::Float(f) => StateKey::float(*f),
            State::Text(s) => StateKey::Text(s.clone()),
            State::Tuple(items) => StateKey::Tuple(items.iter().map(StateKey::from).collect()),
            State::Map(fields) => {
                let mut pairs: Vec<(&String, StateKey)> = fields
                    .iter()
                    .map(|(name, value)| (name, StateKey::from(value)))
                    .collect();
                pairs.sort();
                StateKey::Tuple(
                    pairs
                        .into_iter()
                        .map(|(name, value)| StateKey::Tuple(vec![StateKey::Text(name.clone()), value]))
                        .collect(),
                )
            }
        }
    }
}

impl From<State> for StateKey {
    fn from(state: State) -> Self {
        StateKey::from(&state)
    }
}

impl From<&StateKey> for State {
    /// Rebuilds a state from its key. Mappings come back as tuples of pairs.
    fn from(key: &StateKey) -> Self {
        match key {
            StateKey::Bool(b) => State::Bool(*b),
            StateKey::Int(i) => State::Int(*i),
            StateKey::Float(bits) => State::Float(f64::from_bits(*bits)),
            StateKey::Text(s) => State::Text(s.clone()),
            StateKey::Tuple(items) => State::Tuple(items.iter().map(State::from).collect()),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKey::Bool(b) => write!(f, "{}", b),
            StateKey::Int(i) => write!(f, "{}", i),
            StateKey::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            StateKey::Text(s) => write!(f, "{:?}", s),
            StateKey::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}
