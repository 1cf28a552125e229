//! Transition models for planning.
//!
//! Dynamic programming needs the full distribution `p(s', r | s, a)`. It is
//! held in a [`TransitionModel`] and obtained through a [`ModelBuilder`].

pub mod builder;
pub mod transition;

pub use builder::{ModelBuilder, ModelSource};
pub use transition::{Outcome, TransitionModel};
