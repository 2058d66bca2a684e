//! Opinion dynamics on a bounded 2D lattice.
//!
//! Each cell holds a discrete opinion and updates it every tick from the
//! majority opinion of its Moore neighborhood, subject to probabilistic
//! override by nearby cult leaders. Steps are two-phase: all next opinions
//! are determined against a pre-step snapshot, then committed at once.

pub mod grid;
pub mod rule;
pub mod simulation;
pub mod state;

pub use simulation::{CellState, OpinionSimulation};
