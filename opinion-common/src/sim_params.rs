use serde::{Deserialize, Serialize};

/// A discrete opinion value in [0, K-1]. Carries no ordering semantics;
/// it is only compared for equality and counted.
pub type Opinion = u8;

/// Simulation parameters derived from the configuration, used frequently during simulation steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // Lattice (bounded, non-toroidal, one agent per coordinate)
    pub width: u32,
    pub height: u32,
    pub num_cells: u32,

    // Opinion range
    pub opinion_count: u16, // K
    pub max_opinion: Opinion, // K - 1, the value assigned to cult leaders

    // Update rule
    pub cult_influence_radius: u32, // Chebyshev radius of the leader scan
    pub leader_base_probability: f32, // Override chance at Manhattan distance 0
    pub leader_distance_decay: f32, // Override chance lost per unit distance
    pub contrarian_probability: f32, // Chance of picking from the low tie set

    // Perturbation
    pub perturbation_interval_steps: u32,

    // Randomness
    pub seed: u64,
}
