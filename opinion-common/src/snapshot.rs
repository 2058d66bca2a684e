use serde::{Serialize, Deserialize};

use crate::sim_params::Opinion;

/// A snapshot of the simulation state and metrics at a specific step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// The step count at which the snapshot was taken.
    pub step: u32,
    /// Number of cells designated as cult leaders so far.
    pub leader_count: u32,
    /// Number of distinct opinion values present on the lattice.
    pub distinct_opinions: u32,
    /// The most common opinion value (lowest value wins a tie).
    pub dominant_opinion: Opinion,
    /// Fraction of cells holding `dominant_opinion`.
    pub dominant_fraction: f32,
    /// `opinion_histogram[v]` is the number of cells currently holding opinion `v`.
    /// The vector length equals the configured opinion count K.
    pub opinion_histogram: Vec<u32>,
    /// Optional: the full lattice in row-major order, for external rendering.
    /// Included only if `config.output.save_opinions_in_snapshot` is true.
    #[serde(skip_serializing_if = "Option::is_none")] // Don't write "opinions": null
    pub opinions: Option<Vec<Opinion>>,
}
