use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::SimParams;
use std::path::Path;

// Configuration for the lattice the agents live on
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LatticeConfig {
    pub width: u32,
    pub height: u32,
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub total_steps: u32,
    pub record_interval_steps: u32,
}

// Initial conditions for the simulation, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InitialConditions {
    pub seed: u64,
}

// Parameters for the opinion-update rule, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OpinionParamsConfig {
    /// Number of distinct opinion values K. Opinions are integers in [0, K-1].
    pub count: u16,
    /// Chebyshev radius within which a cult leader can influence a cell.
    pub cult_influence_radius: u32,
    #[serde(default = "default_leader_base_probability")]
    pub leader_base_probability: f32,
    #[serde(default = "default_leader_distance_decay")]
    pub leader_distance_decay: f32,
    #[serde(default = "default_contrarian_probability")]
    pub contrarian_probability: f32,
    #[serde(default = "default_perturbation_interval_steps")]
    pub perturbation_interval_steps: u32,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_opinions: bool,
    pub save_stats: bool,
    pub save_opinions_in_snapshot: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

fn default_leader_base_probability() -> f32 {
    0.9 // Override chance when adjacent to a cult leader
}

fn default_leader_distance_decay() -> f32 {
    0.2 // Override chance lost per unit of Manhattan distance
}

fn default_contrarian_probability() -> f32 {
    0.1 // Chance of adopting a least-common neighboring opinion instead
}

fn default_perturbation_interval_steps() -> u32 {
    100
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub lattice: LatticeConfig,
    pub timing: TimingConfig,
    pub initial_conditions: InitialConditions,
    pub opinion_params: OpinionParamsConfig,
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config: SimulationConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.lattice.width == 0 || self.lattice.height == 0 {
            anyhow::bail!(
                "Lattice dimensions must be positive (got {}x{}).",
                self.lattice.width,
                self.lattice.height
            );
        }
        if self.lattice.width.checked_mul(self.lattice.height).is_none() {
            anyhow::bail!(
                "Lattice cell count {}x{} overflows a u32.",
                self.lattice.width,
                self.lattice.height
            );
        }
        if self.opinion_params.count < 2 {
            anyhow::bail!("opinion count must be at least 2.");
        }
        if self.opinion_params.count > 256 {
            anyhow::bail!("opinion count must fit in a byte (max 256).");
        }
        if self.opinion_params.cult_influence_radius == 0 {
            anyhow::bail!("cult_influence_radius must be at least 1.");
        }
        if self.opinion_params.perturbation_interval_steps == 0 {
            anyhow::bail!("perturbation_interval_steps must be at least 1.");
        }
        for (name, p) in [
            ("leader_base_probability", self.opinion_params.leader_base_probability),
            ("leader_distance_decay", self.opinion_params.leader_distance_decay),
            ("contrarian_probability", self.opinion_params.contrarian_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                anyhow::bail!("{} must be within [0, 1] (got {}).", name, p);
            }
        }
        Ok(())
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        let width = self.lattice.width;
        let height = self.lattice.height;
        let num_cells = width * height;
        let opinion_count = self.opinion_params.count;
        let max_opinion = (opinion_count - 1) as u8;

        SimParams {
            // Lattice
            width,
            height,
            num_cells,
            // Opinion range
            opinion_count,
            max_opinion,
            // Update rule
            cult_influence_radius: self.opinion_params.cult_influence_radius,
            leader_base_probability: self.opinion_params.leader_base_probability,
            leader_distance_decay: self.opinion_params.leader_distance_decay,
            contrarian_probability: self.opinion_params.contrarian_probability,
            // Perturbation
            perturbation_interval_steps: self.opinion_params.perturbation_interval_steps,
            // Randomness
            seed: self.initial_conditions.seed,
        }
    }
}
