pub mod config;
pub mod sim_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use config::{SimulationConfig, LatticeConfig, TimingConfig, InitialConditions, OpinionParamsConfig, OutputConfig};
pub use sim_params::{Opinion, SimParams};
pub use snapshot::Snapshot;
