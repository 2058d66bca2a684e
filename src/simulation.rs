use anyhow::Result;
use log::{debug, info};
use opinion_common::{Opinion, SimParams, SimulationConfig, Snapshot};
use rand::prelude::*;
use rayon::prelude::*;

use crate::grid::cell_index;
use crate::rule::determine_next_opinion;
use crate::state::LatticeState;

/// Read-only view of a single cell, for external rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellState {
    pub opinion: Opinion,
    pub is_cult_leader: bool,
}

/// Manages the state and execution of the opinion-dynamics simulation.
pub struct OpinionSimulation {
    /// The simulation configuration, including lattice and rule parameters.
    config: SimulationConfig,
    /// The lattice state stored in CPU memory (vectors).
    state: LatticeState,
    /// Host-side RNG for serial operations: initial opinions and the
    /// perturbation target draw. Phase-1 randomness uses per-cell RNGs
    /// seeded from (seed, cell index, step) so the result is independent of
    /// the rayon thread count.
    rng: StdRng,
    /// The current simulation step number.
    current_step: u32,
    /// Stores collected simulation data snapshots at record intervals.
    recorded_snapshots: Vec<Snapshot>,
}

impl OpinionSimulation {
    /// Creates a new `OpinionSimulation`, validating the configuration and
    /// populating the lattice with randomly-opinioned cells.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let params = config.get_sim_params();

        let mut rng = StdRng::seed_from_u64(params.seed);
        let state = LatticeState::new(params, &mut rng)?;

        Ok(Self {
            config,
            state,
            rng,
            current_step: 0,
            recorded_snapshots: Vec::new(),
        })
    }

    /// Advances the simulation by exactly one tick:
    /// a parallel determine phase over a pre-step snapshot, a full barrier,
    /// an all-or-nothing commit, and the periodic cult-leader perturbation.
    pub fn step(&mut self) -> Result<()> {
        // --- 1. Determine Phase (Parallel) ---
        // Writes only the pending buffer; opinions stay untouched, so every
        // cell reads a fully pre-step snapshot regardless of visit order.
        self.determine_parallel();

        // --- 2. Commit Phase (Serial, after the rayon barrier) ---
        self.state.commit_pending()?;

        self.current_step += 1;

        // --- 3. Periodic Perturbation ---
        if self.current_step % self.state.params.perturbation_interval_steps == 0 {
            self.perturb();
        }
        Ok(())
    }

    /// Runs the opinion-update rule for every non-leader cell in parallel,
    /// writing each cell's next opinion into its pending slot.
    fn determine_parallel(&mut self) {
        let step = self.current_step;
        let LatticeState {
            params,
            opinions,
            pending,
            is_cult_leader,
        } = &mut self.state;
        let params = &*params;
        let opinions = &*opinions;
        let is_cult_leader = &*is_cult_leader;

        pending.par_iter_mut().enumerate().for_each(|(idx, slot)| {
            if is_cult_leader[idx] {
                // A leader's opinion is frozen; no next opinion is computed.
                *slot = None;
                return;
            }

            let row = idx as u32 / params.width;
            let col = idx as u32 % params.width;

            // Per-cell RNG keyed on (seed, cell, step) keeps the run
            // reproducible across thread counts.
            let cell_seed = params
                .seed
                .wrapping_add((idx as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
                .wrapping_add((step as u64).wrapping_mul(0x2545_F491_4F6C_DD1D));
            let mut rng = StdRng::seed_from_u64(cell_seed);

            *slot = Some(determine_next_opinion(
                row,
                col,
                opinions,
                is_cult_leader,
                params,
                &mut rng,
            ));
        });
    }

    /// Selects one cell uniformly at random from the entire lattice and
    /// designates it a permanent cult leader holding the most extreme
    /// opinion. Hitting an existing leader again is a no-op.
    fn perturb(&mut self) {
        let idx = self.rng.random_range(0..self.state.params.num_cells as usize);
        let row = idx as u32 / self.state.params.width;
        let col = idx as u32 % self.state.params.width;

        self.state.designate_leader(idx);
        info!(
            "Perturbation at step {}: cell ({}, {}) is now a cult leader with opinion {}.",
            self.current_step, row, col, self.state.params.max_opinion
        );
    }

    /// Read accessor for external rendering. Returns `None` for coordinates
    /// outside the lattice.
    pub fn cell_state(&self, row: u32, col: u32) -> Option<CellState> {
        if row >= self.state.params.height || col >= self.state.params.width {
            return None;
        }
        let idx = cell_index(row, col, self.state.params.width);
        Some(CellState {
            opinion: self.state.opinions[idx],
            is_cult_leader: self.state.is_cult_leader[idx],
        })
    }

    /// Collects the current lattice metrics and stores them as a Snapshot.
    /// Should be called at record intervals.
    pub fn record_snapshot(&mut self) {
        let histogram = self.state.opinion_histogram();
        let distinct_opinions = histogram.iter().filter(|&&count| count > 0).count() as u32;
        let (dominant_opinion, dominant_count) = histogram
            .iter()
            .enumerate()
            .max_by_key(|&(v, &count)| (count, std::cmp::Reverse(v)))
            .map(|(v, &count)| (v as Opinion, count))
            .unwrap_or((0, 0));
        let dominant_fraction = dominant_count as f32 / self.state.params.num_cells as f32;

        debug!(
            "Recording snapshot at step {}: {} distinct opinions, dominant {} ({:.1}%).",
            self.current_step,
            distinct_opinions,
            dominant_opinion,
            dominant_fraction * 100.0
        );

        let opinions = if self.config.output.save_opinions_in_snapshot {
            Some(self.state.opinions.clone())
        } else {
            None
        };

        self.recorded_snapshots.push(Snapshot {
            step: self.current_step,
            leader_count: self.state.leader_count(),
            distinct_opinions,
            dominant_opinion,
            dominant_fraction,
            opinion_histogram: histogram,
            opinions,
        });
    }

    /// Provides access to the recorded snapshots.
    pub fn recorded_snapshots(&self) -> &[Snapshot] {
        &self.recorded_snapshots
    }

    /// The current step count.
    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    /// Number of cult leaders designated so far.
    pub fn leader_count(&self) -> u32 {
        self.state.leader_count()
    }

    /// Per-opinion occupancy counts over the whole lattice.
    pub fn opinion_histogram(&self) -> Vec<u32> {
        self.state.opinion_histogram()
    }

    /// Provides access to the derived simulation parameters.
    pub fn params(&self) -> &SimParams {
        &self.state.params
    }

    /// Provides access to the original simulation configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}
