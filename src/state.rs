use anyhow::Result;
use opinion_common::{Opinion, SimParams};
use rand::prelude::*;

/// Holds the lattice state vectors on the CPU.
///
/// Cell storage is struct-of-arrays, indexed row-major (`row * width + col`).
/// `opinions` is the committed state; `pending` is written during the
/// determine phase and drained by `commit_pending`. Outside an in-progress
/// step every `pending` slot is `None`.
#[derive(Debug)]
pub struct LatticeState {
    pub params: SimParams,

    /// Committed opinion of each cell.
    pub opinions: Vec<Opinion>,
    /// Next opinion of each cell, written once per step during the determine
    /// phase. Cult leaders never have a pending opinion.
    pub pending: Vec<Option<Opinion>>,
    /// Sticky leader flags. Set only through `designate_leader`, never cleared.
    pub is_cult_leader: Vec<bool>,
}

impl LatticeState {
    /// Creates a new lattice with uniformly random initial opinions.
    ///
    /// Initial opinions are drawn from [0, K-2]: the extreme value K-1 is
    /// reserved for cult leaders injected by the perturbation policy.
    pub fn new(params: SimParams, rng: &mut StdRng) -> Result<Self> {
        if params.num_cells == 0 {
            anyhow::bail!("Lattice must contain at least one cell.");
        }
        let num_cells = params.num_cells as usize;
        let initial_bound = params.max_opinion.max(1);

        let opinions = (0..num_cells)
            .map(|_| rng.random_range(0..initial_bound))
            .collect();

        Ok(Self {
            params,
            opinions,
            pending: vec![None; num_cells],
            is_cult_leader: vec![false; num_cells],
        })
    }

    /// The only sanctioned mutator of the cult-leader flag: pins the cell to
    /// the most extreme opinion and freezes it permanently. Re-designating an
    /// existing leader is a no-op.
    pub fn designate_leader(&mut self, idx: usize) {
        self.opinions[idx] = self.params.max_opinion;
        self.is_cult_leader[idx] = true;
    }

    /// Commits every pending opinion at once, so that no cell ever observes a
    /// same-step neighbor update. Cult leaders are left untouched.
    ///
    /// The commit is all-or-nothing: if any non-leader cell is missing a
    /// pending opinion the step is aborted before a single opinion is
    /// written, since that can only mean the determine phase was skipped or
    /// interrupted.
    pub fn commit_pending(&mut self) -> Result<()> {
        for (idx, slot) in self.pending.iter().enumerate() {
            if !self.is_cult_leader[idx] && slot.is_none() {
                anyhow::bail!(
                    "Cell {} has no pending opinion at commit time; aborting step.",
                    idx
                );
            }
        }

        for (idx, slot) in self.pending.iter_mut().enumerate() {
            match slot.take() {
                Some(next) if !self.is_cult_leader[idx] => self.opinions[idx] = next,
                // A pending value computed for a cell that became a leader
                // mid-step is discarded; leader opinions are frozen.
                _ => {}
            }
        }
        Ok(())
    }

    /// Number of cult leaders designated so far.
    pub fn leader_count(&self) -> u32 {
        self.is_cult_leader.iter().filter(|&&l| l).count() as u32
    }

    /// Per-opinion occupancy counts over the whole lattice.
    pub fn opinion_histogram(&self) -> Vec<u32> {
        let mut histogram = vec![0u32; self.params.opinion_count as usize];
        for &opinion in &self.opinions {
            histogram[opinion as usize] += 1;
        }
        histogram
    }
}
