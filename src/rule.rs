use opinion_common::{Opinion, SimParams};
use rand::prelude::*;

use crate::grid::{cell_index, for_each_neighbor, manhattan_distance};

/// Computes the next opinion for the cell at `(row, col)` from a pre-step
/// snapshot of the lattice. Reads only; the caller stores the result into the
/// cell's pending slot.
///
/// The decision, in priority order:
/// 1. If a cult leader is present within the influence radius, adopt the
///    nearest leader's opinion with probability
///    `max(0, base - dist * decay)` where `dist` is the Manhattan distance.
/// 2. Otherwise, with the contrarian probability, adopt a uniformly random
///    member of the low tie set (opinions tied for the *lowest* frequency
///    among the 8 Moore neighbors).
/// 3. Otherwise, adopt a uniformly random member of the top tie set (the
///    majority opinions).
///
/// A cell with no neighbors at all (1x1 lattice) keeps its current opinion.
/// Cult leaders are skipped by the caller and never reach this function.
pub fn determine_next_opinion<R: Rng>(
    row: u32,
    col: u32,
    opinions: &[Opinion],
    is_cult_leader: &[bool],
    params: &SimParams,
    rng: &mut R,
) -> Opinion {
    let own_opinion = opinions[cell_index(row, col, params.width)];

    // --- 1. Tally the 8 immediate Moore neighbors ---
    let mut counts = vec![0u32; params.opinion_count as usize];
    let mut neighbor_total = 0u32;
    for_each_neighbor(row, col, 1, false, params, |r, c| {
        counts[opinions[cell_index(r, c, params.width)] as usize] += 1;
        neighbor_total += 1;
    });

    if neighbor_total == 0 {
        // Degenerate lattice: both tie sets would be empty, so the cell
        // retains its current opinion.
        return own_opinion;
    }

    // --- 2. Build the top and low tie sets ---
    let max_count = counts.iter().copied().max().unwrap_or(0);
    let min_count = counts
        .iter()
        .copied()
        .filter(|&count| count > 0)
        .min()
        .unwrap_or(0);

    let tied_opinions: Vec<Opinion> = (0..counts.len())
        .filter(|&v| counts[v] == max_count)
        .map(|v| v as Opinion)
        .collect();
    let low_tied_opinions: Vec<Opinion> = (0..counts.len())
        .filter(|&v| counts[v] > 0 && counts[v] == min_count)
        .map(|v| v as Opinion)
        .collect();

    // --- 3. Find the nearest cult leader within the influence radius ---
    // Row-major enumeration with a strict comparison gives a deterministic
    // tie-break: lowest row, then lowest column.
    let mut nearest_leader: Option<(u32, Opinion)> = None;
    for_each_neighbor(row, col, params.cult_influence_radius, false, params, |r, c| {
        let idx = cell_index(r, c, params.width);
        if is_cult_leader[idx] {
            let dist = manhattan_distance(row, col, r, c);
            let closer = match nearest_leader {
                None => true,
                Some((best_dist, _)) => dist < best_dist,
            };
            if closer {
                nearest_leader = Some((dist, opinions[idx]));
            }
        }
    });

    // --- 4. Decide ---
    if let Some((dist, leader_opinion)) = nearest_leader {
        let override_probability = (params.leader_base_probability
            - dist as f32 * params.leader_distance_decay)
            .max(0.0);
        if rng.random::<f32>() < override_probability {
            return leader_opinion;
        }
    }

    if rng.random::<f32>() < params.contrarian_probability {
        low_tied_opinions.choose(rng).copied().unwrap_or(own_opinion)
    } else {
        tied_opinions.choose(rng).copied().unwrap_or(own_opinion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opinion_common::SimParams;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(width: u32, height: u32) -> SimParams {
        SimParams {
            width,
            height,
            num_cells: width * height,
            opinion_count: 17,
            max_opinion: 16,
            cult_influence_radius: 4,
            leader_base_probability: 0.9,
            leader_distance_decay: 0.2,
            contrarian_probability: 0.1,
            perturbation_interval_steps: 100,
            seed: 0,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(12345)
    }

    #[test]
    fn unanimous_neighborhood_wins_when_random_branches_are_off() {
        let mut p = params(3, 3);
        p.leader_base_probability = 0.0;
        p.contrarian_probability = 0.0;

        // All neighbors hold 4; the center holds 9.
        let mut opinions = vec![4u8; 9];
        opinions[4] = 9;
        let leaders = vec![false; 9];

        let mut rng = rng();
        for _ in 0..50 {
            assert_eq!(
                determine_next_opinion(1, 1, &opinions, &leaders, &p, &mut rng),
                4
            );
        }
    }

    #[test]
    fn majority_beats_minority_when_random_branches_are_off() {
        let mut p = params(3, 3);
        p.leader_base_probability = 0.0;
        p.contrarian_probability = 0.0;

        // Five neighbors hold 2, three hold 6.
        let opinions = vec![2, 2, 2, 2, 0, 6, 6, 6, 2];
        let leaders = vec![false; 9];

        let mut rng = rng();
        assert_eq!(
            determine_next_opinion(1, 1, &opinions, &leaders, &p, &mut rng),
            2
        );
    }

    #[test]
    fn top_tie_is_broken_uniformly_between_tied_opinions() {
        let mut p = params(3, 3);
        p.leader_base_probability = 0.0;
        p.contrarian_probability = 0.0;

        // Four neighbors hold 1, four hold 8.
        let opinions = vec![1, 1, 1, 1, 0, 8, 8, 8, 8];
        let leaders = vec![false; 9];

        let mut rng = rng();
        let mut saw = [false, false];
        for _ in 0..200 {
            match determine_next_opinion(1, 1, &opinions, &leaders, &p, &mut rng) {
                1 => saw[0] = true,
                8 => saw[1] = true,
                other => panic!("tie broken with opinion {} outside the tie set", other),
            }
        }
        assert!(saw[0] && saw[1], "both tied opinions should be chosen eventually");
    }

    #[test]
    fn contrarian_branch_picks_from_low_tie_set() {
        let mut p = params(3, 3);
        p.leader_base_probability = 0.0;
        p.contrarian_probability = 1.0;

        // Seven neighbors hold 3, one holds 11: the low tie set is {11}.
        let opinions = vec![3, 3, 3, 3, 0, 3, 3, 3, 11];
        let leaders = vec![false; 9];

        let mut rng = rng();
        for _ in 0..20 {
            assert_eq!(
                determine_next_opinion(1, 1, &opinions, &leaders, &p, &mut rng),
                11
            );
        }
    }

    #[test]
    fn leader_overrides_majority_at_full_probability() {
        let mut p = params(9, 9);
        p.leader_base_probability = 1.0;
        p.leader_distance_decay = 0.0;
        p.contrarian_probability = 0.0;

        let mut opinions = vec![5u8; 81];
        let mut leaders = vec![false; 81];
        // Leader three cells away from the center, inside the radius-4 scan.
        let leader_idx = cell_index(4, 7, 9);
        opinions[leader_idx] = 16;
        leaders[leader_idx] = true;

        let mut rng = rng();
        assert_eq!(
            determine_next_opinion(4, 4, &opinions, &leaders, &p, &mut rng),
            16
        );
    }

    #[test]
    fn leader_with_opinion_zero_still_overrides() {
        // Presence of a leader is what matters, not the truthiness of its
        // opinion value.
        let mut p = params(9, 9);
        p.leader_base_probability = 1.0;
        p.leader_distance_decay = 0.0;
        p.contrarian_probability = 0.0;

        let mut opinions = vec![5u8; 81];
        let mut leaders = vec![false; 81];
        let leader_idx = cell_index(4, 6, 9);
        opinions[leader_idx] = 0;
        leaders[leader_idx] = true;

        let mut rng = rng();
        assert_eq!(
            determine_next_opinion(4, 4, &opinions, &leaders, &p, &mut rng),
            0
        );
    }

    #[test]
    fn override_probability_is_zero_beyond_the_decay_range() {
        let mut p = params(11, 11);
        p.contrarian_probability = 0.0;
        // Defaults: base 0.9, decay 0.2 -> probability 0 at Manhattan
        // distance >= 4.5. A leader at Chebyshev distance 4 but Manhattan
        // distance 8 is scanned yet can never win the draw.
        let mut opinions = vec![2u8; 121];
        let mut leaders = vec![false; 121];
        let leader_idx = cell_index(9, 9, 11);
        opinions[leader_idx] = 16;
        leaders[leader_idx] = true;

        let mut rng = rng();
        for _ in 0..100 {
            assert_eq!(
                determine_next_opinion(5, 5, &opinions, &leaders, &p, &mut rng),
                2
            );
        }
    }

    #[test]
    fn nearest_leader_wins_and_ties_break_row_major() {
        let mut p = params(9, 9);
        p.leader_base_probability = 1.0;
        p.leader_distance_decay = 0.0;
        p.contrarian_probability = 0.0;

        let mut opinions = vec![5u8; 81];
        let mut leaders = vec![false; 81];

        // A far leader and a near one: the near one must win.
        let far = cell_index(4, 8, 9);
        let near = cell_index(4, 6, 9);
        opinions[far] = 10;
        leaders[far] = true;
        opinions[near] = 12;
        leaders[near] = true;

        let mut rng = rng();
        assert_eq!(
            determine_next_opinion(4, 4, &opinions, &leaders, &p, &mut rng),
            12
        );

        // Two equidistant leaders: the first in row-major order wins.
        let mut opinions = vec![5u8; 81];
        let mut leaders = vec![false; 81];
        let upper = cell_index(2, 4, 9);
        let lower = cell_index(6, 4, 9);
        opinions[upper] = 3;
        leaders[upper] = true;
        opinions[lower] = 9;
        leaders[lower] = true;

        assert_eq!(
            determine_next_opinion(4, 4, &opinions, &leaders, &p, &mut rng),
            3
        );
    }

    #[test]
    fn cell_without_neighbors_retains_its_opinion() {
        let p = params(1, 1);
        let opinions = vec![13u8];
        let leaders = vec![false];

        let mut rng = rng();
        assert_eq!(
            determine_next_opinion(0, 0, &opinions, &leaders, &p, &mut rng),
            13
        );
    }

    #[test]
    fn corner_cell_updates_from_its_clipped_neighborhood() {
        let mut p = params(4, 4);
        p.leader_base_probability = 0.0;
        p.contrarian_probability = 0.0;

        // The corner's three neighbors all hold 6.
        let mut opinions = vec![0u8; 16];
        opinions[cell_index(0, 1, 4)] = 6;
        opinions[cell_index(1, 0, 4)] = 6;
        opinions[cell_index(1, 1, 4)] = 6;
        let leaders = vec![false; 16];

        let mut rng = rng();
        assert_eq!(
            determine_next_opinion(0, 0, &opinions, &leaders, &p, &mut rng),
            6
        );
    }
}
