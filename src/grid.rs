use opinion_common::SimParams;

// Calculates the row-major index for a given lattice coordinate
#[inline(always)]
pub fn cell_index(row: u32, col: u32, width: u32) -> usize {
    (row * width + col) as usize
}

// Manhattan distance between two lattice coordinates
#[inline(always)]
pub fn manhattan_distance(row_a: u32, col_a: u32, row_b: u32, col_b: u32) -> u32 {
    row_a.abs_diff(row_b) + col_a.abs_diff(col_b)
}

/// Calls `f` with the coordinates of every cell in the Moore neighborhood of
/// `(row, col)` within the given Chebyshev `radius`, clipped at the lattice
/// borders (the lattice does not wrap, so border cells see fewer neighbors).
/// Enumeration is row-major: lowest row first, then lowest column.
#[inline(always)]
pub fn for_each_neighbor<F>(
    row: u32,
    col: u32,
    radius: u32,
    include_center: bool,
    params: &SimParams,
    mut f: F,
) where
    F: FnMut(u32, u32),
{
    if params.width == 0 || params.height == 0 {
        return; // Degenerate lattice, nothing to visit
    }

    let row_start = row.saturating_sub(radius);
    let row_end = row.saturating_add(radius).min(params.height - 1);
    let col_start = col.saturating_sub(radius);
    let col_end = col.saturating_add(radius).min(params.width - 1);

    for r in row_start..=row_end {
        for c in col_start..=col_end {
            if !include_center && r == row && c == col {
                continue;
            }
            f(r, c);
        }
    }
}

/// Counts the cells `for_each_neighbor` would visit. Mostly useful for
/// diagnostics and tests.
pub fn neighbor_count(row: u32, col: u32, radius: u32, params: &SimParams) -> u32 {
    let mut count = 0;
    for_each_neighbor(row, col, radius, false, params, |_, _| count += 1);
    count
}
