//! Grid based thinning of the extrema found in the scale space.

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::FilterSort;
use crate::extrema::Extremum;

/// Fixed so that repeated runs on the same image keep the same extrema.
const SHUFFLE_SEED: u64 = 0;

/// Knobs of [`filter_extrema`], taken from the engine config.
#[derive(Debug, Copy, Clone)]
pub(crate) struct FilterParams {
    /// 0 disables filtering.
    pub max_extrema: usize,
    pub grid: usize,
    pub sort: FilterSort,
    /// Input image size in pixels.
    pub width: u32,
    pub height: u32,
    /// Size of a seed image pixel in input pixels.
    pub delta_min: f32,
}

/// Split the input image into `grid * grid` cells and keep at most
/// `ceil(max_extrema / grid^2)` extrema per cell. The survivors keep their
/// detection order.
pub(crate) fn filter_extrema(extrema: Vec<Extremum>, params: &FilterParams) -> Vec<Extremum> {
    if params.max_extrema == 0 || extrema.len() <= params.max_extrema {
        return extrema;
    }
    let grid = params.grid.max(1);
    let n_cells = grid * grid;
    let per_cell = params.max_extrema.div_ceil(n_cells);
    let cell_width = params.width.max(1) as f32 / grid as f32;
    let cell_height = params.height.max(1) as f32 / grid as f32;

    let cell_of = |e: &Extremum| {
        let scale = 2_f32.powi(e.octave as i32) * params.delta_min;
        let col = ((e.x * scale / cell_width).floor().max(0.0) as usize).min(grid - 1);
        let row = ((e.y * scale / cell_height).floor().max(0.0) as usize).min(grid - 1);
        row * grid + col
    };

    let mut cells: Vec<Vec<usize>> = vec![Vec::new(); n_cells];
    for (i, e) in extrema.iter().enumerate() {
        cells[cell_of(e)].push(i);
    }

    let mut rng = StdRng::seed_from_u64(SHUFFLE_SEED);
    let mut keep = vec![false; extrema.len()];
    for cell in &mut cells {
        let absolute_sigma =
            |i: usize| extrema[i].sigma * 2_f32.powi(extrema[i].octave as i32);
        match params.sort {
            FilterSort::Up => cell.sort_by(|a, b| absolute_sigma(*a).total_cmp(&absolute_sigma(*b))),
            FilterSort::Down => {
                cell.sort_by(|a, b| absolute_sigma(*b).total_cmp(&absolute_sigma(*a)))
            }
            FilterSort::Random => cell.shuffle(&mut rng),
        }
        cell.iter().take(per_cell).for_each(|i| keep[*i] = true);
    }

    extrema
        .into_iter()
        .zip_eq(keep)
        .filter_map(|(e, keep)| keep.then_some(e))
        .collect()
}
