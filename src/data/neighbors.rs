//! Periodic neighbor search.
//!
//! Every site is replicated over the lattice translations that can reach
//! within the cutoff, and the images are bucketed into a uniform cell list so
//! that each query only inspects the 27 cells around the query point.

use crate::model::crystal::Crystal;
use std::collections::HashMap;

/// One neighbor of a site: which site, how far, and through which lattice image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
    pub image: [i32; 3],
}

/// Below this distance an image of the query site itself is treated as the site.
const SELF_TOLERANCE: f64 = 1e-8;

/// Cell list over Cartesian positions.
#[derive(Debug)]
struct SpatialGrid {
    inv_cell_size: f64,
    cells: HashMap<(i32, i32, i32), Vec<usize>>,
}

impl SpatialGrid {
    fn from_positions(positions: &[[f64; 3]], cell_size: f64) -> Self {
        let mut grid = Self {
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::new(),
        };
        for (idx, pos) in positions.iter().enumerate() {
            let cell = grid.cell_coords(*pos);
            grid.cells.entry(cell).or_default().push(idx);
        }
        grid
    }

    fn cell_coords(&self, pos: [f64; 3]) -> (i32, i32, i32) {
        (
            (pos[0] * self.inv_cell_size).floor() as i32,
            (pos[1] * self.inv_cell_size).floor() as i32,
            (pos[2] * self.inv_cell_size).floor() as i32,
        )
    }

    /// Indices of `positions` within `cutoff` of `query`, with their distances.
    fn query_radius(
        &self,
        query: [f64; 3],
        positions: &[[f64; 3]],
        cutoff: f64,
    ) -> Vec<(usize, f64)> {
        let cutoff_sq = cutoff * cutoff;
        let (cx, cy, cz) = self.cell_coords(query);

        let mut results = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(indices) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &idx in indices {
                        let pos = positions[idx];
                        let dist_sq = (pos[0] - query[0]).powi(2)
                            + (pos[1] - query[1]).powi(2)
                            + (pos[2] - query[2]).powi(2);
                        if dist_sq <= cutoff_sq {
                            results.push((idx, dist_sq.sqrt()));
                        }
                    }
                }
            }
        }
        results
    }
}

/// Lattice translations needed along each axis so that no neighbor within
/// `radius` is missed for fractional coordinates in `[0, 1)`.
fn image_ranges(crystal: &Crystal, radius: f64) -> [i32; 3] {
    crystal
        .lattice
        .plane_spacings()
        .map(|spacing| (radius / spacing).ceil() as i32 + 1)
}

/// For every site, all periodic images of all sites within `radius`,
/// excluding the site itself, sorted by distance and then by site index.
pub fn all_neighbors(crystal: &Crystal, radius: f64) -> Vec<Vec<Neighbor>> {
    let n_sites = crystal.site_count();
    if n_sites == 0 || radius <= 0.0 {
        return vec![Vec::new(); n_sites];
    }

    let [na, nb, nc] = image_ranges(crystal, radius);
    let mut positions = Vec::new();
    let mut owners = Vec::new();
    for i in -na..=na {
        for j in -nb..=nb {
            for k in -nc..=nc {
                let shift = [f64::from(i), f64::from(j), f64::from(k)];
                for (site_idx, site) in crystal.sites.iter().enumerate() {
                    let frac = [
                        site.frac[0] + shift[0],
                        site.frac[1] + shift[1],
                        site.frac[2] + shift[2],
                    ];
                    positions.push(crystal.lattice.to_cartesian(frac));
                    owners.push((site_idx, [i, j, k]));
                }
            }
        }
    }

    let grid = SpatialGrid::from_positions(&positions, radius);
    let centres = crystal.cartesian_positions();

    centres
        .iter()
        .enumerate()
        .map(|(site_idx, &centre)| {
            let mut found: Vec<Neighbor> = grid
                .query_radius(centre, &positions, radius)
                .into_iter()
                .filter_map(|(image_idx, distance)| {
                    let (index, image) = owners[image_idx];
                    let is_self = index == site_idx && distance < SELF_TOLERANCE;
                    (!is_self).then_some(Neighbor {
                        index,
                        distance,
                        image,
                    })
                })
                .collect();
            found.sort_by(|a, b| {
                a.distance
                    .total_cmp(&b.distance)
                    .then(a.index.cmp(&b.index))
                    .then(a.image.cmp(&b.image))
            });
            found
        })
        .collect()
}
