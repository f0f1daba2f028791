//! Dense scalar grid and the distance fields sampled on it.

use std::ops::Range;

use glam::Vec3;
use rustc_hash::FxHashMap;

use super::SurfaceAtom;

/// Upper bound on grid points; coarser spacing is used above it.
pub(crate) const MAX_GRID_POINTS: usize = 1 << 24;

/// Dense voxel grid (x-fastest: `data[z * ny * nx + y * nx + x]`).
#[derive(Debug, Clone)]
pub(crate) struct Grid {
    pub(crate) data: Vec<f32>,
    pub(crate) dims: [usize; 3],
    pub(crate) origin: Vec3,
    pub(crate) spacing: f32,
}

impl Grid {
    fn new(dims: [usize; 3], origin: Vec3, spacing: f32, fill: f32) -> Self {
        Self {
            data: vec![fill; dims[0] * dims[1] * dims[2]],
            dims,
            origin,
            spacing,
        }
    }

    fn dims_for(min: Vec3, max: Vec3, spacing: f32, padding: f32) -> [usize; 3] {
        let extent = (max - min + Vec3::splat(2.0 * padding)) / spacing;
        [
            extent.x.ceil() as usize + 1,
            extent.y.ceil() as usize + 1,
            extent.z.ceil() as usize + 1,
        ]
    }

    /// Grid covering `[min, max]` plus `padding`, at `spacing` or coarser
    /// if the point count would exceed [`MAX_GRID_POINTS`].
    pub(crate) fn from_bounds(
        min: Vec3,
        max: Vec3,
        spacing: f32,
        padding: f32,
        fill: f32,
    ) -> Self {
        let mut spacing = spacing;
        let mut dims = Self::dims_for(min, max, spacing, padding);
        while dims.iter().product::<usize>() > MAX_GRID_POINTS {
            spacing *= 1.25;
            dims = Self::dims_for(min, max, spacing, padding);
        }
        Self::new(dims, min - Vec3::splat(padding), spacing, fill)
    }

    #[inline]
    pub(crate) fn index(&self, x: usize, y: usize, z: usize) -> usize {
        z * self.dims[1] * self.dims[0] + y * self.dims[0] + x
    }

    #[inline]
    pub(crate) fn position(&self, x: usize, y: usize, z: usize) -> Vec3 {
        self.origin + Vec3::new(x as f32, y as f32, z as f32) * self.spacing
    }

    /// Voxel index ranges covering the ball of `radius` around `center`,
    /// clamped to the grid.
    pub(crate) fn ball_ranges(&self, center: Vec3, radius: f32) -> [Range<usize>; 3] {
        let lo = ((center - Vec3::splat(radius) - self.origin) / self.spacing).floor();
        let hi = ((center + Vec3::splat(radius) - self.origin) / self.spacing).ceil();
        let clamp = |lo: f32, hi: f32, n: usize| {
            let start = lo.max(0.0) as usize;
            let end = (hi.max(-1.0) + 1.0).min(n as f32) as usize;
            start.min(end)..end
        };
        [
            clamp(lo.x, hi.x, self.dims[0]),
            clamp(lo.y, hi.y, self.dims[1]),
            clamp(lo.z, hi.z, self.dims[2]),
        ]
    }

    /// Value at the grid point nearest to `pos`, if inside the grid.
    #[cfg(test)]
    pub(crate) fn value_near(&self, pos: Vec3) -> Option<f32> {
        let v = ((pos - self.origin) / self.spacing).round();
        if v.min_element() < 0.0 {
            return None;
        }
        let (x, y, z) = (v.x as usize, v.y as usize, v.z as usize);
        if x >= self.dims[0] || y >= self.dims[1] || z >= self.dims[2] {
            return None;
        }
        Some(self.data[self.index(x, y, z)])
    }
}

fn cell_key(pos: Vec3, cell: f32) -> (i32, i32, i32) {
    let v = (pos / cell).floor();
    (v.x as i32, v.y as i32, v.z as i32)
}

/// Uniform spatial hash over atom centers.
struct AtomLookup<'a> {
    atoms: &'a [SurfaceAtom],
    cell: f32,
    cells: FxHashMap<(i32, i32, i32), Vec<usize>>,
}

impl<'a> AtomLookup<'a> {
    fn new(atoms: &'a [SurfaceAtom], cell: f32) -> Self {
        let mut cells: FxHashMap<(i32, i32, i32), Vec<usize>> =
            FxHashMap::default();
        for (i, atom) in atoms.iter().enumerate() {
            cells.entry(cell_key(atom.position, cell)).or_default().push(i);
        }
        Self { atoms, cell, cells }
    }

    /// Whether `pos` lies strictly inside any inflated atom sphere.
    fn buried(&self, pos: Vec3, probe: f32) -> bool {
        let (kx, ky, kz) = cell_key(pos, self.cell);
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let key = (kx + dx, ky + dy, kz + dz);
                    let Some(bucket) = self.cells.get(&key) else {
                        continue;
                    };
                    for &i in bucket {
                        let atom = &self.atoms[i];
                        let reach = atom.radius + probe - 1e-3;
                        if atom.position.distance_squared(pos) < reach * reach {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }
}

/// Signed solvent-excluded field: positive inside the surface, zero on it.
///
/// The solvent-accessible field `|p - a| - (r + probe)` marks where a probe
/// center may sit. Probe centers on the accessible boundary then carve the
/// accessible volume: a point is excluded from the surface interior when
/// some probe center lies within `probe` of it.
pub(crate) fn solvent_excluded_field(
    atoms: &[SurfaceAtom],
    probe: f32,
    resolution: f32,
) -> Option<Grid> {
    let first = atoms.first()?;
    let (mut min, mut max) = (first.position, first.position);
    let mut max_radius = 0f32;
    for atom in atoms {
        min = min.min(atom.position);
        max = max.max(atom.position);
        max_radius = max_radius.max(atom.radius);
    }
    let padding = max_radius + probe + 2.0 * resolution;
    let mut sas = Grid::from_bounds(min, max, resolution, padding, padding);
    let spacing = sas.spacing;
    let mut nearest = vec![u32::MAX; sas.data.len()];

    for (i, atom) in atoms.iter().enumerate() {
        let reach = atom.radius + probe;
        let [xs, ys, zs] = sas.ball_ranges(atom.position, reach + spacing);
        for z in zs {
            for y in ys.clone() {
                for x in xs.clone() {
                    let idx = sas.index(x, y, z);
                    let d = sas.position(x, y, z).distance(atom.position) - reach;
                    if d < sas.data[idx] {
                        sas.data[idx] = d;
                        nearest[idx] = i as u32;
                    }
                }
            }
        }
    }

    let stamp_radius = probe + 2.0 * spacing;
    let mut ses = sas.clone();
    for value in &mut ses.data {
        *value = if *value <= 0.0 {
            stamp_radius - probe
        } else {
            -probe - *value
        };
    }

    let lookup = AtomLookup::new(atoms, 2.0 * (max_radius + probe));
    let [nx, ny, nz] = sas.dims;
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let idx = sas.index(x, y, z);
                if sas.data[idx] <= 0.0 || !touches_inside(&sas, x, y, z) {
                    continue;
                }
                let center =
                    probe_center(&sas, atoms, &lookup, &nearest, probe, [x, y, z]);
                stamp(&mut ses, center, probe, stamp_radius);
            }
        }
    }
    Some(ses)
}

fn touches_inside(grid: &Grid, x: usize, y: usize, z: usize) -> bool {
    let [nx, ny, nz] = grid.dims;
    let neighbors = [
        (x > 0).then(|| grid.index(x - 1, y, z)),
        (x + 1 < nx).then(|| grid.index(x + 1, y, z)),
        (y > 0).then(|| grid.index(x, y - 1, z)),
        (y + 1 < ny).then(|| grid.index(x, y + 1, z)),
        (z > 0).then(|| grid.index(x, y, z - 1)),
        (z + 1 < nz).then(|| grid.index(x, y, z + 1)),
    ];
    neighbors.into_iter().flatten().any(|i| grid.data[i] <= 0.0)
}

/// Probe position for an outside grid point next to the accessible volume:
/// the point projected onto its nearest atom's accessible sphere, unless
/// that lands inside another atom's sphere.
fn probe_center(
    sas: &Grid,
    atoms: &[SurfaceAtom],
    lookup: &AtomLookup<'_>,
    nearest: &[u32],
    probe: f32,
    [x, y, z]: [usize; 3],
) -> Vec3 {
    let point = sas.position(x, y, z);
    let Some(atom) = atoms.get(nearest[sas.index(x, y, z)] as usize) else {
        return point;
    };
    let projected = atom.position
        + (point - atom.position).normalize_or_zero() * (atom.radius + probe);
    if lookup.buried(projected, probe) {
        point
    } else {
        projected
    }
}

fn stamp(ses: &mut Grid, center: Vec3, probe: f32, radius: f32) {
    let [xs, ys, zs] = ses.ball_ranges(center, radius);
    for z in zs {
        for y in ys.clone() {
            for x in xs.clone() {
                let idx = ses.index(x, y, z);
                let d = ses.position(x, y, z).distance(center) - probe;
                if d < ses.data[idx] {
                    ses.data[idx] = d;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(x: f32, radius: f32) -> SurfaceAtom {
        SurfaceAtom {
            position: Vec3::new(x, 0.0, 0.0),
            radius,
        }
    }

    #[test]
    fn from_bounds_covers_padding() {
        let grid = Grid::from_bounds(Vec3::ZERO, Vec3::splat(2.0), 0.5, 1.0, 0.0);
        assert_eq!(grid.dims, [9, 9, 9]);
        assert_eq!(grid.origin, Vec3::splat(-1.0));
        assert_eq!(grid.position(8, 8, 8), Vec3::splat(3.0));
    }

    #[test]
    fn oversized_grids_are_coarsened() {
        let grid = Grid::from_bounds(Vec3::ZERO, Vec3::splat(1000.0), 0.1, 0.0, 0.0);
        assert!(grid.data.len() <= MAX_GRID_POINTS);
        assert!(grid.spacing > 0.1);
    }

    #[test]
    fn ball_ranges_clamp_to_grid() {
        let grid = Grid::from_bounds(Vec3::ZERO, Vec3::splat(2.0), 1.0, 0.0, 0.0);
        let [xs, _, _] = grid.ball_ranges(Vec3::ZERO, 1.5);
        assert_eq!(xs, 0..3);
        let [xs, _, _] = grid.ball_ranges(Vec3::splat(-50.0), 1.0);
        assert!(xs.is_empty());
    }

    #[test]
    fn single_atom_field_matches_vdw_sphere() {
        let field = solvent_excluded_field(&[atom(0.0, 1.7)], 1.4, 0.25).unwrap();
        assert!(field.value_near(Vec3::ZERO).unwrap() > 0.0);
        assert!(field.value_near(Vec3::new(1.2, 0.0, 0.0)).unwrap() > 0.0);
        assert!(field.value_near(Vec3::new(2.25, 0.0, 0.0)).unwrap() < 0.0);
        let on_surface = field.value_near(Vec3::new(1.75, 0.0, 0.0)).unwrap();
        assert!(on_surface.abs() < 0.2, "{on_surface}");
    }

    #[test]
    fn probe_fills_narrow_gaps() {
        // 0.6 Å gap between vdW spheres; a 1.4 Å probe cannot enter it.
        let atoms = [atom(0.0, 1.7), atom(4.0, 1.7)];
        let field = solvent_excluded_field(&atoms, 1.4, 0.25).unwrap();
        assert!(field.value_near(Vec3::new(2.0, 0.0, 0.0)).unwrap() > 0.0);

        let far = [atom(0.0, 1.7), atom(12.0, 1.7)];
        let field = solvent_excluded_field(&far, 1.4, 0.25).unwrap();
        assert!(field.value_near(Vec3::new(6.0, 0.0, 0.0)).unwrap() < 0.0);
    }

    #[test]
    fn no_atoms_no_field() {
        assert!(solvent_excluded_field(&[], 1.4, 0.5).is_none());
    }
}
