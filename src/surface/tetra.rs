//! Marching tetrahedra over a [`Grid`].
//!
//! Each grid cube is split into six tetrahedra around its main diagonal, so
//! neighboring cubes share face diagonals and the resulting mesh is closed
//! wherever the field is.

use glam::Vec3;
use rustc_hash::FxHashMap;

use super::grid::Grid;

/// Cube corner offsets; corner `i` is `(i & 1, (i >> 1) & 1, (i >> 2) & 1)`.
const CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [1, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
];

/// Six tetrahedra sharing the 0-7 diagonal.
const TETRAHEDRA: [[usize; 4]; 6] = [
    [0, 1, 3, 7],
    [0, 3, 2, 7],
    [0, 2, 6, 7],
    [0, 6, 4, 7],
    [0, 4, 5, 7],
    [0, 5, 1, 7],
];

/// Indexed triangle soup.
#[derive(Debug, Default)]
pub(crate) struct Polygons {
    pub(crate) vertices: Vec<Vec3>,
    pub(crate) triangles: Vec<[u32; 3]>,
}

struct Corner {
    index: usize,
    position: Vec3,
    value: f32,
}

struct Builder<'g> {
    grid: &'g Grid,
    out: Polygons,
    edges: FxHashMap<(usize, usize), u32>,
}

impl Builder<'_> {
    /// Vertex where the zero level crosses the edge `a`-`b`.
    fn edge_vertex(&mut self, a: &Corner, b: &Corner) -> u32 {
        let key = (a.index.min(b.index), a.index.max(b.index));
        if let Some(&v) = self.edges.get(&key) {
            return v;
        }
        let t = (a.value / (a.value - b.value)).clamp(0.0, 1.0);
        let v = self.out.vertices.len() as u32;
        self.out.vertices.push(a.position.lerp(b.position, t));
        let _ = self.edges.insert(key, v);
        v
    }

    fn emit(&mut self, mut tri: [u32; 3], flip: bool) {
        if flip {
            tri.swap(1, 2);
        }
        self.out.triangles.push(tri);
    }

    /// Winding is decided from the corner lattice positions rather than
    /// the interpolated vertices, so near-degenerate triangles still come
    /// out facing away from the inside.
    fn tetrahedron(&mut self, corners: [&Corner; 4]) {
        let (inside, outside): (Vec<&Corner>, Vec<&Corner>) =
            corners.into_iter().partition(|c| c.value > 0.0);
        let volume = |a: &Corner, b: &Corner, c: &Corner, d: &Corner| {
            (b.position - a.position)
                .cross(c.position - a.position)
                .dot(d.position - a.position)
        };

        match (inside.as_slice(), outside.as_slice()) {
            (&[i0], &[o0, o1, o2]) => {
                let tri = [
                    self.edge_vertex(i0, o0),
                    self.edge_vertex(i0, o1),
                    self.edge_vertex(i0, o2),
                ];
                self.emit(tri, volume(i0, o0, o1, o2) < 0.0);
            }
            (&[i0, i1, i2], &[o0]) => {
                let tri = [
                    self.edge_vertex(i0, o0),
                    self.edge_vertex(i1, o0),
                    self.edge_vertex(i2, o0),
                ];
                self.emit(tri, volume(o0, i0, i1, i2) > 0.0);
            }
            (&[i0, i1], &[o0, o1]) => {
                let q = [
                    self.edge_vertex(i0, o0),
                    self.edge_vertex(i0, o1),
                    self.edge_vertex(i1, o1),
                    self.edge_vertex(i1, o0),
                ];
                let flip = volume(i0, i1, o0, o1) < 0.0;
                self.emit([q[0], q[1], q[2]], flip);
                self.emit([q[0], q[2], q[3]], flip);
            }
            _ => {}
        }
    }
}

/// Triangulate the `value == 0` level set, with `value > 0` inside.
pub(crate) fn polygonize(grid: &Grid) -> Polygons {
    let mut builder = Builder {
        grid,
        out: Polygons::default(),
        edges: FxHashMap::default(),
    };
    let [nx, ny, nz] = grid.dims;
    if nx < 2 || ny < 2 || nz < 2 {
        return builder.out;
    }

    for z in 0..nz - 1 {
        for y in 0..ny - 1 {
            for x in 0..nx - 1 {
                let corners = CORNERS.map(|[dx, dy, dz]| {
                    let index = builder.grid.index(x + dx, y + dy, z + dz);
                    Corner {
                        index,
                        position: builder.grid.position(x + dx, y + dy, z + dz),
                        value: builder.grid.data[index],
                    }
                });
                let inside = corners.iter().filter(|c| c.value > 0.0).count();
                if inside == 0 || inside == 8 {
                    continue;
                }
                for tet in TETRAHEDRA {
                    builder.tetrahedron(tet.map(|i| &corners[i]));
                }
            }
        }
    }
    builder.out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere_grid(radius: f32, spacing: f32) -> Grid {
        let n = ((2.0 * radius + 4.0 * spacing) / spacing).ceil() as usize + 1;
        let origin = Vec3::splat(-(radius + 2.0 * spacing));
        let mut data = Vec::with_capacity(n * n * n);
        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    let p = origin + Vec3::new(x as f32, y as f32, z as f32) * spacing;
                    data.push(radius - p.length());
                }
            }
        }
        Grid {
            data,
            dims: [n, n, n],
            origin,
            spacing,
        }
    }

    #[test]
    fn sphere_vertices_lie_on_the_sphere() {
        let polys = polygonize(&sphere_grid(2.0, 0.25));
        assert!(!polys.triangles.is_empty());
        for v in &polys.vertices {
            assert!((v.length() - 2.0).abs() < 0.05, "{v}");
        }
    }

    #[test]
    fn sphere_triangles_face_outward() {
        let polys = polygonize(&sphere_grid(2.0, 0.3));
        for [a, b, c] in &polys.triangles {
            let (a, b, c) = (
                polys.vertices[*a as usize],
                polys.vertices[*b as usize],
                polys.vertices[*c as usize],
            );
            let n = (b - a).cross(c - a);
            assert!(n.dot((a + b + c) / 3.0) >= -1e-6);
        }
    }

    #[test]
    fn mesh_is_closed() {
        let polys = polygonize(&sphere_grid(1.5, 0.3));
        let mut edges: FxHashMap<(u32, u32), i32> = FxHashMap::default();
        for tri in &polys.triangles {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                // Directed edges cancel against their reverse in a closed,
                // consistently wound mesh.
                *edges.entry((a.min(b), a.max(b))).or_default() +=
                    if a < b { 1 } else { -1 };
            }
        }
        assert!(edges.values().all(|&n| n == 0));
    }

    #[test]
    fn uniform_field_has_no_surface() {
        let mut grid = sphere_grid(1.0, 0.5);
        grid.data.iter_mut().for_each(|v| *v = -1.0);
        assert!(polygonize(&grid).triangles.is_empty());
    }
}
