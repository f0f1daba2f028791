//! Molecular (solvent-excluded) surface triangulation.
//!
//! Atoms are spheres of their van der Waals radius. A probe sphere rolled
//! over them traces the solvent-excluded surface, which is sampled as a
//! signed field on a regular grid and polygonized with marching tetrahedra.

mod grid;
pub mod radii;
mod tetra;

use glam::Vec3;

pub use radii::{element_of, vdw_radius};

/// A sphere contributing to a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceAtom {
    /// Center in Å.
    pub position: Vec3,
    /// Radius in Å.
    pub radius: f32,
}

/// Surface sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceParams {
    /// Solvent probe radius in Å.
    pub probe_radius: f32,
    /// Grid spacing in Å.
    pub resolution: f32,
}

/// A named triangle mesh with per-vertex normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceMesh {
    /// Mesh name, used as the OBJ object name.
    pub name: String,
    /// Vertex positions.
    pub vertices: Vec<Vec3>,
    /// Unit normals, parallel to `vertices`.
    pub normals: Vec<Vec3>,
    /// Counter-clockwise (outward) triangles indexing `vertices`.
    pub triangles: Vec<[u32; 3]>,
}

impl SurfaceMesh {
    /// Whether the mesh has no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// Area-weighted vertex normals.
fn vertex_normals(vertices: &[Vec3], triangles: &[[u32; 3]]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; vertices.len()];
    for tri in triangles {
        let [a, b, c] = tri.map(|i| vertices[i as usize]);
        // Cross product length is twice the triangle area.
        let n = (b - a).cross(c - a);
        for &i in tri {
            normals[i as usize] += n;
        }
    }
    for n in &mut normals {
        *n = n.try_normalize().unwrap_or(Vec3::Z);
    }
    normals
}

/// Triangulate the molecular surface of `atoms`.
///
/// An empty atom list gives an empty mesh.
#[must_use]
pub fn molecular_surface(
    name: impl Into<String>,
    atoms: &[SurfaceAtom],
    params: SurfaceParams,
) -> SurfaceMesh {
    let name = name.into();
    let Some(field) =
        grid::solvent_excluded_field(atoms, params.probe_radius, params.resolution)
    else {
        return SurfaceMesh {
            name,
            ..SurfaceMesh::default()
        };
    };
    if field.spacing > params.resolution {
        log::warn!(
            "{name}: {} atoms exceed the grid budget, resolution lowered from \
             {:.2} Å to {:.2} Å",
            atoms.len(),
            params.resolution,
            field.spacing
        );
    }

    let polygons = tetra::polygonize(&field);
    let normals = vertex_normals(&polygons.vertices, &polygons.triangles);
    log::debug!(
        "{name}: {} atoms -> {} vertices, {} triangles",
        atoms.len(),
        polygons.vertices.len(),
        polygons.triangles.len()
    );
    SurfaceMesh {
        name,
        vertices: polygons.vertices,
        normals,
        triangles: polygons.triangles,
    }
}
