//! Wavefront OBJ writer.

use std::io::{self, Write};

use crate::surface::SurfaceMesh;

/// First line of every exported file.
pub const OBJ_HEADER: &str = concat!("# molsurf ", env!("CARGO_PKG_VERSION"));

/// Write `meshes` as one OBJ document: an object per mesh, vertex and
/// normal records, then `f v//vn` faces with 1-based indices running across
/// all objects. No meshes gives a header-only file.
pub fn write_obj<W: Write>(out: &mut W, meshes: &[SurfaceMesh]) -> io::Result<()> {
    writeln!(out, "{OBJ_HEADER}")?;
    let mut offset = 1usize;
    for mesh in meshes {
        writeln!(out, "o {}", mesh.name)?;
        for v in &mesh.vertices {
            writeln!(out, "v {} {} {}", v.x, v.y, v.z)?;
        }
        for n in &mesh.normals {
            writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
        }
        for tri in &mesh.triangles {
            let [a, b, c] = tri.map(|i| i as usize + offset);
            writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}")?;
        }
        offset += mesh.vertices.len();
    }
    out.flush()
}
