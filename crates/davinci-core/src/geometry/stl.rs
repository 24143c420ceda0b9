//! ASCII STL export.

use std::fmt::Write;

use super::{cross, norm, Mesh};

fn facet_normal(t: &[[f64; 3]; 3]) -> [f64; 3] {
    let e1 = [t[1][0] - t[0][0], t[1][1] - t[0][1], t[1][2] - t[0][2]];
    let e2 = [t[2][0] - t[0][0], t[2][1] - t[0][1], t[2][2] - t[0][2]];
    let n = cross(e1, e2);
    let len = norm(n);
    if len == 0.0 {
        [0.0, 0.0, 0.0]
    } else {
        [n[0] / len, n[1] / len, n[2] / len]
    }
}

/// Render a mesh as an ASCII STL solid. Output is byte-stable for a given mesh.
pub fn to_ascii_stl(mesh: &Mesh) -> String {
    let name: String = mesh
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let mut out = String::with_capacity(mesh.triangles.len() * 256);
    // Writing into a String cannot fail.
    let _ = writeln!(out, "solid {name}");
    for triangle in &mesh.triangles {
        let n = facet_normal(triangle);
        let _ = writeln!(out, "  facet normal {:e} {:e} {:e}", n[0], n[1], n[2]);
        let _ = writeln!(out, "    outer loop");
        for v in triangle {
            let _ = writeln!(out, "      vertex {:e} {:e} {:e}", v[0], v[1], v[2]);
        }
        let _ = writeln!(out, "    endloop");
        let _ = writeln!(out, "  endfacet");
    }
    let _ = writeln!(out, "endsolid {name}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_facet() {
        let mut mesh = Mesh::new("test part");
        mesh.push_triangle([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let stl = to_ascii_stl(&mesh);
        assert!(stl.starts_with("solid test_part\n"));
        assert!(stl.contains("facet normal 0e0 0e0 1e0"));
        assert_eq!(stl.matches("vertex").count(), 3);
        assert!(stl.trim_end().ends_with("endsolid test_part"));
    }
}
