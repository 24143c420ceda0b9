//! Triangle meshes for the build stage.
//!
//! Meshes are plain triangle soups in metres. Every primitive validates its
//! inputs and [`Mesh::validate`] rejects degenerate output, so a bad design
//! surfaces as a `Geometry` error instead of a broken STL file.

pub mod stl;

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use crate::domain::cad::{BoundingBox, CadPart};
use crate::domain::error::{StageError, StageResult};

pub type Vec3 = [f64; 3];

/// Facets smaller than this (m^2) count as degenerate.
const MIN_FACET_AREA: f64 = 1e-12;

fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn scale(a: Vec3, k: f64) -> Vec3 {
    [a[0] * k, a[1] * k, a[2] * k]
}

pub(crate) fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn norm(a: Vec3) -> f64 {
    (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt()
}

/// Area of one triangle.
pub fn triangle_area(t: &[Vec3; 3]) -> f64 {
    0.5 * norm(cross(sub(t[1], t[0]), sub(t[2], t[0])))
}

/// A named triangle soup.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub triangles: Vec<[Vec3; 3]>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            triangles: Vec::new(),
        }
    }

    pub fn push_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3) {
        self.triangles.push([a, b, c]);
    }

    /// Push quad `a b c d` (counter-clockwise) as two triangles.
    pub fn push_quad(&mut self, a: Vec3, b: Vec3, c: Vec3, d: Vec3) {
        self.triangles.push([a, b, c]);
        self.triangles.push([a, c, d]);
    }

    pub fn extend(&mut self, other: Mesh) {
        self.triangles.extend(other.triangles);
    }

    pub fn surface_area(&self) -> f64 {
        self.triangles.iter().map(triangle_area).sum()
    }

    pub fn bounds(&self) -> BoundingBox {
        let mut bounds = BoundingBox::empty();
        for triangle in &self.triangles {
            for vertex in triangle {
                bounds.include(*vertex);
            }
        }
        bounds
    }

    /// Reject empty meshes, non-finite vertices and zero-area facets.
    pub fn validate(&self) -> StageResult<()> {
        if self.triangles.is_empty() {
            return Err(StageError::geometry(format!("mesh '{}' is empty", self.name)));
        }
        for (idx, triangle) in self.triangles.iter().enumerate() {
            if triangle.iter().flatten().any(|v| !v.is_finite()) {
                return Err(StageError::geometry(format!(
                    "mesh '{}' facet {idx} has a non-finite vertex",
                    self.name
                )));
            }
            if triangle_area(triangle) < MIN_FACET_AREA {
                return Err(StageError::geometry(format!(
                    "mesh '{}' facet {idx} has zero area",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Square-section member from `from` to `to`.
pub fn beam(name: &str, from: Vec3, to: Vec3, side: f64) -> StageResult<Mesh> {
    let axis = sub(to, from);
    let length = norm(axis);
    if !length.is_finite() || length <= 0.0 {
        return Err(StageError::geometry(format!("member '{name}' has zero length")));
    }
    if !side.is_finite() || side <= 0.0 {
        return Err(StageError::geometry(format!(
            "member '{name}' has non-positive section {side}"
        )));
    }

    let dir = scale(axis, 1.0 / length);
    // Pick the world axis least aligned with the member as a reference.
    let reference = if dir[2].abs() < 0.9 {
        [0.0, 0.0, 1.0]
    } else {
        [1.0, 0.0, 0.0]
    };
    let u = cross(dir, reference);
    let u = scale(u, 0.5 * side / norm(u));
    let v = cross(dir, u);
    let v = scale(v, 0.5 * side / norm(v));

    let corners = |origin: Vec3| -> [Vec3; 4] {
        [
            add(add(origin, u), v),
            add(sub(origin, u), v),
            sub(sub(origin, u), v),
            sub(add(origin, u), v),
        ]
    };
    let a = corners(from);
    let b = corners(to);

    let mut mesh = Mesh::new(name);
    for i in 0..4 {
        let j = (i + 1) % 4;
        mesh.push_quad(a[i], a[j], b[j], b[i]);
    }
    mesh.push_quad(a[3], a[2], a[1], a[0]);
    mesh.push_quad(b[0], b[1], b[2], b[3]);
    Ok(mesh)
}

/// Triangle fan from `apex` to a closed ring of points.
pub fn fan(name: &str, apex: Vec3, ring: &[Vec3]) -> StageResult<Mesh> {
    if ring.len() < 3 {
        return Err(StageError::geometry(format!(
            "surface '{name}' needs at least 3 ring points, got {}",
            ring.len()
        )));
    }
    let mut mesh = Mesh::new(name);
    for i in 0..ring.len() {
        let j = (i + 1) % ring.len();
        mesh.push_triangle(apex, ring[i], ring[j]);
    }
    Ok(mesh)
}

/// Horizontal ring of `segments` points at height `z`.
pub fn ring(radius: f64, z: f64, segments: usize) -> Vec<Vec3> {
    (0..segments)
        .map(|i| {
            let theta = TAU * i as f64 / segments as f64;
            [radius * theta.cos(), radius * theta.sin(), z]
        })
        .collect()
}

/// Helical sail surface between `inner_radius` and `outer_radius`.
///
/// `rise_per_turn` is the axial advance of one full turn. Successive turns
/// must clear each other by at least `clearance`, otherwise the surface
/// intersects itself.
pub fn helicoid(
    name: &str,
    inner_radius: f64,
    outer_radius: f64,
    rise_per_turn: f64,
    turns: f64,
    clearance: f64,
    segments_per_turn: usize,
) -> StageResult<Mesh> {
    if inner_radius.is_nan() || inner_radius < 0.0 || outer_radius <= inner_radius {
        return Err(StageError::geometry(format!(
            "helicoid '{name}' radii are inverted ({inner_radius} >= {outer_radius})"
        )));
    }
    if turns.is_nan() || turns <= 0.0 || segments_per_turn < 3 {
        return Err(StageError::geometry(format!(
            "helicoid '{name}' needs positive turns and at least 3 segments per turn"
        )));
    }
    if turns > 1.0 && rise_per_turn < clearance {
        return Err(StageError::geometry(format!(
            "helicoid '{name}' turns overlap: rise per turn {rise_per_turn:.4} m is below clearance {clearance:.4} m"
        )));
    }

    let steps = ((turns * segments_per_turn as f64).ceil() as usize).max(1);
    let point = |radius: f64, step: usize| -> Vec3 {
        let fraction = turns * step as f64 / steps as f64;
        let theta = TAU * fraction;
        [
            radius * theta.cos(),
            radius * theta.sin(),
            rise_per_turn * fraction,
        ]
    };

    let mut mesh = Mesh::new(name);
    for step in 0..steps {
        let a = point(inner_radius, step);
        let b = point(outer_radius, step);
        let c = point(outer_radius, step + 1);
        let d = point(inner_radius, step + 1);
        if inner_radius == 0.0 {
            mesh.push_triangle(a, b, c);
        } else {
            mesh.push_quad(a, b, c, d);
        }
    }
    Ok(mesh)
}

/// A mesh with the part metadata that goes with it.
#[derive(Debug, Clone)]
pub struct ModelPart {
    pub part: CadPart,
    pub mesh: Mesh,
}

/// Output of an invention's `build()`: parts not yet written to disk.
#[derive(Debug, Clone, Default)]
pub struct CadModel {
    pub parts: Vec<ModelPart>,
}

impl CadModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a part. The mesh is validated before it is accepted.
    pub fn add_part(
        &mut self,
        mesh: Mesh,
        material: &str,
        dimensions: BTreeMap<String, f64>,
        mass_kg: f64,
    ) -> StageResult<()> {
        mesh.validate()?;
        if self.parts.iter().any(|p| p.part.name == mesh.name) {
            return Err(StageError::geometry(format!(
                "duplicate part name '{}'",
                mesh.name
            )));
        }
        if !mass_kg.is_finite() || mass_kg < 0.0 {
            return Err(StageError::geometry(format!(
                "part '{}' has invalid mass {mass_kg}",
                mesh.name
            )));
        }
        let part = CadPart {
            name: mesh.name.clone(),
            material: material.to_string(),
            dimensions,
            triangle_count: mesh.triangles.len(),
            mass_kg,
        };
        self.parts.push(ModelPart { part, mesh });
        Ok(())
    }

    pub fn bounds(&self) -> BoundingBox {
        let mut bounds = BoundingBox::empty();
        for part in &self.parts {
            bounds.merge(&part.mesh.bounds());
        }
        bounds
    }
}
