//! Projected decals: the part of a target surface inside an oriented box,
//! clipped and re-emitted as its own mesh with planar UVs.
//!
//! Output geometry is expressed in target-local space so it can be attached to
//! the target's scene subtree and follow later transform edits.

use log::{debug, warn};
use serde::Serialize;

use crate::geom::{BBox, GeomMesh, Point3, Tolerance, Transform, Vec3};

use super::frame::{self, Frame};
use super::target::TargetMesh;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DecalKind {
    Projected,
    /// Flat quad hovering over the anchor; used when projection is impossible.
    FlatQuad,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecalGeometry {
    pub mesh: GeomMesh,
    pub kind: DecalKind,
}

impl DecalGeometry {
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.mesh.triangle_count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FallbackReason {
    NotTriangulated,
    DegenerateOrientation,
    SingularTransform,
    EmptyClip,
    /// The surface ray along the normal found nothing to project onto.
    NoSurface,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecalDiagnostics {
    pub candidate_triangles: usize,
    pub clipped_triangles: usize,
    pub degenerate_discarded: usize,
    pub fallback: Option<FallbackReason>,
}

/// World-space placement of a decal box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecalRequest {
    pub anchor: Point3,
    pub normal: Vec3,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

impl DecalRequest {
    /// Square decal with box depth `size * depth_fraction`.
    #[must_use]
    pub fn square(anchor: Point3, normal: Vec3, size: f64, depth_fraction: f64) -> Self {
        Self {
            anchor,
            normal,
            width: size,
            height: size,
            depth: size * depth_fraction,
        }
    }

    /// Box frame: origin at the anchor, +Z along the normal.
    fn projector(&self) -> Option<Transform> {
        Transform::facing(self.anchor, self.normal, Vec3::Y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecalProjector {
    pub tolerance: Tolerance,
    pub surface_offset: f64,
}

impl Default for DecalProjector {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::DEFAULT,
            surface_offset: 0.02,
        }
    }
}

/// Vertex carried through clipping: position in projector space plus the
/// local surface normal.
#[derive(Debug, Clone, Copy)]
struct ClipVertex {
    p: Point3,
    n: Vec3,
}

impl ClipVertex {
    fn lerp(self, other: Self, t: f64) -> Self {
        Self {
            p: self.p.lerp(other.p, t),
            n: self.n.lerp(other.n, t),
        }
    }
}

impl DecalProjector {
    #[must_use]
    pub const fn new(tolerance: Tolerance, surface_offset: f64) -> Self {
        Self {
            tolerance,
            surface_offset,
        }
    }

    /// Projects `request` onto `target`. Never fails: whenever a projected
    /// decal cannot be produced a flat quad is returned and the reason is
    /// recorded in the diagnostics.
    #[must_use]
    pub fn project(&self, target: &TargetMesh, request: &DecalRequest) -> (DecalGeometry, DecalDiagnostics) {
        let mut diag = DecalDiagnostics::default();

        let Some(projector) = request.projector() else {
            return self.fallback_quad(target, request, diag, FallbackReason::DegenerateOrientation);
        };
        if !target.is_triangulated() {
            return self.fallback_quad(target, request, diag, FallbackReason::NotTriangulated);
        }
        // target local -> projector space, and back.
        let to_projector = projector
            .inverse()
            .map(|inv| inv * target.world_transform())
            .filter(Transform::is_finite);
        let Some((to_projector, to_local)) = to_projector.and_then(|m| Some((m, m.inverse()?))) else {
            return self.fallback_quad(target, request, diag, FallbackReason::SingularTransform);
        };

        let half = Vec3::new(request.width * 0.5, request.height * 0.5, request.depth * 0.5);
        let box_in_projector = BBox::from_half_extents(half);
        let search = box_in_projector.transform(to_local);
        let mesh = target.mesh();
        let candidates: Vec<usize> = match target.bvh() {
            Some(bvh) => bvh.overlapping(search),
            None => (0..mesh.triangle_count()).collect(),
        };
        diag.candidate_triangles = candidates.len();

        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut uvs = Vec::new();

        for tri_index in candidates {
            let (Some(tri), Some(vertex_ids)) = (mesh.triangle(tri_index), mesh.triangle_indices(tri_index)) else {
                continue;
            };
            let face_normal = tri.unit_normal().unwrap_or(Vec3::Z);
            let polygon: Vec<ClipVertex> = [tri.a, tri.b, tri.c]
                .into_iter()
                .zip(vertex_ids)
                .map(|(p, id)| ClipVertex {
                    p: to_projector.apply_point(p),
                    n: mesh.vertex_normal(id).unwrap_or(face_normal),
                })
                .collect();

            let clipped = clip_to_box(polygon, half);
            if clipped.len() < 3 {
                continue;
            }
            diag.clipped_triangles += 1;

            for i in 1..clipped.len() - 1 {
                let fan = [clipped[0], clipped[i], clipped[i + 1]];
                let local = fan.map(|v| to_local.apply_point(v.p));
                if is_sliver(local, self.tolerance) {
                    diag.degenerate_discarded += 1;
                    continue;
                }
                for (v, p) in fan.into_iter().zip(local) {
                    positions.push(p.to_array());
                    normals.push(v.n.normalized().unwrap_or(face_normal).to_array());
                    uvs.push([0.5 + v.p.x / request.width, 0.5 + v.p.y / request.height]);
                }
            }
        }

        if positions.is_empty() {
            return self.fallback_quad(target, request, diag, FallbackReason::EmptyClip);
        }

        debug!(
            "decal projected: {} candidates, {} clipped, {} degenerate, {} vertices",
            diag.candidate_triangles,
            diag.clipped_triangles,
            diag.degenerate_discarded,
            positions.len()
        );
        let indices = (0..positions.len() as u32).collect();
        let mesh = GeomMesh::with_attributes(positions, indices, Some(uvs), Some(normals));
        (
            DecalGeometry {
                mesh,
                kind: DecalKind::Projected,
            },
            diag,
        )
    }

    /// Flat quad result carrying `reason` in its diagnostics.
    #[must_use]
    pub fn fallback_quad(
        &self,
        target: &TargetMesh,
        request: &DecalRequest,
        mut diag: DecalDiagnostics,
        reason: FallbackReason,
    ) -> (DecalGeometry, DecalDiagnostics) {
        warn!("decal projection fell back to a flat quad: {reason:?}");
        diag.fallback = Some(reason);
        let mesh = self.flat_quad(target, request);
        (
            DecalGeometry {
                mesh,
                kind: DecalKind::FlatQuad,
            },
            diag,
        )
    }

    /// Flat quad built straight from a target-local anchor and normal, for
    /// when the target's world transform cannot carry a request at all.
    /// `size` is in local units.
    #[must_use]
    pub fn local_fallback(
        &self,
        anchor: Point3,
        normal: Vec3,
        size: f64,
        reason: FallbackReason,
    ) -> (DecalGeometry, DecalDiagnostics) {
        warn!("decal projection fell back to a local flat quad: {reason:?}");
        let frame = Transform::facing(anchor, normal, Vec3::Y).unwrap_or_else(|| Transform::translate(anchor.to_vec3()));
        let normal = frame.apply_vec(Vec3::Z).normalized().unwrap_or(Vec3::Z);
        let diag = DecalDiagnostics {
            fallback: Some(reason),
            ..DecalDiagnostics::default()
        };
        let geometry = DecalGeometry {
            mesh: self.quad_mesh(frame, size * 0.5, size * 0.5, normal),
            kind: DecalKind::FlatQuad,
        };
        (geometry, diag)
    }

    /// Quad of the requested size lifted `surface_offset` along the normal,
    /// in target-local space. A singular target transform leaves the quad in
    /// world coordinates.
    #[must_use]
    pub fn flat_quad(&self, target: &TargetMesh, request: &DecalRequest) -> GeomMesh {
        let projector = request
            .projector()
            .unwrap_or_else(|| Transform::translate(request.anchor.to_vec3()));
        let to_local = target.world_transform().inverse().unwrap_or_default();

        let world_normal = projector.apply_vec(Vec3::Z);
        let normal = frame::to_local_normal(target, world_normal)
            .ok()
            .or_else(|| world_normal.normalized())
            .unwrap_or(Vec3::Z);

        self.quad_mesh(to_local * projector, request.width * 0.5, request.height * 0.5, normal)
    }

    /// Two-triangle quad in the plane `z = surface_offset` of `frame`.
    fn quad_mesh(&self, frame: Transform, hw: f64, hh: f64, normal: Vec3) -> GeomMesh {
        let z = self.surface_offset;
        let positions = [[-hw, -hh], [hw, -hh], [hw, hh], [-hw, hh]]
            .map(|[x, y]| frame.apply_point(Point3::new(x, y, z)).to_array())
            .to_vec();
        GeomMesh::with_attributes(
            positions,
            vec![0, 1, 2, 0, 2, 3],
            Some(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]),
            Some(vec![normal.to_array(); 4]),
        )
    }
}

/// True for triangles whose area is negligible next to their longest edge,
/// so the test holds at any model scale.
fn is_sliver(p: [Point3; 3], tol: Tolerance) -> bool {
    let e0 = p[1].sub_point(p[0]);
    let e1 = p[2].sub_point(p[0]);
    let e2 = p[2].sub_point(p[1]);
    let longest = e0.length().max(e1.length()).max(e2.length());
    let area = e0.cross(e1).length() * 0.5;
    !area.is_finite() || !longest.is_finite() || area <= tol.eps * longest * longest
}

/// Sutherland–Hodgman against the six faces of the box `[-half, half]`.
fn clip_to_box(mut polygon: Vec<ClipVertex>, half: Vec3) -> Vec<ClipVertex> {
    let planes = [
        (0, 1.0, half.x),
        (0, -1.0, half.x),
        (1, 1.0, half.y),
        (1, -1.0, half.y),
        (2, 1.0, half.z),
        (2, -1.0, half.z),
    ];
    for (axis, sign, limit) in planes {
        // Signed distance inside the plane `sign * p[axis] <= limit`.
        let inside = |v: &ClipVertex| limit - sign * v.p.to_array()[axis];
        let mut next = Vec::with_capacity(polygon.len() + 2);
        for i in 0..polygon.len() {
            let current = polygon[i];
            let previous = polygon[(i + polygon.len() - 1) % polygon.len()];
            let d_cur = inside(&current);
            let d_prev = inside(&previous);
            if d_cur >= 0.0 {
                if d_prev < 0.0 {
                    next.push(previous.lerp(current, d_prev / (d_prev - d_cur)));
                }
                next.push(current);
            } else if d_prev >= 0.0 {
                next.push(previous.lerp(current, d_prev / (d_prev - d_cur)));
            }
        }
        polygon = next;
        if polygon.len() < 3 {
            return Vec::new();
        }
    }
    polygon
}
