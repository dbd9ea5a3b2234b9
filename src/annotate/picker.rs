//! Screen-space picking against the target and placed markers.

use serde::Serialize;

use crate::geom::{Bvh, GeomMesh, Point3, Ray3, Tolerance, Transform, Vec3, ray_triangle_intersection};

use super::camera::{Camera, Viewport};
use super::markers::MarkerId;

/// What a pick landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum ObjectRef {
    Target,
    Marker(MarkerId),
}

/// A mesh that can be hit, with its current local-to-world transform.
#[derive(Debug, Clone, Copy)]
pub struct PickCandidate<'a> {
    pub object: ObjectRef,
    pub mesh: &'a GeomMesh,
    pub world: Transform,
    pub bvh: Option<&'a Bvh>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickHit {
    pub point: Point3,
    /// World-space unit normal of the hit face.
    pub face_normal: Vec3,
    pub object: ObjectRef,
    /// Ray parameter of the hit in world units.
    pub distance: f64,
    pub triangle: usize,
}

/// Nearest hit of `ray` over all candidates. A later candidate only wins when
/// it is nearer by more than the tolerance, so coincident surfaces resolve to
/// the earlier one.
#[must_use]
pub fn pick(ray: Ray3, candidates: &[PickCandidate<'_>], tol: Tolerance) -> Option<PickHit> {
    let mut best: Option<PickHit> = None;
    for candidate in candidates {
        let Some(hit) = pick_one(ray, candidate, tol) else {
            continue;
        };
        if best.is_none_or(|b| hit.distance < b.distance - tol.eps * b.distance.max(1.0)) {
            best = Some(hit);
        }
    }
    best
}

/// Ray through pixel `(x, y)` of `viewport`, then [`pick`].
#[must_use]
pub fn pick_at(
    camera: &Camera,
    viewport: &Viewport,
    x: f64,
    y: f64,
    candidates: &[PickCandidate<'_>],
    tol: Tolerance,
) -> Option<PickHit> {
    let (ndc_x, ndc_y) = viewport.to_ndc(x, y)?;
    let ray = camera.ray_through(ndc_x, ndc_y)?;
    pick(ray, candidates, tol)
}

fn pick_one(ray: Ray3, candidate: &PickCandidate<'_>, tol: Tolerance) -> Option<PickHit> {
    let to_local = candidate.world.inverse()?;
    let local = ray.transformed(to_local);
    let mesh = candidate.mesh;
    let test = |i: usize| {
        mesh.triangle(i)
            .and_then(|tri| ray_triangle_intersection(local.origin, local.direction, tri, tol))
            .map(|hit| hit.t)
    };

    let (triangle, t) = match candidate.bvh {
        Some(bvh) => bvh.closest_hit(local.origin, local.direction, f64::INFINITY, test)?,
        None => (0..mesh.triangle_count())
            .filter_map(|i| test(i).map(|t| (i, t)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))?,
    };

    let local_normal = mesh.triangle(triangle)?.unit_normal()?;
    let face_normal = candidate.world.normal_matrix()?.apply(local_normal)?;
    Some(PickHit {
        point: ray.at(t),
        face_normal,
        object: candidate.object,
        distance: t,
        triangle,
    })
}
