//! Ray and triangle primitives shared by picking and decal projection.

use super::{Point3, Tolerance, Transform, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle3 {
    pub a: Point3,
    pub b: Point3,
    pub c: Point3,
}

impl Triangle3 {
    #[must_use]
    pub const fn new(a: Point3, b: Point3, c: Point3) -> Self {
        Self { a, b, c }
    }

    /// Unnormalized face normal (counter-clockwise winding).
    #[must_use]
    pub fn normal(self) -> Vec3 {
        self.b.sub_point(self.a).cross(self.c.sub_point(self.a))
    }

    #[must_use]
    pub fn unit_normal(self) -> Option<Vec3> {
        self.normal().normalized()
    }

    #[must_use]
    pub fn area(self) -> f64 {
        self.normal().length() * 0.5
    }

    #[must_use]
    pub fn transformed(self, t: Transform) -> Self {
        Self::new(t.apply_point(self.a), t.apply_point(self.b), t.apply_point(self.c))
    }
}

/// Half-line `origin + t * direction`, `t >= 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray3 {
    pub origin: Point3,
    pub direction: Vec3,
}

impl Ray3 {
    /// Builds a ray with a normalized direction. `None` for a zero direction.
    #[must_use]
    pub fn new(origin: Point3, direction: Vec3) -> Option<Self> {
        Some(Self {
            origin,
            direction: direction.normalized()?,
        })
    }

    #[must_use]
    pub fn at(self, t: f64) -> Point3 {
        self.origin + self.direction * t
    }

    /// The same ray expressed in another frame. The direction is left
    /// unnormalized so that ray parameters stay comparable across frames.
    #[must_use]
    pub fn transformed(self, t: Transform) -> Self {
        Self {
            origin: t.apply_point(self.origin),
            direction: t.apply_vec(self.direction),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub t: f64,
    pub u: f64,
    pub v: f64,
}

/// Möller–Trumbore ray/triangle test. Hits behind the origin are rejected;
/// both triangle faces count.
#[must_use]
pub fn ray_triangle_intersection(
    origin: Point3,
    dir: Vec3,
    tri: Triangle3,
    tol: Tolerance,
) -> Option<RayHit> {
    let edge1 = tri.b.sub_point(tri.a);
    let edge2 = tri.c.sub_point(tri.a);
    let h = dir.cross(edge2);
    let det = edge1.dot(h);
    let det_eps = tol.eps * edge1.length() * h.length();
    if !det.is_finite() || det.abs() <= det_eps {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = origin.sub_point(tri.a);
    let u = inv_det * s.dot(h);
    let uv_eps = tol.eps;
    if u < -uv_eps || u > 1.0 + uv_eps {
        return None;
    }

    let q = s.cross(edge1);
    let v = inv_det * dir.dot(q);
    if v < -uv_eps || u + v > 1.0 + uv_eps {
        return None;
    }

    let t = inv_det * edge2.dot(q);
    if !t.is_finite() {
        return None;
    }
    if t < -tol.eps {
        return None;
    }

    Some(RayHit { t, u, v })
}
