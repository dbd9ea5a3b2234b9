use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    /// Unit vector along the X axis.
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    /// Unit vector along the Y axis.
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    /// Unit vector along the Z axis.
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Convert to an array.
    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub const fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[must_use]
    pub const fn cross(self, rhs: Self) -> Self {
        Self {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len.is_finite() && len > 0.0 {
            Some(Self::new(self.x / len, self.y / len, self.z / len))
        } else {
            None
        }
    }

    /// Linear interpolation between two vectors.
    /// Returns `self * (1 - t) + rhs * t`.
    #[must_use]
    pub fn lerp(self, rhs: Self, t: f64) -> Self {
        Self::new(
            self.x + (rhs.x - self.x) * t,
            self.y + (rhs.y - self.y) * t,
            self.z + (rhs.z - self.z) * t,
        )
    }

    /// Returns true if every component is finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        v.to_array()
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    /// The origin point (0, 0, 0).
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Convert point to a position vector from the origin.
    #[must_use]
    pub const fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    #[must_use]
    pub const fn sub_point(self, rhs: Self) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    /// Linear interpolation between two points.
    /// Returns `self * (1 - t) + rhs * t`.
    #[must_use]
    pub fn lerp(self, rhs: Self, t: f64) -> Self {
        Self::new(
            self.x + (rhs.x - self.x) * t,
            self.y + (rhs.y - self.y) * t,
            self.z + (rhs.z - self.z) * t,
        )
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        self.sub_point(other).length()
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Default for Point3 {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }
}

impl From<Point3> for [f64; 3] {
    fn from(p: Point3) -> Self {
        p.to_array()
    }
}

impl From<Vec3> for Point3 {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Point3> for Vec3 {
    fn from(p: Point3) -> Self {
        p.to_vec3()
    }
}

impl Add<Vec3> for Point3 {
    type Output = Self;
    fn add(self, rhs: Vec3) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub<Vec3> for Point3 {
    type Output = Self;
    fn sub(self, rhs: Vec3) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Sub for Point3 {
    type Output = Vec3;
    fn sub(self, rhs: Self) -> Self::Output {
        self.sub_point(rhs)
    }
}

/// Affine 4x4 transform in row-major order (column vectors, `p' = M * p`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    m: [[f64; 4]; 4],
}

impl Transform {
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            m: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Build a transform from 16 values in column-major order, the layout
    /// used by WebGL style `matrixWorld.elements` buffers.
    #[must_use]
    pub fn from_cols_array(cols: &[f64; 16]) -> Self {
        let mut m = [[0.0; 4]; 4];
        for (col, chunk) in cols.chunks_exact(4).enumerate() {
            for (row, value) in chunk.iter().enumerate() {
                m[row][col] = *value;
            }
        }
        Self { m }
    }

    /// Construct a transform from origin and three orthonormal axes.
    /// The axes are expected to be unit vectors and mutually perpendicular.
    #[must_use]
    pub fn from_axes(origin: Point3, x_axis: Vec3, y_axis: Vec3, z_axis: Vec3) -> Self {
        Self {
            m: [
                [x_axis.x, y_axis.x, z_axis.x, origin.x],
                [x_axis.y, y_axis.y, z_axis.y, origin.y],
                [x_axis.z, y_axis.z, z_axis.z, origin.z],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Construct a look-at transform (camera-style).
    /// `eye` is the camera position, `target` is what the camera looks at,
    /// `up` is the world up direction. The camera looks down its local -Z.
    #[must_use]
    pub fn look_at(eye: Point3, target: Point3, up: Vec3) -> Option<Self> {
        let forward = (target - eye).normalized()?;
        let right = forward.cross(up).normalized()?;
        let actual_up = right.cross(forward);
        Some(Self::from_axes(eye, right, actual_up, -forward))
    }

    /// Object-style orientation: local +Z points along `forward`.
    ///
    /// `up` is preferred for the local +Y axis; when `forward` is parallel to
    /// it the world Z (or X) axis is used instead so the frame never degenerates.
    #[must_use]
    pub fn facing(origin: Point3, forward: Vec3, up: Vec3) -> Option<Self> {
        let z_axis = forward.normalized()?;
        let x_axis = [up, Vec3::Z, Vec3::X]
            .into_iter()
            .find_map(|candidate| candidate.cross(z_axis).normalized())?;
        let y_axis = z_axis.cross(x_axis);
        Some(Self::from_axes(origin, x_axis, y_axis, z_axis))
    }

    #[must_use]
    pub const fn translate(offset: Vec3) -> Self {
        Self {
            m: [
                [1.0, 0.0, 0.0, offset.x],
                [0.0, 1.0, 0.0, offset.y],
                [0.0, 0.0, 1.0, offset.z],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    #[must_use]
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            m: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, sz, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    #[must_use]
    pub fn uniform_scale(s: f64) -> Self {
        Self::scale(s, s, s)
    }

    #[must_use]
    pub fn compose(self, other: Self) -> Self {
        let mut result = Self::identity();
        for i in 0..4 {
            for j in 0..4 {
                result.m[i][j] = self.m[i][0] * other.m[0][j]
                    + self.m[i][1] * other.m[1][j]
                    + self.m[i][2] * other.m[2][j]
                    + self.m[i][3] * other.m[3][j];
            }
        }
        result
    }

    /// Compute the inverse of this transform.
    /// Returns `None` if the matrix is singular (non-invertible).
    #[must_use]
    pub fn inverse(self) -> Option<Self> {
        // Use the adjugate method for 4x4 matrix inversion
        let m = &self.m;

        // Compute 2x2 determinants for the first two rows
        let s0 = m[0][0] * m[1][1] - m[1][0] * m[0][1];
        let s1 = m[0][0] * m[1][2] - m[1][0] * m[0][2];
        let s2 = m[0][0] * m[1][3] - m[1][0] * m[0][3];
        let s3 = m[0][1] * m[1][2] - m[1][1] * m[0][2];
        let s4 = m[0][1] * m[1][3] - m[1][1] * m[0][3];
        let s5 = m[0][2] * m[1][3] - m[1][2] * m[0][3];

        // Compute 2x2 determinants for the last two rows
        let c5 = m[2][2] * m[3][3] - m[3][2] * m[2][3];
        let c4 = m[2][1] * m[3][3] - m[3][1] * m[2][3];
        let c3 = m[2][1] * m[3][2] - m[3][1] * m[2][2];
        let c2 = m[2][0] * m[3][3] - m[3][0] * m[2][3];
        let c1 = m[2][0] * m[3][2] - m[3][0] * m[2][2];
        let c0 = m[2][0] * m[3][1] - m[3][0] * m[2][1];

        let det = s0 * c5 - s1 * c4 + s2 * c3 + s3 * c2 - s4 * c1 + s5 * c0;

        if !det.is_finite() || det.abs() < 1e-15 {
            return None;
        }

        let inv_det = 1.0 / det;

        Some(Self {
            m: [
                [
                    (m[1][1] * c5 - m[1][2] * c4 + m[1][3] * c3) * inv_det,
                    (-m[0][1] * c5 + m[0][2] * c4 - m[0][3] * c3) * inv_det,
                    (m[3][1] * s5 - m[3][2] * s4 + m[3][3] * s3) * inv_det,
                    (-m[2][1] * s5 + m[2][2] * s4 - m[2][3] * s3) * inv_det,
                ],
                [
                    (-m[1][0] * c5 + m[1][2] * c2 - m[1][3] * c1) * inv_det,
                    (m[0][0] * c5 - m[0][2] * c2 + m[0][3] * c1) * inv_det,
                    (-m[3][0] * s5 + m[3][2] * s2 - m[3][3] * s1) * inv_det,
                    (m[2][0] * s5 - m[2][2] * s2 + m[2][3] * s1) * inv_det,
                ],
                [
                    (m[1][0] * c4 - m[1][1] * c2 + m[1][3] * c0) * inv_det,
                    (-m[0][0] * c4 + m[0][1] * c2 - m[0][3] * c0) * inv_det,
                    (m[3][0] * s4 - m[3][1] * s2 + m[3][3] * s0) * inv_det,
                    (-m[2][0] * s4 + m[2][1] * s2 - m[2][3] * s0) * inv_det,
                ],
                [
                    (-m[1][0] * c3 + m[1][1] * c1 - m[1][2] * c0) * inv_det,
                    (m[0][0] * c3 - m[0][1] * c1 + m[0][2] * c0) * inv_det,
                    (-m[3][0] * s3 + m[3][1] * s1 - m[3][2] * s0) * inv_det,
                    (m[2][0] * s3 - m[2][1] * s1 + m[2][2] * s0) * inv_det,
                ],
            ],
        })
    }

    /// Determinant of the upper-left 3x3 (linear) block.
    #[must_use]
    pub fn linear_determinant(self) -> f64 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Inverse-transpose of the linear block, the matrix that carries surface
    /// normals through this transform. `None` for singular transforms.
    #[must_use]
    pub fn normal_matrix(self) -> Option<NormalMatrix> {
        let m = &self.m;
        let det = self.linear_determinant();
        if !det.is_finite() || det.abs() < 1e-15 {
            return None;
        }
        let inv_det = 1.0 / det;

        // The inverse-transpose equals the cofactor matrix divided by det.
        let cof = [
            [
                m[1][1] * m[2][2] - m[1][2] * m[2][1],
                m[1][2] * m[2][0] - m[1][0] * m[2][2],
                m[1][0] * m[2][1] - m[1][1] * m[2][0],
            ],
            [
                m[0][2] * m[2][1] - m[0][1] * m[2][2],
                m[0][0] * m[2][2] - m[0][2] * m[2][0],
                m[0][1] * m[2][0] - m[0][0] * m[2][1],
            ],
            [
                m[0][1] * m[1][2] - m[0][2] * m[1][1],
                m[0][2] * m[1][0] - m[0][0] * m[1][2],
                m[0][0] * m[1][1] - m[0][1] * m[1][0],
            ],
        ];

        let mut n = [[0.0; 3]; 3];
        for (row, cof_row) in n.iter_mut().zip(cof.iter()) {
            for (value, c) in row.iter_mut().zip(cof_row.iter()) {
                *value = c * inv_det;
            }
        }
        Some(NormalMatrix { m: n })
    }

    /// Get the translation component of this transform.
    #[must_use]
    pub fn translation(self) -> Vec3 {
        Vec3::new(self.m[0][3], self.m[1][3], self.m[2][3])
    }

    #[must_use]
    pub fn apply_point(self, p: Point3) -> Point3 {
        let x = self.m[0][0] * p.x + self.m[0][1] * p.y + self.m[0][2] * p.z + self.m[0][3];
        let y = self.m[1][0] * p.x + self.m[1][1] * p.y + self.m[1][2] * p.z + self.m[1][3];
        let z = self.m[2][0] * p.x + self.m[2][1] * p.y + self.m[2][2] * p.z + self.m[2][3];
        Point3::new(x, y, z)
    }

    #[must_use]
    pub fn apply_vec(self, v: Vec3) -> Vec3 {
        let x = self.m[0][0] * v.x + self.m[0][1] * v.y + self.m[0][2] * v.z;
        let y = self.m[1][0] * v.x + self.m[1][1] * v.y + self.m[1][2] * v.z;
        let z = self.m[2][0] * v.x + self.m[2][1] * v.y + self.m[2][2] * v.z;
        Vec3::new(x, y, z)
    }

    /// Returns true if every matrix entry is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.m.iter().flatten().all(|v| v.is_finite())
    }

}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for Transform {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(rhs)
    }
}

/// 3x3 matrix produced by [`Transform::normal_matrix`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalMatrix {
    m: [[f64; 3]; 3],
}

impl NormalMatrix {
    /// Transform a normal and re-normalize it.
    #[must_use]
    pub fn apply(self, n: Vec3) -> Option<Vec3> {
        let m = &self.m;
        Vec3::new(
            m[0][0] * n.x + m[0][1] * n.y + m[0][2] * n.z,
            m[1][0] * n.x + m[1][1] * n.y + m[1][2] * n.z,
            m[2][0] * n.x + m[2][1] * n.y + m[2][2] * n.z,
        )
        .normalized()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min: Point3,
    pub max: Point3,
}

impl BBox {
    #[must_use]
    pub const fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn from_points(points: &[Point3]) -> Option<Self> {
        let mut iter = points.iter().copied();
        let first = iter.next()?;
        let mut min = first;
        let mut max = first;
        for p in iter {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }
        Some(Self::new(min, max))
    }

    /// Create a bounding box centered at origin with the given half-extents.
    #[must_use]
    pub fn from_half_extents(half_extents: Vec3) -> Self {
        Self::new(
            Point3::new(-half_extents.x, -half_extents.y, -half_extents.z),
            Point3::new(half_extents.x, half_extents.y, half_extents.z),
        )
    }

    /// Center point of the bounding box.
    #[must_use]
    pub fn center(self) -> Point3 {
        Point3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    /// Size (dimensions) of the bounding box.
    #[must_use]
    pub fn size(self) -> Vec3 {
        Vec3::new(
            self.max.x - self.min.x,
            self.max.y - self.min.y,
            self.max.z - self.min.z,
        )
    }

    /// Largest edge of the box.
    #[must_use]
    pub fn max_dimension(self) -> f64 {
        let s = self.size();
        s.x.max(s.y).max(s.z)
    }

    /// Check if this bounding box intersects (overlaps) with another.
    #[must_use]
    pub fn intersects(self, other: Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self::new(
            Point3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            Point3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        )
    }

    /// Apply a transform to this bounding box.
    /// Note: this computes the axis-aligned bounding box of the transformed corners.
    #[must_use]
    pub fn transform(self, t: Transform) -> Self {
        let corners = [
            Point3::new(self.min.x, self.min.y, self.min.z),
            Point3::new(self.max.x, self.min.y, self.min.z),
            Point3::new(self.min.x, self.max.y, self.min.z),
            Point3::new(self.max.x, self.max.y, self.min.z),
            Point3::new(self.min.x, self.min.y, self.max.z),
            Point3::new(self.max.x, self.min.y, self.max.z),
            Point3::new(self.min.x, self.max.y, self.max.z),
            Point3::new(self.max.x, self.max.y, self.max.z),
        ];
        let transformed: Vec<Point3> = corners.iter().map(|&c| t.apply_point(c)).collect();
        Self::from_points(&transformed).unwrap_or(self)
    }
}

/// Absolute distance tolerance. `DEFAULT` drives hit tests and clipping,
/// `LOOSE` compares values that went through a frame round trip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub eps: f64,
}

impl Tolerance {
    /// Default geometric tolerance (1e-9).
    pub const DEFAULT: Self = Self { eps: 1e-9 };

    /// Loose tolerance for coarse comparisons (1e-6).
    pub const LOOSE: Self = Self { eps: 1e-6 };

    #[must_use]
    pub const fn new(eps: f64) -> Self {
        Self { eps }
    }

    #[must_use]
    pub fn approx_eq_point3(self, a: Point3, b: Point3) -> bool {
        a.distance_to(b) <= self.eps
    }

    #[must_use]
    pub fn approx_eq_vec3(self, a: Vec3, b: Vec3) -> bool {
        (a - b).length() <= self.eps
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}
