//! Pointer-to-ray conversion.

use serde::{Deserialize, Serialize};

use crate::geom::{Point3, Ray3, Transform, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Projection {
    #[serde(rename_all = "camelCase")]
    Perspective { fov_y_degrees: f64, aspect: f64 },
    /// `height` is the visible extent along the camera's Y axis.
    #[serde(rename_all = "camelCase")]
    Orthographic { height: f64, aspect: f64 },
}

/// A camera looking down its local -Z axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub world: Transform,
    pub projection: Projection,
}

impl Camera {
    #[must_use]
    pub const fn new(world: Transform, projection: Projection) -> Self {
        Self { world, projection }
    }

    #[must_use]
    pub fn perspective_looking_at(eye: Point3, target: Point3, up: Vec3, fov_y_degrees: f64, aspect: f64) -> Option<Self> {
        let world = Transform::look_at(eye, target, up)?;
        Some(Self::new(world, Projection::Perspective { fov_y_degrees, aspect }))
    }

    /// World-space ray through normalized device coordinates `(x, y)` in
    /// `[-1, 1]`, +Y up.
    #[must_use]
    pub fn ray_through(&self, ndc_x: f64, ndc_y: f64) -> Option<Ray3> {
        match self.projection {
            Projection::Perspective { fov_y_degrees, aspect } => {
                let half = (fov_y_degrees.to_radians() * 0.5).tan();
                let local_dir = Vec3::new(ndc_x * half * aspect, ndc_y * half, -1.0);
                Ray3::new(self.world.apply_point(Point3::ORIGIN), self.world.apply_vec(local_dir))
            }
            Projection::Orthographic { height, aspect } => {
                let half_h = height * 0.5;
                let local_origin = Point3::new(ndc_x * half_h * aspect, ndc_y * half_h, 0.0);
                Ray3::new(
                    self.world.apply_point(local_origin),
                    self.world.apply_vec(Vec3::new(0.0, 0.0, -1.0)),
                )
            }
        }
    }
}

/// The canvas rectangle pointer coordinates are measured in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    #[must_use]
    pub const fn sized(width: f64, height: f64) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width,
            height,
        }
    }

    /// Pixel position to normalized device coordinates. `None` for an empty
    /// viewport.
    #[must_use]
    pub fn to_ndc(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !(self.width > 0.0 && self.height > 0.0) {
            return None;
        }
        let ndc_x = (x - self.left) / self.width * 2.0 - 1.0;
        let ndc_y = -((y - self.top) / self.height) * 2.0 + 1.0;
        Some((ndc_x, ndc_y))
    }
}
