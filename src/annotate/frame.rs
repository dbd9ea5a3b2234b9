//! World/local conversions against a target's current transform.
//!
//! Nothing here caches: every call re-derives the inverse or normal matrix
//! from the transform as it is right now, so edits to the target transform
//! are picked up by the next conversion.

use crate::geom::{Point3, Transform, Vec3};

use super::error::{AnnotateError, AnnotateResult};

/// Anything with a local-to-world transform.
pub trait Frame {
    fn world_transform(&self) -> Transform;
}

impl Frame for Transform {
    fn world_transform(&self) -> Transform {
        *self
    }
}

pub fn to_local(frame: &impl Frame, world: Point3) -> AnnotateResult<Point3> {
    let inverse = frame.world_transform().inverse().ok_or(AnnotateError::SingularTransform)?;
    Ok(inverse.apply_point(world))
}

#[must_use]
pub fn to_world(frame: &impl Frame, local: Point3) -> Point3 {
    frame.world_transform().apply_point(local)
}

/// World normal to local space: the normal matrix of the inverse transform.
pub fn to_local_normal(frame: &impl Frame, world: Vec3) -> AnnotateResult<Vec3> {
    let inverse = frame.world_transform().inverse().ok_or(AnnotateError::SingularTransform)?;
    let normal_matrix = inverse.normal_matrix().ok_or(AnnotateError::SingularTransform)?;
    normal_matrix.apply(world).ok_or(AnnotateError::DegenerateNormal)
}

pub fn to_world_normal(frame: &impl Frame, local: Vec3) -> AnnotateResult<Vec3> {
    let normal_matrix = frame
        .world_transform()
        .normal_matrix()
        .ok_or(AnnotateError::SingularTransform)?;
    normal_matrix.apply(local).ok_or(AnnotateError::DegenerateNormal)
}
