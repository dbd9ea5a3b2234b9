mod bvh;
mod core;
mod intersect;
mod mesh;

pub use bvh::Bvh;
pub use core::{BBox, NormalMatrix, Point3, Tolerance, Transform, Vec3};
pub use intersect::{Ray3, RayHit, Triangle3, ray_triangle_intersection};
pub use mesh::GeomMesh;

#[cfg(test)]
mod tests;
