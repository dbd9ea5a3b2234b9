use crate::geom::{Point3, Ray3, Tolerance, Transform, Triangle3, Vec3, ray_triangle_intersection};

fn xy_triangle() -> Triangle3 {
    Triangle3::new(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    )
}

#[test]
fn ray_hits_triangle_from_either_side() {
    let tol = Tolerance::DEFAULT;
    let tri = xy_triangle();

    let down = ray_triangle_intersection(Point3::new(0.25, 0.25, 2.0), Vec3::new(0.0, 0.0, -1.0), tri, tol)
        .expect("front hit");
    assert!((down.t - 2.0).abs() < 1e-12);
    assert!((down.u - 0.25).abs() < 1e-12);
    assert!((down.v - 0.25).abs() < 1e-12);

    let up = ray_triangle_intersection(Point3::new(0.25, 0.25, -1.0), Vec3::Z, tri, tol).expect("back hit");
    assert!((up.t - 1.0).abs() < 1e-12);
}

#[test]
fn ray_misses_outside_behind_and_parallel() {
    let tol = Tolerance::DEFAULT;
    let tri = xy_triangle();

    assert!(ray_triangle_intersection(Point3::new(0.9, 0.9, 1.0), Vec3::new(0.0, 0.0, -1.0), tri, tol).is_none());
    assert!(ray_triangle_intersection(Point3::new(0.25, 0.25, 1.0), Vec3::Z, tri, tol).is_none());
    assert!(ray_triangle_intersection(Point3::new(-1.0, 0.25, 0.0), Vec3::X, tri, tol).is_none());
}

#[test]
fn triangle_normal_follows_winding() {
    let tri = xy_triangle();
    assert_eq!(tri.unit_normal(), Some(Vec3::Z));
    assert!((tri.area() - 0.5).abs() < 1e-12);

    let flipped = Triangle3::new(tri.a, tri.c, tri.b);
    assert_eq!(flipped.unit_normal(), Some(Vec3::new(0.0, 0.0, -1.0)));

    let collapsed = Triangle3::new(tri.a, tri.a, tri.b);
    assert!(collapsed.unit_normal().is_none());
}

#[test]
fn transformed_ray_keeps_world_parameter() {
    let tol = Tolerance::DEFAULT;
    let world = Transform::translate(Vec3::new(5.0, 0.0, 0.0)) * Transform::uniform_scale(2.0);
    let inv = world.inverse().expect("invertible");

    let ray = Ray3::new(Point3::new(5.5, 0.5, 4.0), Vec3::new(0.0, 0.0, -1.0)).expect("ray");
    let local = ray.transformed(inv);
    let hit = ray_triangle_intersection(local.origin, local.direction, xy_triangle(), tol).expect("hit");

    assert!((hit.t - 4.0).abs() < 1e-12);
    assert!(tol.approx_eq_point3(ray.at(hit.t), Point3::new(5.5, 0.5, 0.0)));
}

#[test]
fn zero_direction_is_not_a_ray() {
    assert!(Ray3::new(Point3::ORIGIN, Vec3::ZERO).is_none());
}
