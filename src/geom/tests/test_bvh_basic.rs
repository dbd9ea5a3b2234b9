use crate::geom::{BBox, Bvh, GeomMesh, Point3, Tolerance, Vec3, ray_triangle_intersection};

fn unit_box(x: f64) -> BBox {
    BBox::new(Point3::new(x, 0.0, 0.0), Point3::new(x + 1.0, 1.0, 1.0))
}

/// A strip of `n` unit quads along +X in the z = 0 plane.
fn quad_strip(n: usize) -> GeomMesh {
    let mut positions = Vec::new();
    let mut indices = Vec::new();
    for i in 0..n {
        let x = i as f64;
        let base = positions.len() as u32;
        positions.extend_from_slice(&[[x, 0.0, 0.0], [x + 1.0, 0.0, 0.0], [x + 1.0, 1.0, 0.0], [x, 1.0, 0.0]]);
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    GeomMesh::new(positions, indices)
}

#[test]
fn bvh_overlapping_returns_sorted_matches() {
    let bounds: Vec<BBox> = [9.0, 0.0, 4.0, 2.0, 20.0].into_iter().map(unit_box).collect();
    let bvh = Bvh::build_with_leaf_size(&bounds, 1).expect("bvh build");

    let query = BBox::new(Point3::new(1.5, 0.2, 0.2), Point3::new(4.5, 0.8, 0.8));
    assert_eq!(bvh.overlapping(query), vec![2, 3]);

    let far = BBox::new(Point3::new(-5.0, -5.0, -5.0), Point3::new(-4.0, -4.0, -4.0));
    assert!(bvh.overlapping(far).is_empty());
}

#[test]
fn bvh_empty_input_builds_nothing() {
    assert!(Bvh::build_with_leaf_size(&[], 4).is_none());
    assert!(Bvh::from_mesh(&GeomMesh::default()).is_none());
}

#[test]
fn bvh_closest_hit_prefers_nearest_box() {
    let bounds: Vec<BBox> = [10.0, 1.0, -5.0, 4.0].into_iter().map(unit_box).collect();
    let bvh = Bvh::build_with_leaf_size(&bounds, 1).expect("bvh build");

    let origin = Point3::new(-2.0, 0.5, 0.5);
    let dir = Vec3::X;
    // Entry parameter of each box along +X.
    let hit = bvh.closest_hit(origin, dir, f64::INFINITY, |prim| {
        let b = bounds[prim];
        let t = b.min.x - origin.x;
        (t >= 0.0).then_some(t)
    });

    assert_eq!(hit, Some((1, 3.0)));
}

#[test]
fn bvh_closest_hit_respects_t_max() {
    let bounds = vec![unit_box(10.0)];
    let bvh = Bvh::build_with_leaf_size(&bounds, 1).expect("bvh build");
    let hit = bvh.closest_hit(Point3::new(0.0, 0.5, 0.5), Vec3::X, 5.0, |_| Some(10.0));
    assert!(hit.is_none());
}

#[test]
fn bvh_over_mesh_matches_brute_force() {
    let mesh = quad_strip(16);
    let bvh = Bvh::from_mesh(&mesh).expect("bvh build");
    assert_eq!(bvh.primitive_count(), mesh.triangle_count());

    let tol = Tolerance::DEFAULT;
    let origin = Point3::new(7.25, 0.75, 3.0);
    let dir = Vec3::new(0.0, 0.0, -1.0);

    let via_bvh = bvh.closest_hit(origin, dir, f64::INFINITY, |i| {
        mesh.triangle(i)
            .and_then(|tri| ray_triangle_intersection(origin, dir, tri, tol))
            .map(|hit| hit.t)
    });

    let brute = (0..mesh.triangle_count())
        .filter_map(|i| {
            let tri = mesh.triangle(i)?;
            ray_triangle_intersection(origin, dir, tri, tol).map(|hit| (i, hit.t))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    assert_eq!(via_bvh, brute);
    let (tri, t) = via_bvh.expect("hit");
    assert_eq!(tri, 15);
    assert!((t - 3.0).abs() < 1e-12);
}
