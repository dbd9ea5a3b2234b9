//! Triangle bounding-volume hierarchy for surface picking and decal gathering.

use super::{BBox, GeomMesh, Point3, Vec3};

#[derive(Debug, Clone, Copy)]
struct BvhNode {
    bbox: BBox,
    /// Inner nodes: index of the first child (the second follows the first
    /// child's subtree, stored in `second`). Leaves: offset into `order`.
    first: u32,
    second: u32,
    /// Zero for inner nodes.
    len: u32,
}

impl BvhNode {
    const fn is_leaf(self) -> bool {
        self.len != 0
    }
}

/// Flat BVH over triangle bounds. Primitive indices are triangle numbers of
/// the mesh it was built from.
#[derive(Debug, Clone)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    order: Vec<u32>,
}

impl Bvh {
    const LEAF_SIZE: usize = 4;

    /// Builds a hierarchy over the triangles of `mesh`. `None` for meshes
    /// without triangles.
    #[must_use]
    pub fn from_mesh(mesh: &GeomMesh) -> Option<Self> {
        Self::build_with_leaf_size(&mesh.triangle_bounds(), Self::LEAF_SIZE)
    }

    #[must_use]
    pub fn build_with_leaf_size(bounds: &[BBox], leaf_size: usize) -> Option<Self> {
        if bounds.is_empty() {
            return None;
        }
        let mut bvh = Self {
            nodes: Vec::with_capacity(bounds.len() * 2),
            order: (0..bounds.len() as u32).collect(),
        };
        bvh.split(bounds, 0, bounds.len(), leaf_size.clamp(1, 64));
        Some(bvh)
    }

    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.order.len()
    }

    fn split(&mut self, bounds: &[BBox], start: usize, end: usize, leaf_size: usize) -> u32 {
        let mut bbox = bounds[self.order[start] as usize];
        for &prim in &self.order[start + 1..end] {
            bbox = bbox.union(bounds[prim as usize]);
        }

        let index = self.nodes.len() as u32;
        let len = end - start;
        if len <= leaf_size {
            self.nodes.push(BvhNode {
                bbox,
                first: start as u32,
                second: 0,
                len: len as u32,
            });
            return index;
        }

        // Median split along the longest extent of the centroids.
        let axis = widest_axis(self.order[start..end].iter().map(|&p| bounds[p as usize].center()));
        let mid = start + len / 2;
        self.order[start..end].select_nth_unstable_by(mid - start, |a, b| {
            axis_value(bounds[*a as usize].center(), axis)
                .total_cmp(&axis_value(bounds[*b as usize].center(), axis))
        });

        self.nodes.push(BvhNode {
            bbox,
            first: 0,
            second: 0,
            len: 0,
        });
        let first = self.split(bounds, start, mid, leaf_size);
        let second = self.split(bounds, mid, end, leaf_size);
        self.nodes[index as usize].first = first;
        self.nodes[index as usize].second = second;
        index
    }

    /// Triangle numbers whose bounds overlap `query`, in ascending order.
    #[must_use]
    pub fn overlapping(&self, query: BBox) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![0u32];
        while let Some(idx) = stack.pop() {
            let node = self.nodes[idx as usize];
            if !node.bbox.intersects(query) {
                continue;
            }
            if node.is_leaf() {
                let start = node.first as usize;
                out.extend(
                    self.order[start..start + node.len as usize]
                        .iter()
                        .map(|&p| p as usize),
                );
            } else {
                stack.push(node.first);
                stack.push(node.second);
            }
        }
        out.sort_unstable();
        out
    }

    /// Closest primitive along a ray. `hit` returns the ray parameter of an
    /// actual intersection with primitive `i`; subtrees that start beyond the
    /// best hit so far are skipped. Ties keep the lower triangle number.
    pub fn closest_hit<F>(&self, origin: Point3, dir: Vec3, t_max: f64, mut hit: F) -> Option<(usize, f64)>
    where
        F: FnMut(usize) -> Option<f64>,
    {
        let mut best: Option<(usize, f64)> = None;
        let mut limit = t_max;
        let mut stack = vec![0u32];

        while let Some(idx) = stack.pop() {
            let node = self.nodes[idx as usize];
            let Some(entry) = ray_box_entry(origin, dir, node.bbox, limit) else {
                continue;
            };
            if entry > limit {
                continue;
            }

            if node.is_leaf() {
                let start = node.first as usize;
                for &prim in &self.order[start..start + node.len as usize] {
                    let prim = prim as usize;
                    let Some(t) = hit(prim) else { continue };
                    let better = match best {
                        None => t <= limit,
                        Some((best_prim, best_t)) => t < best_t || (t == best_t && prim < best_prim),
                    };
                    if better {
                        best = Some((prim, t));
                        limit = t;
                    }
                }
                continue;
            }

            // Push the farther child first so the nearer one is expanded next.
            let a = self.nodes[node.first as usize];
            let b = self.nodes[node.second as usize];
            let ta = ray_box_entry(origin, dir, a.bbox, limit).unwrap_or(f64::INFINITY);
            let tb = ray_box_entry(origin, dir, b.bbox, limit).unwrap_or(f64::INFINITY);
            if ta <= tb {
                stack.push(node.second);
                stack.push(node.first);
            } else {
                stack.push(node.first);
                stack.push(node.second);
            }
        }

        best
    }
}

fn widest_axis(centers: impl Iterator<Item = Point3>) -> u8 {
    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    for c in centers {
        for (axis, value) in c.to_array().into_iter().enumerate() {
            lo[axis] = lo[axis].min(value);
            hi[axis] = hi[axis].max(value);
        }
    }
    let extent = [hi[0] - lo[0], hi[1] - lo[1], hi[2] - lo[2]];
    if extent[0] >= extent[1] && extent[0] >= extent[2] {
        0
    } else if extent[1] >= extent[2] {
        1
    } else {
        2
    }
}

fn axis_value(p: Point3, axis: u8) -> f64 {
    match axis {
        0 => p.x,
        1 => p.y,
        _ => p.z,
    }
}

/// Slab test. Returns the parameter at which the ray enters the box (0 when
/// the origin is inside), or `None` when the box is missed within `[0, t_max]`.
fn ray_box_entry(origin: Point3, dir: Vec3, bbox: BBox, t_max: f64) -> Option<f64> {
    let mut t0 = 0.0_f64;
    let mut t1 = t_max;
    let o = origin.to_array();
    let d = dir.to_array();
    let lo = bbox.min.to_array();
    let hi = bbox.max.to_array();

    for axis in 0..3 {
        if !o[axis].is_finite() || !d[axis].is_finite() {
            return None;
        }
        if d[axis].abs() <= 1e-15 {
            if o[axis] < lo[axis] || o[axis] > hi[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d[axis];
        let mut near = (lo[axis] - o[axis]) * inv;
        let mut far = (hi[axis] - o[axis]) * inv;
        if near > far {
            std::mem::swap(&mut near, &mut far);
        }
        t0 = t0.max(near);
        t1 = t1.min(far);
        if t1 < t0 {
            return None;
        }
    }

    Some(t0)
}
