use super::intersect::Triangle3;
use super::{BBox, Point3, Tolerance, Vec3};

/// Indexed triangle list with optional per-vertex attributes.
///
/// Used both for target surfaces supplied by the renderer and for geometry the
/// engine produces (decals, quads).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeomMesh {
    pub positions: Vec<[f64; 3]>,
    pub indices: Vec<u32>,
    pub uvs: Option<Vec<[f64; 2]>>,
    pub normals: Option<Vec<[f64; 3]>>,
}

impl GeomMesh {
    /// Create a new mesh with positions and indices only.
    #[must_use]
    pub fn new(positions: Vec<[f64; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            uvs: None,
            normals: None,
        }
    }

    /// Create a new mesh with positions, indices, UVs, and normals.
    #[must_use]
    pub fn with_attributes(
        positions: Vec<[f64; 3]>,
        indices: Vec<u32>,
        uvs: Option<Vec<[f64; 2]>>,
        normals: Option<Vec<[f64; 3]>>,
    ) -> Self {
        Self {
            positions,
            indices,
            uvs,
            normals,
        }
    }

    /// Build a mesh from packed buffers as handed over by JS:
    /// `[x0, y0, z0, x1, ...]` and an optional index buffer. Non-indexed input
    /// is treated as a triangle soup.
    #[must_use]
    pub fn from_flat(positions: &[f64], indices: Option<&[u32]>, normals: Option<&[f64]>) -> Self {
        let positions: Vec<[f64; 3]> = positions
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        let indices = match indices {
            Some(indices) => indices.to_vec(),
            None => (0..positions.len() as u32).collect(),
        };
        let normals = normals
            .map(|n| n.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect::<Vec<_>>())
            .filter(|n: &Vec<[f64; 3]>| n.len() == positions.len());
        Self::with_attributes(positions, indices, None, normals)
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Structural check: a triangle list with finite positions, in-range
    /// indices and attribute buffers matching the vertex count.
    pub fn validate(&self) -> Result<(), String> {
        if self.indices.len() % 3 != 0 {
            return Err("mesh indices are not a triangle list (len % 3 != 0)".to_string());
        }
        if self.positions.iter().flatten().any(|v| !v.is_finite()) {
            return Err("mesh has invalid vertex coordinates (NaN/Inf)".to_string());
        }
        let n = self.positions.len();
        if self.indices.iter().any(|&i| i as usize >= n) {
            return Err("mesh has out-of-bounds vertex indices".to_string());
        }
        let uvs_ok = self.uvs.as_ref().is_none_or(|uvs| uvs.len() == n);
        let normals_ok = self.normals.as_ref().is_none_or(|normals| normals.len() == n);
        if !uvs_ok || !normals_ok {
            return Err("mesh attribute buffers do not match vertex count".to_string());
        }
        Ok(())
    }

    /// Triangle `index` as three points. `None` when out of range or when the
    /// index buffer references a missing vertex.
    #[must_use]
    pub fn triangle(&self, index: usize) -> Option<Triangle3> {
        let tri = self.indices.get(index * 3..index * 3 + 3)?;
        let a = self.positions.get(tri[0] as usize).copied()?;
        let b = self.positions.get(tri[1] as usize).copied()?;
        let c = self.positions.get(tri[2] as usize).copied()?;
        Some(Triangle3::new(a.into(), b.into(), c.into()))
    }

    /// Vertex indices of triangle `index`.
    #[must_use]
    pub fn triangle_indices(&self, index: usize) -> Option<[usize; 3]> {
        let tri = self.indices.get(index * 3..index * 3 + 3)?;
        Some([tri[0] as usize, tri[1] as usize, tri[2] as usize])
    }

    /// Stored normal for vertex `index`, if the mesh carries normals.
    #[must_use]
    pub fn vertex_normal(&self, index: usize) -> Option<Vec3> {
        self.normals
            .as_ref()
            .and_then(|normals| normals.get(index))
            .map(|n| Vec3::from(*n))
    }

    /// Axis-aligned bounds of all vertices.
    #[must_use]
    pub fn bounds(&self) -> Option<BBox> {
        let points: Vec<Point3> = self.positions.iter().copied().map(Point3::from).collect();
        BBox::from_points(&points)
    }

    /// Per-triangle bounds, skipping nothing: a broken triangle gets an empty box
    /// at the origin so indices stay aligned with triangle numbers.
    #[must_use]
    pub fn triangle_bounds(&self) -> Vec<BBox> {
        (0..self.triangle_count())
            .map(|i| {
                self.triangle(i)
                    .and_then(|t| BBox::from_points(&[t.a, t.b, t.c]))
                    .unwrap_or(BBox::new(Point3::ORIGIN, Point3::ORIGIN))
            })
            .collect()
    }

    /// Sum of triangle areas.
    #[must_use]
    pub fn surface_area(&self) -> f64 {
        (0..self.triangle_count())
            .filter_map(|i| self.triangle(i))
            .map(Triangle3::area)
            .sum()
    }

    /// Drops triangles whose area is below `tol`. Returns the number removed.
    pub fn remove_degenerate_triangles(&mut self, tol: Tolerance) -> usize {
        let mut kept = Vec::with_capacity(self.indices.len());
        let mut removed = 0;
        for i in 0..self.triangle_count() {
            match (self.triangle(i), self.triangle_indices(i)) {
                (Some(tri), Some([a, b, c])) if tri.area() > tol.eps => {
                    kept.extend_from_slice(&[a as u32, b as u32, c as u32]);
                }
                _ => removed += 1,
            }
        }
        self.indices = kept;
        removed
    }

    /// Returns the position buffer as a flat slice: `[x0, y0, z0, x1, y1, z1, ...]`.
    ///
    /// This is a zero-copy view over `positions`, useful for wasm/JS adapters that
    /// expect packed numeric buffers.
    #[must_use]
    pub fn positions_flat(&self) -> &[f64] {
        flatten_f64_array_slice::<3>(&self.positions)
    }

    /// Returns the UV buffer as a flat slice: `[u0, v0, u1, v1, ...]`.
    #[must_use]
    pub fn uvs_flat(&self) -> Option<&[f64]> {
        self.uvs.as_deref().map(flatten_f64_array_slice::<2>)
    }

    /// Returns the normal buffer as a flat slice: `[nx0, ny0, nz0, nx1, ny1, nz1, ...]`.
    #[must_use]
    pub fn normals_flat(&self) -> Option<&[f64]> {
        self.normals.as_deref().map(flatten_f64_array_slice::<3>)
    }

    /// Rough size of the owned buffers in bytes.
    #[must_use]
    pub fn estimated_memory_bytes(&self) -> usize {
        self.positions.len() * std::mem::size_of::<[f64; 3]>()
            + self.indices.len() * std::mem::size_of::<u32>()
            + self.uvs.as_ref().map_or(0, |u| u.len() * std::mem::size_of::<[f64; 2]>())
            + self
                .normals
                .as_ref()
                .map_or(0, |n| n.len() * std::mem::size_of::<[f64; 3]>())
    }
}

fn flatten_f64_array_slice<const N: usize>(data: &[[f64; N]]) -> &[f64] {
    let count = data.len().checked_mul(N).unwrap_or(0);
    let ptr = data.as_ptr().cast::<f64>();
    // SAFETY: `[[f64; N]]` is stored contiguously, and we compute the element count as `len * N`.
    unsafe { std::slice::from_raw_parts(ptr, count) }
}
