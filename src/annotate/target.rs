//! The surface being annotated.

use std::sync::LazyLock;

use regex::Regex;

use crate::geom::{Bvh, GeomMesh, Transform};

use super::frame::Frame;

static NON_ALPHANUMERIC: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new("[^A-Za-z0-9]"));

/// File name under which zones authored on model `model_name` are stored:
/// every character outside `[A-Za-z0-9]` becomes `_`, the result is
/// lower-cased and wrapped as `zones_<name>.json`.
pub fn zone_document_name(model_name: &str) -> Result<String, regex::Error> {
    let re = NON_ALPHANUMERIC.as_ref().map_err(Clone::clone)?;
    Ok(format!("zones_{}.json", re.replace_all(model_name, "_").to_lowercase()))
}

/// A loaded mesh plus its live world transform.
///
/// The acceleration structure is built once on load; it lives in local space
/// and is unaffected by transform edits.
#[derive(Debug, Clone)]
pub struct TargetMesh {
    name: String,
    mesh: GeomMesh,
    transform: Transform,
    bvh: Option<Bvh>,
    uniform_scale: f64,
}

impl TargetMesh {
    /// Wraps `mesh` and derives the uniform scale that fits its local bounds
    /// into `fit_size`. Degenerate bounds give a scale of 1.
    #[must_use]
    pub fn new(name: impl Into<String>, mesh: GeomMesh, transform: Transform, fit_size: f64) -> Self {
        let uniform_scale = mesh
            .bounds()
            .map(|b| b.max_dimension())
            .filter(|d| d.is_finite() && *d > 0.0)
            .map_or(1.0, |d| fit_size / d);
        Self::with_uniform_scale(name, mesh, transform, uniform_scale)
    }

    #[must_use]
    pub fn with_uniform_scale(
        name: impl Into<String>,
        mesh: GeomMesh,
        transform: Transform,
        uniform_scale: f64,
    ) -> Self {
        let bvh = Bvh::from_mesh(&mesh);
        Self {
            name: name.into(),
            mesh,
            transform,
            bvh,
            uniform_scale,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn mesh(&self) -> &GeomMesh {
        &self.mesh
    }

    #[must_use]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    #[must_use]
    pub fn bvh(&self) -> Option<&Bvh> {
        self.bvh.as_ref()
    }

    #[must_use]
    pub fn uniform_scale(&self) -> f64 {
        self.uniform_scale
    }

    /// True when the mesh has at least one triangle and a well-formed index buffer.
    #[must_use]
    pub fn is_triangulated(&self) -> bool {
        !self.mesh.is_empty() && self.mesh.validate().is_ok()
    }

    #[must_use]
    pub fn document_name(&self) -> Result<String, regex::Error> {
        zone_document_name(&self.name)
    }
}

impl Frame for TargetMesh {
    fn world_transform(&self) -> Transform {
        self.transform
    }
}
