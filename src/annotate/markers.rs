//! Stickers placed by the user.

use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::geom::Point3;

use super::decal::{DecalGeometry, DecalProjector, DecalRequest};
use super::error::{AnnotateError, AnnotateResult};
use super::frame::{self, Frame};
use super::picker::{ObjectRef, PickCandidate, PickHit};
use super::scene::{MaterialKind, RenderHandle, SceneNode, SceneSink};
use super::target::TargetMesh;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MarkerId(pub u32);

#[derive(Debug, Clone)]
pub struct Marker {
    pub id: MarkerId,
    pub symbol: char,
    pub world_position: Point3,
    /// Target-local position captured at placement; later transform edits do
    /// not move it.
    pub local_position: Point3,
    geometry: Arc<DecalGeometry>,
    render: RenderHandle,
}

impl Marker {
    #[must_use]
    pub fn geometry(&self) -> &Arc<DecalGeometry> {
        &self.geometry
    }

    #[must_use]
    pub fn render_handle(&self) -> RenderHandle {
        self.render
    }

    #[must_use]
    pub fn record(&self) -> MarkerRecord {
        MarkerRecord {
            symbol: self.symbol,
            position: self.local_position,
        }
    }
}

/// Marker reduced to what grading needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRecord {
    #[serde(alias = "char")]
    pub symbol: char,
    /// Target-local position.
    pub position: Point3,
}

#[derive(Debug, Default)]
pub struct MarkerStore {
    markers: Vec<Marker>,
    next_id: u32,
}

impl MarkerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Markers in placement order.
    #[must_use]
    pub fn all(&self) -> &[Marker] {
        &self.markers
    }

    #[must_use]
    pub fn get(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.iter().find(|m| m.id == id)
    }

    /// Places a sticker at `hit`. The hit must be on the target itself.
    pub fn place<S: SceneSink + ?Sized>(
        &mut self,
        target: Option<&TargetMesh>,
        hit: &PickHit,
        symbol: char,
        projector: &DecalProjector,
        config: &EngineConfig,
        sink: &mut S,
    ) -> AnnotateResult<MarkerId> {
        let target = target.ok_or(AnnotateError::NoTarget)?;
        if let ObjectRef::Marker(other) = hit.object {
            warn!("refusing to stack a sticker on marker {}", other.0);
            return Err(AnnotateError::MarkerStacking);
        }

        let local_position = frame::to_local(target, hit.point)?;
        let size = config.sticker_extent(target.uniform_scale());
        let request = DecalRequest::square(hit.point, hit.face_normal, size, config.depth_fraction);
        let (geometry, _) = projector.project(target, &request);
        let geometry = Arc::new(geometry);
        let render = sink.attach(SceneNode {
            geometry: Arc::clone(&geometry),
            material: MaterialKind::Sticker { symbol },
        });

        let id = MarkerId(self.next_id);
        self.next_id += 1;
        self.markers.push(Marker {
            id,
            symbol,
            world_position: hit.point,
            local_position,
            geometry,
            render,
        });
        info!("sticker '{symbol}' placed as marker {} at local {local_position:?}", id.0);
        Ok(id)
    }

    /// Removes marker `id` and detaches its render node.
    pub fn erase<S: SceneSink + ?Sized>(&mut self, id: MarkerId, sink: &mut S) -> AnnotateResult<Marker> {
        let index = self
            .markers
            .iter()
            .position(|m| m.id == id)
            .ok_or(AnnotateError::UnknownMarker(id))?;
        let marker = self.markers.remove(index);
        sink.detach(marker.render);
        info!("marker {} erased", id.0);
        Ok(marker)
    }

    /// Erases everything. Returns how many markers were removed.
    pub fn clear<S: SceneSink + ?Sized>(&mut self, sink: &mut S) -> usize {
        let count = self.markers.len();
        for marker in self.markers.drain(..) {
            sink.detach(marker.render);
        }
        count
    }

    /// Marker decals as pick candidates; they live in `target`'s local space.
    #[must_use]
    pub fn pick_candidates<'a>(&'a self, target: &TargetMesh) -> Vec<PickCandidate<'a>> {
        let world = target.world_transform();
        self.markers
            .iter()
            .map(|m| PickCandidate {
                object: ObjectRef::Marker(m.id),
                mesh: &m.geometry.mesh,
                world,
                bvh: None,
            })
            .collect()
    }

    #[must_use]
    pub fn records(&self) -> Vec<MarkerRecord> {
        self.markers.iter().map(Marker::record).collect()
    }
}
