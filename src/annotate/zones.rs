//! Authored zones: where a sticker is expected and which symbol it must carry.
//!
//! Zones are stored in target-local space. Their decal geometry is projected
//! lazily the first time a zone is shown and kept until the zone is dropped
//! or the target is swapped; it is never rebuilt in place.

use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::EngineConfig;
use crate::geom::{Point3, Ray3, Vec3};

use super::decal::{DecalDiagnostics, DecalGeometry, DecalKind, DecalProjector, DecalRequest, FallbackReason};
use super::error::{AnnotateError, AnnotateResult};
use super::frame::{self, Frame};
use super::picker::{self, ObjectRef, PickCandidate};
use super::scene::{MaterialKind, RenderHandle, SceneNode, SceneSink};
use super::target::TargetMesh;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ZoneId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZoneStatus {
    #[default]
    Unset,
    Missing,
    Correct,
    WrongSymbol,
}

#[derive(Debug, Clone)]
pub struct Zone {
    pub id: ZoneId,
    pub local_position: Point3,
    /// Unit length.
    pub local_normal: Vec3,
    pub expected_symbol: char,
    pub last_status: ZoneStatus,
    geometry: Option<Arc<DecalGeometry>>,
    render: Option<RenderHandle>,
}

impl Zone {
    /// World anchor and unit normal under the target's current transform.
    pub fn world_pose(&self, frame: &impl Frame) -> AnnotateResult<(Point3, Vec3)> {
        let position = frame::to_world(frame, self.local_position);
        let normal = frame::to_world_normal(frame, self.local_normal)?;
        Ok((position, normal))
    }

    #[must_use]
    pub fn geometry(&self) -> Option<&Arc<DecalGeometry>> {
        self.geometry.as_ref()
    }

    /// True once geometry exists and came from a projection rather than the
    /// flat fallback.
    #[must_use]
    pub fn is_decal_backed(&self) -> bool {
        self.geometry
            .as_ref()
            .is_some_and(|g| g.kind == DecalKind::Projected)
    }

    #[must_use]
    pub fn render_handle(&self) -> Option<RenderHandle> {
        self.render
    }

    fn record(&self) -> ZoneRecord {
        ZoneRecord {
            position: self.local_position,
            normal: self.local_normal,
            expected_symbol: self.expected_symbol,
        }
    }
}

/// Persisted form of a single zone, in target-local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRecord {
    pub position: Point3,
    pub normal: Vec3,
    #[serde(alias = "expectedChar")]
    pub expected_symbol: char,
}

impl ZoneRecord {
    /// Checked copy with a unit normal. `index` only labels the error.
    pub fn normalized(self, index: usize) -> AnnotateResult<Self> {
        if !self.position.is_finite() {
            return Err(AnnotateError::MalformedPersistedData(format!(
                "zone {index}: position is not finite"
            )));
        }
        let normal = self
            .normal
            .normalized()
            .filter(|n| n.is_finite())
            .ok_or_else(|| AnnotateError::MalformedPersistedData(format!("zone {index}: normal has zero length")))?;
        Ok(Self { normal, ..self })
    }
}

/// Zone file as exchanged with the outside world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDocument {
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub timestamp: String,
    pub zones: Vec<ZoneRecord>,
}

impl ZoneDocument {
    pub fn new(model_name: impl Into<String>, stamp: OffsetDateTime, zones: Vec<ZoneRecord>) -> AnnotateResult<Self> {
        let timestamp = stamp
            .format(&Rfc3339)
            .map_err(|err| AnnotateError::Serialization(err.to_string()))?;
        Ok(Self {
            model_name: model_name.into(),
            timestamp,
            zones,
        })
    }

    /// Parses and checks a zone file. Normals are normalized; non-finite
    /// coordinates and zero normals are rejected.
    pub fn from_json(text: &str) -> AnnotateResult<Self> {
        let mut doc: Self =
            serde_json::from_str(text).map_err(|err| AnnotateError::MalformedPersistedData(err.to_string()))?;
        doc.zones = normalize_records(&doc.zones)?;
        Ok(doc)
    }

    pub fn to_json(&self) -> AnnotateResult<String> {
        serde_json::to_string_pretty(self).map_err(|err| AnnotateError::Serialization(err.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecalCacheStats {
    /// Zones currently holding geometry.
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
    /// Geometries dropped through clear, replace or a target swap.
    pub released: usize,
    pub estimated_memory_bytes: usize,
}

#[derive(Debug, Default)]
pub struct ZoneStore {
    zones: Vec<Zone>,
    next_id: u32,
    hits: usize,
    misses: usize,
    released: usize,
}

impl ZoneStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    #[must_use]
    pub fn get(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub(crate) fn zones_mut(&mut self) -> &mut [Zone] {
        &mut self.zones
    }

    fn push(&mut self, local_position: Point3, local_normal: Vec3, expected_symbol: char) -> ZoneId {
        let id = ZoneId(self.next_id);
        self.next_id += 1;
        self.zones.push(Zone {
            id,
            local_position,
            local_normal,
            expected_symbol,
            last_status: ZoneStatus::Unset,
            geometry: None,
            render: None,
        });
        id
    }

    /// Records a zone from a world-space hit on `frame`.
    pub fn add(
        &mut self,
        frame: &impl Frame,
        world_point: Point3,
        world_normal: Vec3,
        symbol: char,
    ) -> AnnotateResult<ZoneId> {
        let local_position = frame::to_local(frame, world_point)?;
        let local_normal = frame::to_local_normal(frame, world_normal)?;
        let id = self.push(local_position, local_normal, symbol);
        info!("zone {} added for '{symbol}' at {local_position:?}", id.0);
        Ok(id)
    }

    /// Drops every zone, detaching render nodes before the geometry goes.
    pub fn clear<S: SceneSink + ?Sized>(&mut self, sink: &mut S) {
        self.detach_all(sink);
        self.released += self.zones.iter().filter(|z| z.geometry.is_some()).count();
        self.zones.clear();
    }

    #[must_use]
    pub fn serialize(&self) -> Vec<ZoneRecord> {
        self.zones.iter().map(Zone::record).collect()
    }

    /// Detaches every zone and drops its cached geometry but keeps the
    /// records. Used when the target they were projected onto goes away.
    pub fn release_geometry<S: SceneSink + ?Sized>(&mut self, sink: &mut S) -> usize {
        self.detach_all(sink);
        let mut released = 0;
        for zone in &mut self.zones {
            if zone.geometry.take().is_some() {
                released += 1;
            }
            zone.last_status = ZoneStatus::Unset;
        }
        self.released += released;
        released
    }

    /// Replaces the whole store. Ids are fresh; statuses start unset.
    /// Normals are normalized; a bad record rejects the whole list and
    /// leaves the store untouched.
    pub fn replace_all<S: SceneSink + ?Sized>(&mut self, records: &[ZoneRecord], sink: &mut S) -> AnnotateResult<()> {
        let records = normalize_records(records)?;
        self.clear(sink);
        for record in records {
            self.push(record.position, record.normal, record.expected_symbol);
        }
        Ok(())
    }

    /// Parses `text` and replaces the store with its zones. On error the
    /// store is left untouched.
    pub fn deserialize<S: SceneSink + ?Sized>(&mut self, text: &str, sink: &mut S) -> AnnotateResult<usize> {
        let doc = ZoneDocument::from_json(text)?;
        self.replace_all(&doc.zones, sink)?;
        info!("imported {} zones (model '{}')", doc.zones.len(), doc.model_name);
        Ok(doc.zones.len())
    }

    /// Geometry for zone `id`, projected on first use. Projection problems,
    /// a singular target transform included, end in a flat quad; only an
    /// unknown id yields `None`.
    pub fn geometry_for(
        &mut self,
        id: ZoneId,
        target: &TargetMesh,
        projector: &DecalProjector,
        config: &EngineConfig,
    ) -> Option<Arc<DecalGeometry>> {
        let index = self.zones.iter().position(|z| z.id == id)?;
        if let Some(geometry) = &self.zones[index].geometry {
            self.hits += 1;
            return Some(Arc::clone(geometry));
        }

        self.misses += 1;
        let zone = &self.zones[index];
        let size = config.zone_extent(target.uniform_scale());
        let (geometry, diag) = match zone.world_pose(target) {
            Ok((anchor, normal)) => {
                let request = DecalRequest::square(anchor, normal, size, config.depth_fraction);
                if surface_below(target, anchor, normal, projector) {
                    projector.project(target, &request)
                } else {
                    projector.fallback_quad(target, &request, DecalDiagnostics::default(), FallbackReason::NoSurface)
                }
            }
            Err(err) => {
                debug!("zone {} has no world pose: {err}", id.0);
                projector.local_fallback(
                    zone.local_position,
                    zone.local_normal,
                    size / target.uniform_scale(),
                    FallbackReason::SingularTransform,
                )
            }
        };
        debug!("zone {} geometry: {:?}", id.0, diag);

        let geometry = Arc::new(geometry);
        self.zones[index].geometry = Some(Arc::clone(&geometry));
        Some(geometry)
    }

    /// Attaches one render node per zone, replacing any nodes already shown.
    pub fn attach_all<S, F>(
        &mut self,
        sink: &mut S,
        target: &TargetMesh,
        projector: &DecalProjector,
        config: &EngineConfig,
        material_for: F,
    ) where
        S: SceneSink + ?Sized,
        F: Fn(&Zone) -> MaterialKind,
    {
        self.detach_all(sink);
        let ids: Vec<ZoneId> = self.zones.iter().map(|z| z.id).collect();
        for id in ids {
            let Some(geometry) = self.geometry_for(id, target, projector, config) else {
                continue;
            };
            let Some(zone) = self.zones.iter_mut().find(|z| z.id == id) else {
                continue;
            };
            let material = material_for(zone);
            zone.render = Some(sink.attach(SceneNode { geometry, material }));
        }
    }

    pub fn detach_all<S: SceneSink + ?Sized>(&mut self, sink: &mut S) {
        for zone in &mut self.zones {
            if let Some(handle) = zone.render.take() {
                sink.detach(handle);
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> DecalCacheStats {
        let cached = self.zones.iter().filter_map(|z| z.geometry.as_ref());
        DecalCacheStats {
            entries: cached.clone().count(),
            hits: self.hits,
            misses: self.misses,
            released: self.released,
            estimated_memory_bytes: cached.map(|g| g.mesh.estimated_memory_bytes()).sum(),
        }
    }
}

fn normalize_records(records: &[ZoneRecord]) -> AnnotateResult<Vec<ZoneRecord>> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| record.normalized(i))
        .collect()
}

/// Casts from two units above the anchor back along the normal and reports
/// whether the target surface is there.
fn surface_below(target: &TargetMesh, anchor: Point3, normal: Vec3, projector: &DecalProjector) -> bool {
    let Some(ray) = Ray3::new(anchor + normal * 2.0, -normal) else {
        return false;
    };
    let candidate = PickCandidate {
        object: ObjectRef::Target,
        mesh: target.mesh(),
        world: target.world_transform(),
        bvh: target.bvh(),
    };
    picker::pick(ray, &[candidate], projector.tolerance).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::scene::SceneDiff;
    use crate::geom::{GeomMesh, Tolerance, Transform};

    fn plane(transform: Transform) -> TargetMesh {
        let mesh = GeomMesh::new(
            vec![[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [1.0, 1.0, 0.0], [-1.0, 1.0, 0.0]],
            vec![0, 1, 2, 0, 2, 3],
        );
        TargetMesh::with_uniform_scale("plane", mesh, transform, 1.0)
    }

    #[test]
    fn add_stores_local_pose() {
        let target = plane(Transform::translate(Vec3::new(0.0, 0.0, 2.0)));
        let mut store = ZoneStore::new();
        let id = store
            .add(&target, Point3::new(0.5, 0.0, 2.0), Vec3::new(0.0, 0.0, 3.0), 'A')
            .expect("add");
        let zone = store.get(id).expect("zone");
        assert!(Tolerance::DEFAULT.approx_eq_point3(zone.local_position, Point3::new(0.5, 0.0, 0.0)));
        assert!(Tolerance::DEFAULT.approx_eq_vec3(zone.local_normal, Vec3::Z));
        assert_eq!(zone.last_status, ZoneStatus::Unset);
        assert!(zone.geometry().is_none());
    }

    #[test]
    fn geometry_is_computed_once() {
        let target = plane(Transform::identity());
        let config = EngineConfig::default();
        let projector = DecalProjector::default();
        let mut store = ZoneStore::new();
        let id = store.add(&target, Point3::ORIGIN, Vec3::Z, 'B').expect("add");

        let first = store.geometry_for(id, &target, &projector, &config).expect("geometry");
        let second = store.geometry_for(id, &target, &projector, &config).expect("geometry");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.kind, DecalKind::Projected);
        assert!(store.get(id).expect("zone").is_decal_backed());

        let stats = store.stats();
        assert_eq!((stats.entries, stats.hits, stats.misses), (1, 1, 1));
        assert!(stats.estimated_memory_bytes > 0);
    }

    #[test]
    fn zone_off_the_surface_gets_flat_quad() {
        let target = plane(Transform::identity());
        let mut store = ZoneStore::new();
        let id = store.add(&target, Point3::new(5.0, 5.0, 0.0), Vec3::Z, 'C').expect("add");
        let geometry = store
            .geometry_for(id, &target, &DecalProjector::default(), &EngineConfig::default())
            .expect("geometry");
        assert_eq!(geometry.kind, DecalKind::FlatQuad);
    }

    #[test]
    fn clear_detaches_and_releases() {
        let target = plane(Transform::identity());
        let config = EngineConfig::default();
        let mut sink = SceneDiff::new();
        let mut store = ZoneStore::new();
        store.add(&target, Point3::ORIGIN, Vec3::Z, 'A').expect("add");
        store.add(&target, Point3::new(0.5, 0.5, 0.0), Vec3::Z, 'B').expect("add");
        store.attach_all(&mut sink, &target, &DecalProjector::default(), &config, |_| MaterialKind::ZoneEdit);
        assert_eq!(sink.live_count(), 2);

        store.clear(&mut sink);
        assert!(store.is_empty());
        assert_eq!(sink.live_count(), 0);
        assert_eq!(store.stats().released, 2);
    }

    #[test]
    fn singular_target_gets_local_flat_quad() {
        let target = plane(Transform::identity());
        let config = EngineConfig::default();
        let mut sink = SceneDiff::new();
        let mut store = ZoneStore::new();
        let id = store.add(&target, Point3::new(0.5, 0.0, 0.0), Vec3::Z, 'A').expect("add");

        let flat = plane(Transform::scale(1.0, 1.0, 0.0));
        store.attach_all(&mut sink, &flat, &DecalProjector::default(), &config, |_| MaterialKind::ZoneEdit);
        assert_eq!(sink.live_count(), 1);
        let geometry = store.get(id).and_then(Zone::geometry).expect("geometry");
        assert_eq!(geometry.kind, DecalKind::FlatQuad);
        for p in &geometry.mesh.positions {
            assert!((p[2] - 0.02).abs() < 1e-12);
            assert!((p[0] - 0.5).abs() <= config.zone_size * 0.5 + 1e-12);
        }
        assert!(store.geometry_for(ZoneId(99), &flat, &DecalProjector::default(), &config).is_none());
    }

    #[test]
    fn release_keeps_records_and_drops_geometry() {
        let target = plane(Transform::identity());
        let config = EngineConfig::default();
        let mut sink = SceneDiff::new();
        let mut store = ZoneStore::new();
        let id = store.add(&target, Point3::ORIGIN, Vec3::Z, 'A').expect("add");
        store.attach_all(&mut sink, &target, &DecalProjector::default(), &config, |_| MaterialKind::ZoneEdit);

        assert_eq!(store.release_geometry(&mut sink), 1);
        assert_eq!(sink.live_count(), 0);
        let zone = store.get(id).expect("zone survives");
        assert!(zone.geometry().is_none());
        assert!(zone.render_handle().is_none());
        assert_eq!(zone.expected_symbol, 'A');
        assert_eq!(store.stats().released, 1);
    }

    #[test]
    fn replace_all_normalizes_and_rejects_bad_records() {
        let target = plane(Transform::identity());
        let mut sink = SceneDiff::new();
        let mut store = ZoneStore::new();
        store.add(&target, Point3::ORIGIN, Vec3::Z, 'A').expect("add");

        let record = |normal| ZoneRecord {
            position: Point3::new(0.1, 0.0, 0.0),
            normal,
            expected_symbol: 'B',
        };
        let err = store
            .replace_all(&[record(Vec3::Y), record(Vec3::ZERO)], &mut sink)
            .expect_err("zero normal");
        assert!(matches!(err, AnnotateError::MalformedPersistedData(_)));
        assert_eq!(store.serialize()[0].expected_symbol, 'A');

        store.replace_all(&[record(Vec3::new(0.0, 0.0, 4.0))], &mut sink).expect("replace");
        assert_eq!(store.serialize(), vec![record(Vec3::Z)]);
    }

    #[test]
    fn document_round_trip_and_legacy_field() {
        let records = vec![ZoneRecord {
            position: Point3::new(0.1, 0.2, 0.3),
            normal: Vec3::Y,
            expected_symbol: 'Ж',
        }];
        let doc = ZoneDocument::new("cube.glb", OffsetDateTime::UNIX_EPOCH, records.clone()).expect("doc");
        assert_eq!(doc.timestamp, "1970-01-01T00:00:00Z");
        let json = doc.to_json().expect("json");
        assert!(json.contains("\"expectedSymbol\""));
        assert_eq!(ZoneDocument::from_json(&json).expect("parse").zones, records);

        let legacy = r#"{ "zones": [ { "position": [1, 2, 3], "normal": [0, 0, 2], "expectedChar": "A" } ] }"#;
        let doc = ZoneDocument::from_json(legacy).expect("legacy");
        assert_eq!(doc.zones[0].normal, Vec3::Z);
        assert_eq!(doc.zones[0].expected_symbol, 'A');
        assert!(doc.model_name.is_empty());
    }

    #[test]
    fn malformed_documents_leave_store_untouched() {
        let target = plane(Transform::identity());
        let mut sink = SceneDiff::new();
        let mut store = ZoneStore::new();
        store.add(&target, Point3::ORIGIN, Vec3::Z, 'A').expect("add");

        for bad in [
            "not json",
            r#"{ "zones": {} }"#,
            r#"{ "zones": [ { "position": [1, 2], "normal": [0, 0, 1], "expectedSymbol": "A" } ] }"#,
            r#"{ "zones": [ { "position": [1, 2, 3], "normal": [0, 0, 0], "expectedSymbol": "A" } ] }"#,
            r#"{ "zones": [ { "position": [1, 2, 3], "normal": [0, 0, 1], "expectedSymbol": "AB" } ] }"#,
        ] {
            let err = store.deserialize(bad, &mut sink).expect_err(bad);
            assert!(matches!(err, AnnotateError::MalformedPersistedData(_)), "{bad}");
            assert_eq!(store.len(), 1);
        }

        assert_eq!(store.deserialize(r#"{ "zones": [] }"#, &mut sink).expect("empty"), 0);
        assert!(store.is_empty());
    }
}
