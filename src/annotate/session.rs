//! One annotation session: the loaded target, camera, both stores and the
//! active tool, with pointer events dispatched per tool mode.

use std::fmt;
use std::str::FromStr;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::{ConfigError, EngineConfig};
use crate::geom::{Point3, Transform, Vec3};

use super::camera::{Camera, Viewport};
use super::decal::DecalProjector;
use super::error::{AnnotateError, AnnotateResult};
use super::frame::Frame;
use super::markers::{MarkerId, MarkerStore};
use super::picker::{self, ObjectRef, PickCandidate, PickHit};
use super::scene::{MaterialKind, SceneDiff, SceneSink};
use super::target::TargetMesh;
use super::validate::{self, Validation};
use super::zones::{ZoneDocument, ZoneId, ZoneStatus, ZoneStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolMode {
    #[default]
    Select,
    Place,
    Erase,
    ZoneEdit,
}

impl FromStr for ToolMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "select" => Ok(Self::Select),
            "place" | "sticker" => Ok(Self::Place),
            "erase" | "eraser" => Ok(Self::Erase),
            "zoneedit" | "zone_edit" | "zone-edit" => Ok(Self::ZoneEdit),
            other => Err(format!("unknown tool mode '{other}'")),
        }
    }
}

impl fmt::Display for ToolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Select => "select",
            Self::Place => "place",
            Self::Erase => "erase",
            Self::ZoneEdit => "zoneEdit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IgnoreReason {
    SelectMode,
    NoSymbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum PointerOutcome {
    Ignored { reason: IgnoreReason },
    Missed,
    #[serde(rename_all = "camelCase")]
    MarkerPlaced { marker_id: MarkerId },
    #[serde(rename_all = "camelCase")]
    MarkerErased { marker_id: MarkerId },
    #[serde(rename_all = "camelCase")]
    ZoneAdded { zone_id: ZoneId },
}

/// Cursor-follow quad, recomputed on every move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewQuad {
    pub world_position: Point3,
    pub world_normal: Vec3,
    pub size: f64,
    pub symbol: char,
    pub zone: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Preview {
    Hidden,
    Quad(PreviewQuad),
    #[serde(rename_all = "camelCase")]
    HoverMarker { marker_id: MarkerId },
}

/// Where an unmatched zone expects its sticker, shown after review starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GhostHint {
    pub zone_id: ZoneId,
    pub symbol: char,
    pub world_position: Point3,
    pub world_normal: Vec3,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSummary {
    pub model_name: Option<String>,
    pub zone_count: usize,
    pub marker_count: usize,
    pub uniform_scale: f64,
    pub tool_mode: ToolMode,
    pub review: bool,
}

pub struct Session<S: SceneSink = SceneDiff> {
    config: EngineConfig,
    projector: DecalProjector,
    target: Option<TargetMesh>,
    camera: Option<Camera>,
    viewport: Viewport,
    zones: ZoneStore,
    markers: MarkerStore,
    tool: ToolMode,
    selected_symbol: Option<char>,
    review: bool,
    sink: S,
}

impl Session<SceneDiff> {
    pub fn with_config(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::new(config, SceneDiff::new())
    }
}

impl<S: SceneSink> Session<S> {
    pub fn new(config: EngineConfig, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            projector: DecalProjector::new(config.tolerance(), config.surface_offset),
            config,
            target: None,
            camera: None,
            viewport: Viewport::sized(0.0, 0.0),
            zones: ZoneStore::new(),
            markers: MarkerStore::new(),
            tool: ToolMode::Select,
            selected_symbol: None,
            review: false,
            sink,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn target(&self) -> Option<&TargetMesh> {
        self.target.as_ref()
    }

    #[must_use]
    pub fn zones(&self) -> &ZoneStore {
        &self.zones
    }

    #[must_use]
    pub fn markers(&self) -> &MarkerStore {
        &self.markers
    }

    #[must_use]
    pub fn tool(&self) -> ToolMode {
        self.tool
    }

    #[must_use]
    pub fn selected_symbol(&self) -> Option<char> {
        self.selected_symbol
    }

    #[must_use]
    pub fn is_review(&self) -> bool {
        self.review
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Swaps in a new target. Markers of the previous target are erased;
    /// zone records stay in local space and only lose their projected
    /// geometry, so an import or auto-load can replace them afterwards.
    pub fn load_target(&mut self, target: TargetMesh) {
        self.release_target_views();
        info!(
            "target '{}' loaded: {} triangles, uniform scale {:.4}",
            target.name(),
            target.mesh().triangle_count(),
            target.uniform_scale()
        );
        self.target = Some(target);
        self.render_zones();
    }

    pub fn unload_target(&mut self) {
        self.release_target_views();
        self.target = None;
    }

    fn release_target_views(&mut self) {
        let markers = self.markers.clear(&mut self.sink);
        let geometries = self.zones.release_geometry(&mut self.sink);
        self.review = false;
        if markers + geometries > 0 {
            debug!("released {markers} markers and {geometries} zone geometries");
        }
    }

    /// Live transform edit. Stored annotations stay in local space and
    /// follow the target; nothing is recomputed.
    pub fn set_target_transform(&mut self, transform: Transform) -> AnnotateResult<()> {
        let target = self.target.as_mut().ok_or(AnnotateError::NoTarget)?;
        target.set_transform(transform);
        Ok(())
    }

    pub fn set_camera(&mut self, camera: Camera, viewport: Viewport) {
        self.camera = Some(camera);
        self.viewport = viewport;
    }

    /// Switches tool; leaves review mode and refreshes zone display.
    pub fn set_tool(&mut self, tool: ToolMode) {
        self.tool = tool;
        self.review = false;
        self.render_zones();
    }

    pub fn select_symbol(&mut self, symbol: Option<char>) {
        self.selected_symbol = symbol;
    }

    /// Hit on the target or on any marker, whichever is nearest. Markers are
    /// listed first so a sticker lying flush on the surface wins the tie.
    #[must_use]
    pub fn pick_surface(&self, x: f64, y: f64) -> Option<PickHit> {
        let target = self.target.as_ref()?;
        let mut candidates = self.markers.pick_candidates(target);
        candidates.push(target_candidate(target));
        self.pick_among(x, y, &candidates)
    }

    #[must_use]
    pub fn pick_marker(&self, x: f64, y: f64) -> Option<MarkerId> {
        let target = self.target.as_ref()?;
        let candidates = self.markers.pick_candidates(target);
        match self.pick_among(x, y, &candidates)?.object {
            ObjectRef::Marker(id) => Some(id),
            ObjectRef::Target => None,
        }
    }

    fn pick_target_only(&self, x: f64, y: f64) -> Option<PickHit> {
        let target = self.target.as_ref()?;
        self.pick_among(x, y, &[target_candidate(target)])
    }

    fn pick_among(&self, x: f64, y: f64, candidates: &[PickCandidate<'_>]) -> Option<PickHit> {
        let camera = self.camera.as_ref()?;
        picker::pick_at(camera, &self.viewport, x, y, candidates, self.projector.tolerance)
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) -> AnnotateResult<PointerOutcome> {
        match self.tool {
            ToolMode::Select => Ok(PointerOutcome::Ignored {
                reason: IgnoreReason::SelectMode,
            }),
            ToolMode::Place => {
                let Some(symbol) = self.selected_symbol else {
                    return Ok(PointerOutcome::Ignored {
                        reason: IgnoreReason::NoSymbol,
                    });
                };
                if self.target.is_none() {
                    return Err(AnnotateError::NoTarget);
                }
                let Some(hit) = self.pick_surface(x, y) else {
                    return Ok(PointerOutcome::Missed);
                };
                let marker_id = self.place_marker(&hit, symbol)?;
                Ok(PointerOutcome::MarkerPlaced { marker_id })
            }
            ToolMode::Erase => {
                let Some(marker_id) = self.pick_marker(x, y) else {
                    return Ok(PointerOutcome::Missed);
                };
                self.erase_marker(marker_id)?;
                Ok(PointerOutcome::MarkerErased { marker_id })
            }
            ToolMode::ZoneEdit => {
                let Some(symbol) = self.selected_symbol else {
                    return Ok(PointerOutcome::Ignored {
                        reason: IgnoreReason::NoSymbol,
                    });
                };
                if self.target.is_none() {
                    return Err(AnnotateError::NoTarget);
                }
                let Some(hit) = self.pick_target_only(x, y) else {
                    return Ok(PointerOutcome::Missed);
                };
                let zone_id = self.add_zone(hit.point, hit.face_normal, symbol)?;
                Ok(PointerOutcome::ZoneAdded { zone_id })
            }
        }
    }

    /// Cursor feedback for the active tool. Nothing is cached between calls.
    #[must_use]
    pub fn pointer_move(&self, x: f64, y: f64) -> Preview {
        let Some(target) = self.target.as_ref() else {
            return Preview::Hidden;
        };
        let scale = target.uniform_scale();
        let (size, zone) = match self.tool {
            ToolMode::Select => return Preview::Hidden,
            ToolMode::Erase => {
                return self
                    .pick_marker(x, y)
                    .map_or(Preview::Hidden, |marker_id| Preview::HoverMarker { marker_id });
            }
            ToolMode::Place => (self.config.sticker_extent(scale), false),
            ToolMode::ZoneEdit => (self.config.zone_extent(scale), true),
        };
        let Some(symbol) = self.selected_symbol else {
            return Preview::Hidden;
        };
        let hit = if zone {
            self.pick_target_only(x, y)
        } else {
            self.pick_surface(x, y)
        };
        // Stickers are part of the pickable scene, so the quad also follows
        // the cursor across them even though a click there is refused.
        hit.map_or(Preview::Hidden, |hit| {
            Preview::Quad(PreviewQuad {
                world_position: hit.point + hit.face_normal * self.config.surface_offset,
                world_normal: hit.face_normal,
                size,
                symbol,
                zone,
            })
        })
    }

    /// Pointer left the canvas: no preview, no hover.
    #[must_use]
    pub fn pointer_leave(&self) -> Preview {
        Preview::Hidden
    }

    pub fn place_marker(&mut self, hit: &PickHit, symbol: char) -> AnnotateResult<MarkerId> {
        self.markers.place(
            self.target.as_ref(),
            hit,
            symbol,
            &self.projector,
            &self.config,
            &mut self.sink,
        )
    }

    pub fn erase_marker(&mut self, id: MarkerId) -> AnnotateResult<()> {
        self.markers.erase(id, &mut self.sink).map(|_| ())
    }

    /// Erases every marker. Returns how many were removed.
    pub fn reset(&mut self) -> usize {
        let count = self.markers.clear(&mut self.sink);
        info!("reset: {count} markers erased");
        count
    }

    pub fn add_zone(&mut self, world_point: Point3, world_normal: Vec3, symbol: char) -> AnnotateResult<ZoneId> {
        let target = self.target.as_ref().ok_or(AnnotateError::NoTarget)?;
        let id = self.zones.add(target, world_point, world_normal, symbol)?;
        self.render_zones();
        Ok(id)
    }

    pub fn clear_zones(&mut self) {
        self.zones.clear(&mut self.sink);
        self.render_zones();
    }

    /// Replaces all zones with those in `json`. A malformed document leaves
    /// the store as it was.
    pub fn import_zones(&mut self, json: &str) -> AnnotateResult<usize> {
        let count = self.zones.deserialize(json, &mut self.sink)?;
        self.render_zones();
        Ok(count)
    }

    /// Import used when a document was found next to a freshly loaded
    /// target. Failures are logged, not reported.
    pub fn auto_load_zones(&mut self, json: &str) -> Option<usize> {
        match self.import_zones(json) {
            Ok(count) => Some(count),
            Err(err) => {
                warn!("auto-load of zones skipped: {err}");
                None
            }
        }
    }

    pub fn export_zones(&self, stamp: OffsetDateTime) -> AnnotateResult<ZoneDocument> {
        let target = self.target.as_ref().ok_or(AnnotateError::NoTarget)?;
        if self.zones.is_empty() {
            warn!("exporting an empty zone list for '{}'", target.name());
        }
        ZoneDocument::new(target.name(), stamp, self.zones.serialize())
    }

    /// Grades markers against zones. Without a target nothing is graded.
    pub fn validate(&mut self) -> Validation {
        let Some(target) = self.target.as_ref() else {
            return Validation::default();
        };
        let threshold = self.config.match_threshold(target.uniform_scale());
        let result = validate::validate(&mut self.zones, self.markers.all(), threshold);
        if self.review {
            self.render_zones();
        }
        result
    }

    /// Enters review: select tool, zones coloured by their last status.
    /// Returns a hint for every zone that is not correct and can be placed
    /// in world space.
    pub fn enter_review(&mut self) -> Vec<GhostHint> {
        self.tool = ToolMode::Select;
        self.review = true;
        self.render_zones();

        let Some(target) = self.target.as_ref() else {
            return Vec::new();
        };
        let size = self.config.sticker_size * target.uniform_scale();
        let mut hints = Vec::new();
        for zone in self.zones.iter().filter(|z| z.last_status != ZoneStatus::Correct) {
            let (position, normal) = match zone.world_pose(target) {
                Ok(pose) => pose,
                Err(err) => {
                    warn!("no ghost hint for zone {}: {err}", zone.id.0);
                    continue;
                }
            };
            hints.push(GhostHint {
                zone_id: zone.id,
                symbol: zone.expected_symbol,
                world_position: position + normal * self.config.ghost_offset,
                world_normal: normal,
                size,
            });
        }
        debug!("review: {} ghost hints", hints.len());
        hints
    }

    /// Re-renders zone nodes for the current mode, detaching the old ones.
    fn render_zones(&mut self) {
        self.zones.detach_all(&mut self.sink);
        let visible = self.tool == ToolMode::ZoneEdit || self.review;
        let Some(target) = self.target.as_ref().filter(|_| visible) else {
            return;
        };
        let review = self.review;
        self.zones
            .attach_all(&mut self.sink, target, &self.projector, &self.config, |zone| {
                match (review, zone.last_status) {
                    (false, _) => MaterialKind::ZoneEdit,
                    (true, ZoneStatus::Correct) => MaterialKind::ZoneCorrect,
                    (true, _) => MaterialKind::ZoneError,
                }
            });
    }

    #[must_use]
    pub fn summary(&self) -> SceneSummary {
        SceneSummary {
            model_name: self.target.as_ref().map(|t| t.name().to_string()),
            zone_count: self.zones.len(),
            marker_count: self.markers.len(),
            uniform_scale: self.target.as_ref().map_or(1.0, TargetMesh::uniform_scale),
            tool_mode: self.tool,
            review: self.review,
        }
    }
}

fn target_candidate(target: &TargetMesh) -> PickCandidate<'_> {
    PickCandidate {
        object: ObjectRef::Target,
        mesh: target.mesh(),
        world: target.world_transform(),
        bvh: target.bvh(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::decal::DecalKind;
    use crate::geom::{GeomMesh, Tolerance};

    /// 4x4 plane at z = 0 seen from +Z by a 90 degree camera at z = 2, so the
    /// 200x200 viewport maps pixel (100 + 50 * x, 100 - 50 * y) to (x, y, 0).
    fn session() -> Session {
        let mesh = GeomMesh::new(
            vec![[-2.0, -2.0, 0.0], [2.0, -2.0, 0.0], [2.0, 2.0, 0.0], [-2.0, 2.0, 0.0]],
            vec![0, 1, 2, 0, 2, 3],
        );
        let mut session = Session::with_config(EngineConfig::default()).expect("config");
        session.load_target(TargetMesh::with_uniform_scale("plane", mesh, Transform::identity(), 1.0));
        let camera = Camera::perspective_looking_at(Point3::new(0.0, 0.0, 2.0), Point3::ORIGIN, Vec3::Y, 90.0, 1.0)
            .expect("camera");
        session.set_camera(camera, Viewport::sized(200.0, 200.0));
        session
    }

    fn px(x: f64, y: f64) -> (f64, f64) {
        (100.0 + 50.0 * x, 100.0 - 50.0 * y)
    }

    #[test]
    fn tool_modes_parse_from_strings() {
        assert_eq!("zone_edit".parse::<ToolMode>(), Ok(ToolMode::ZoneEdit));
        assert_eq!("Sticker".parse::<ToolMode>(), Ok(ToolMode::Place));
        assert_eq!(ToolMode::ZoneEdit.to_string(), "zoneEdit");
        assert!("paint".parse::<ToolMode>().is_err());
    }

    #[test]
    fn place_mode_places_and_refuses_stacking() {
        let mut s = session();
        s.set_tool(ToolMode::Place);
        let (x, y) = px(0.3, 0.4);
        assert_eq!(
            s.pointer_down(x, y),
            Ok(PointerOutcome::Ignored {
                reason: IgnoreReason::NoSymbol
            })
        );

        s.select_symbol(Some('A'));
        let placed = s.pointer_down(x, y).expect("place");
        assert!(matches!(placed, PointerOutcome::MarkerPlaced { .. }));
        let marker = &s.markers().all()[0];
        assert!(Tolerance::LOOSE.approx_eq_point3(marker.local_position, Point3::new(0.3, 0.4, 0.0)));

        assert_eq!(s.pointer_down(x, y), Err(AnnotateError::MarkerStacking));
        assert_eq!(s.markers().len(), 1);

        let (far_x, far_y) = px(0.0, 1.9);
        assert!(matches!(s.pointer_down(far_x, far_y), Ok(PointerOutcome::MarkerPlaced { .. })));
    }

    #[test]
    fn erase_mode_removes_hovered_marker() {
        let mut s = session();
        s.select_symbol(Some('B'));
        s.set_tool(ToolMode::Place);
        let (x, y) = px(-0.5, 0.5);
        let PointerOutcome::MarkerPlaced { marker_id } = s.pointer_down(x, y).expect("place") else {
            panic!("expected a placement");
        };

        s.set_tool(ToolMode::Erase);
        assert_eq!(s.pointer_move(x, y), Preview::HoverMarker { marker_id });
        let (empty_x, empty_y) = px(1.0, -1.0);
        assert_eq!(s.pointer_move(empty_x, empty_y), Preview::Hidden);
        assert_eq!(s.pointer_down(empty_x, empty_y), Ok(PointerOutcome::Missed));
        assert_eq!(s.pointer_down(x, y), Ok(PointerOutcome::MarkerErased { marker_id }));
        assert!(s.markers().is_empty());
        assert_eq!(s.erase_marker(marker_id), Err(AnnotateError::UnknownMarker(marker_id)));
    }

    #[test]
    fn zone_edit_adds_zones_and_renders_them() {
        let mut s = session();
        s.select_symbol(Some('Z'));
        s.set_tool(ToolMode::ZoneEdit);
        let (x, y) = px(0.5, -0.5);
        assert!(matches!(s.pointer_down(x, y), Ok(PointerOutcome::ZoneAdded { .. })));
        assert_eq!(s.zones().len(), 1);
        assert_eq!(s.sink().live_count(), 1);

        // Leaving zone edit hides zones.
        s.set_tool(ToolMode::Select);
        assert_eq!(s.sink().live_count(), 0);
        assert_eq!(
            s.pointer_down(x, y),
            Ok(PointerOutcome::Ignored {
                reason: IgnoreReason::SelectMode
            })
        );
    }

    #[test]
    fn preview_follows_tool_size() {
        let mut s = session();
        s.select_symbol(Some('P'));
        let (x, y) = px(0.0, 0.0);
        assert_eq!(s.pointer_move(x, y), Preview::Hidden);

        s.set_tool(ToolMode::Place);
        let Preview::Quad(quad) = s.pointer_move(x, y) else {
            panic!("expected a preview quad");
        };
        assert!((quad.size - 0.2).abs() < 1e-12);
        assert!(!quad.zone);
        assert!((quad.world_position.z - 0.02).abs() < 1e-9);

        s.set_tool(ToolMode::ZoneEdit);
        let Preview::Quad(quad) = s.pointer_move(x, y) else {
            panic!("expected a preview quad");
        };
        assert!((quad.size - 0.15).abs() < 1e-12);
        assert!(quad.zone);
        assert_eq!(s.pointer_leave(), Preview::Hidden);
    }

    #[test]
    fn review_colors_zones_and_returns_ghosts() {
        let mut s = session();
        s.add_zone(Point3::new(0.0, 0.0, 0.0), Vec3::Z, 'A').expect("zone a");
        s.add_zone(Point3::new(1.0, 0.0, 0.0), Vec3::Z, 'B').expect("zone b");
        let hit = s.pick_surface(px(0.0, 0.0).0, px(0.0, 0.0).1).expect("hit");
        s.place_marker(&hit, 'A').expect("marker");

        let result = s.validate();
        assert_eq!(result.report.correct, 1);
        assert!(!result.report.is_perfect);

        let ghosts = s.enter_review();
        assert_eq!(ghosts.len(), 1);
        assert_eq!(ghosts[0].symbol, 'B');
        assert!((ghosts[0].world_position.z - 0.05).abs() < 1e-9);
        assert!((ghosts[0].size - 0.25).abs() < 1e-12);

        let materials: Vec<MaterialKind> = s
            .zones()
            .iter()
            .filter_map(|z| z.render_handle())
            .filter_map(|h| s.sink().get(h).map(|n| n.material))
            .collect();
        assert_eq!(materials, vec![MaterialKind::ZoneCorrect, MaterialKind::ZoneError]);
        assert_eq!(s.tool(), ToolMode::Select);
    }

    #[test]
    fn target_swap_keeps_zone_records_and_drops_markers() {
        let mut s = session();
        s.set_tool(ToolMode::ZoneEdit);
        let zone_id = s.add_zone(Point3::ORIGIN, Vec3::Z, 'A').expect("zone");
        let hit = s.pick_surface(100.0, 100.0).expect("hit");
        s.place_marker(&hit, 'A').expect("marker");
        assert_eq!(s.sink().live_count(), 2);
        let old_handle = s.zones().get(zone_id).and_then(|z| z.render_handle()).expect("rendered");

        let mesh = GeomMesh::new(vec![[0.0, 0.0, 0.0], [8.0, 0.0, 0.0], [0.0, 8.0, 0.0]], vec![0, 1, 2]);
        s.load_target(TargetMesh::new("other", mesh, Transform::identity(), 4.0));
        assert!(s.markers().is_empty());
        assert_eq!(s.zones().len(), 1);
        let zone = s.zones().get(zone_id).expect("zone kept");
        assert_eq!(zone.expected_symbol, 'A');
        assert_eq!(zone.local_position, Point3::ORIGIN);
        // Still in zone edit: the zone is re-projected onto the new target.
        assert_eq!(s.sink().live_count(), 1);
        assert_ne!(zone.render_handle(), Some(old_handle));
        assert!(s.sink().get(old_handle).is_none());

        s.unload_target();
        assert_eq!(s.sink().live_count(), 0);
        assert_eq!(s.zones().len(), 1);
        assert_eq!(s.summary().model_name, None);
    }

    #[test]
    fn swapped_target_reports_its_own_scale() {
        let mut s = session();
        let mesh = GeomMesh::new(vec![[0.0, 0.0, 0.0], [8.0, 0.0, 0.0], [0.0, 8.0, 0.0]], vec![0, 1, 2]);
        s.load_target(TargetMesh::new("other", mesh, Transform::identity(), 4.0));
        assert!((s.summary().uniform_scale - 0.5).abs() < 1e-12);
        assert_eq!(s.summary().model_name.as_deref(), Some("other"));
    }

    #[test]
    fn singular_transform_does_not_break_zone_import() {
        let mut s = session();
        s.set_tool(ToolMode::ZoneEdit);
        s.set_target_transform(Transform::scale(1.0, 1.0, 0.0)).expect("transform");
        let json = r#"{ "zones": [ { "position": [0, 0, 0], "normal": [0, 0, 1], "expectedSymbol": "A" } ] }"#;
        assert_eq!(s.import_zones(json), Ok(1));
        assert_eq!(s.sink().live_count(), 1);
        let zone = s.zones().iter().next().expect("zone");
        assert_eq!(zone.geometry().map(|g| g.kind), Some(DecalKind::FlatQuad));

        let result = s.validate();
        assert_eq!(result.report.total, 1);
        assert_eq!(result.verdicts[0].status, ZoneStatus::Missing);
        assert!(s.enter_review().is_empty());
        assert_eq!(s.sink().live_count(), 1);
    }

    #[test]
    fn place_preview_follows_cursor_over_stickers() {
        let mut s = session();
        s.select_symbol(Some('A'));
        s.set_tool(ToolMode::Place);
        let (x, y) = px(0.2, 0.2);
        s.pointer_down(x, y).expect("place");
        let Preview::Quad(quad) = s.pointer_move(x, y) else {
            panic!("expected a preview over the sticker");
        };
        assert_eq!(quad.symbol, 'A');
        assert!(!quad.zone);
        assert!((quad.world_position.z - 0.02).abs() < 1e-6);
        assert_eq!(s.pointer_down(x, y), Err(AnnotateError::MarkerStacking));
    }

    #[test]
    fn operations_without_target() {
        let mut s = Session::with_config(EngineConfig::default()).expect("config");
        assert_eq!(s.add_zone(Point3::ORIGIN, Vec3::Z, 'A'), Err(AnnotateError::NoTarget));
        s.select_symbol(Some('A'));
        s.set_tool(ToolMode::Place);
        assert_eq!(s.pointer_down(1.0, 1.0), Err(AnnotateError::NoTarget));
        assert_eq!(s.validate().report.total, 0);
        assert!(s.export_zones(OffsetDateTime::UNIX_EPOCH).is_err());
        assert_eq!(s.pointer_move(1.0, 1.0), Preview::Hidden);
    }

    #[test]
    fn auto_load_swallows_bad_documents() {
        let mut s = session();
        s.add_zone(Point3::ORIGIN, Vec3::Z, 'A').expect("zone");
        assert_eq!(s.auto_load_zones("{ \"zones\": 3 }"), None);
        assert_eq!(s.zones().len(), 1);
        assert_eq!(
            s.auto_load_zones(r#"{ "zones": [ { "position": [0, 0, 0], "normal": [0, 0, 1], "expectedChar": "Q" } ] }"#),
            Some(1)
        );
        assert_eq!(s.zones().iter().next().map(|z| z.expected_symbol), Some('Q'));
    }
}
