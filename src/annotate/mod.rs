//! Sticker annotation on a 3D target: zone authoring, sticker placement and
//! grading, all anchored in the target's local space.

pub mod camera;
pub mod decal;
pub mod error;
pub mod frame;
pub mod markers;
pub mod picker;
pub mod scene;
pub mod session;
pub mod target;
pub mod validate;
pub mod zones;

pub use camera::{Camera, Projection, Viewport};
pub use decal::{DecalDiagnostics, DecalGeometry, DecalKind, DecalProjector, DecalRequest, FallbackReason};
pub use error::{AnnotateError, AnnotateResult};
pub use frame::{Frame, to_local, to_local_normal, to_world, to_world_normal};
pub use markers::{Marker, MarkerId, MarkerRecord, MarkerStore};
pub use picker::{ObjectRef, PickCandidate, PickHit, pick, pick_at};
pub use scene::{MaterialKind, RenderHandle, SceneDiff, SceneDiffExport, SceneNode, SceneSink};
pub use session::{GhostHint, PointerOutcome, Preview, PreviewQuad, SceneSummary, Session, ToolMode};
pub use target::{TargetMesh, zone_document_name};
pub use validate::{Placement, Validation, ValidationReport, ZoneVerdict};
pub use zones::{Zone, ZoneDocument, ZoneId, ZoneRecord, ZoneStatus, ZoneStore};
