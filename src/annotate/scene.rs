//! Render-side collaborator.
//!
//! The engine never touches renderer objects directly; it hands decal
//! geometry to a [`SceneSink`] and keeps the returned handle so the node can be
//! detached again. [`SceneDiff`] is the sink used by the wasm facade: it
//! records what changed since the renderer last asked.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::decal::{DecalGeometry, DecalKind};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
pub struct RenderHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MaterialKind {
    ZoneEdit,
    ZoneCorrect,
    ZoneError,
    Sticker { symbol: char },
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialExport {
    pub color: [f64; 3],
    pub opacity: f64,
    pub render_order: i32,
    pub polygon_offset_factor: f64,
    pub double_sided: bool,
    pub textured: bool,
}

impl MaterialKind {
    #[must_use]
    pub fn style(self) -> MaterialExport {
        let zone = |rgb: u32, opacity: f64| MaterialExport {
            color: hex_to_rgb(rgb),
            opacity,
            render_order: 2,
            polygon_offset_factor: -4.0,
            double_sided: true,
            textured: false,
        };
        match self {
            Self::ZoneEdit => zone(0x3b_82_f6, 0.5),
            Self::ZoneCorrect => zone(0x10_b9_81, 0.6),
            Self::ZoneError => zone(0xef_44_44, 0.6),
            Self::Sticker { .. } => MaterialExport {
                color: [1.0, 1.0, 1.0],
                opacity: 1.0,
                render_order: 1,
                polygon_offset_factor: -4.0,
                double_sided: false,
                textured: true,
            },
        }
    }
}

fn hex_to_rgb(hex: u32) -> [f64; 3] {
    let channel = |shift: u32| f64::from((hex >> shift) & 0xff) / 255.0;
    [channel(16), channel(8), channel(0)]
}

/// A decal to be shown as a child of the target's scene subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub geometry: Arc<DecalGeometry>,
    pub material: MaterialKind,
}

pub trait SceneSink {
    fn attach(&mut self, node: SceneNode) -> RenderHandle;
    /// Detaching an unknown handle is a no-op.
    fn detach(&mut self, handle: RenderHandle);
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SceneNodeExport {
    pub id: u32,
    pub kind: DecalKind,
    pub material: MaterialKind,
    pub style: MaterialExport,
    pub positions: Vec<f64>,
    pub normals: Vec<f64>,
    pub uvs: Vec<f64>,
    pub indices: Vec<u32>,
}

impl SceneNodeExport {
    fn new(handle: RenderHandle, node: &SceneNode) -> Self {
        let mesh = &node.geometry.mesh;
        Self {
            id: handle.0,
            kind: node.geometry.kind,
            material: node.material,
            style: node.material.style(),
            positions: mesh.positions_flat().to_vec(),
            normals: mesh.normals_flat().map(<[f64]>::to_vec).unwrap_or_default(),
            uvs: mesh.uvs_flat().map(<[f64]>::to_vec).unwrap_or_default(),
            indices: mesh.indices.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize, Clone, PartialEq)]
pub struct SceneDiffExport {
    pub added: Vec<SceneNodeExport>,
    pub removed: Vec<u32>,
}

impl SceneDiffExport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Recording sink. Nodes attached and detached between two [`SceneDiff::take`]
/// calls never show up in either list.
#[derive(Debug, Default)]
pub struct SceneDiff {
    next_handle: u32,
    live: BTreeMap<RenderHandle, SceneNode>,
    added: Vec<RenderHandle>,
    removed: Vec<RenderHandle>,
}

impl SceneDiff {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains pending changes.
    pub fn take(&mut self) -> SceneDiffExport {
        let added = std::mem::take(&mut self.added)
            .into_iter()
            .filter_map(|handle| self.live.get(&handle).map(|node| SceneNodeExport::new(handle, node)))
            .collect();
        let removed = std::mem::take(&mut self.removed).into_iter().map(|h| h.0).collect();
        SceneDiffExport { added, removed }
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn get(&self, handle: RenderHandle) -> Option<&SceneNode> {
        self.live.get(&handle)
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = (RenderHandle, &SceneNode)> {
        self.live.iter().map(|(handle, node)| (*handle, node))
    }
}

impl SceneSink for SceneDiff {
    fn attach(&mut self, node: SceneNode) -> RenderHandle {
        let handle = RenderHandle(self.next_handle);
        self.next_handle += 1;
        self.live.insert(handle, node);
        self.added.push(handle);
        handle
    }

    fn detach(&mut self, handle: RenderHandle) {
        if self.live.remove(&handle).is_none() {
            return;
        }
        if let Some(pos) = self.added.iter().position(|h| *h == handle) {
            self.added.remove(pos);
        } else {
            self.removed.push(handle);
        }
    }
}
