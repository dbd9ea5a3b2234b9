#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod annotate;
pub mod config;
pub mod geom;

use std::fmt;

use annotate::{
    Camera, MarkerId, Projection, SceneDiff, Session, TargetMesh, ToolMode, Viewport, zone_document_name,
};
use config::EngineConfig;
use geom::{GeomMesh, Point3, Transform, Vec3};
use serde::Serialize;
use time::OffsetDateTime;
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            // no-op fallback when panic hook is disabled
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {
    // no-op fallback when debug logs are disabled
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedZones {
    file_name: String,
    json: String,
}

/// Public entry point for the JS renderer.
///
/// Every mutating call records scene changes; the renderer collects them with
/// [`Engine::take_scene_diff`] after each call (or once per frame).
#[wasm_bindgen]
pub struct Engine {
    session: Session<SceneDiff>,
}

#[wasm_bindgen]
impl Engine {
    /// `config` is an optional partial `EngineConfig` object.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<Engine, JsValue> {
        let config: EngineConfig = if config.is_undefined() || config.is_null() {
            EngineConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(to_js_error)?
        };
        let session = Session::with_config(config).map_err(to_js_error)?;
        Ok(Engine { session })
    }

    #[wasm_bindgen]
    pub fn config(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.config())
    }

    /// Load a target mesh. `matrix` is the column-major world matrix;
    /// `uniform_scale` overrides the fitted scale when given.
    #[wasm_bindgen]
    pub fn load_target(
        &mut self,
        name: &str,
        positions: &[f64],
        indices: Option<Vec<u32>>,
        normals: Option<Vec<f64>>,
        matrix: &[f64],
        uniform_scale: Option<f64>,
    ) -> Result<(), JsValue> {
        if positions.len() % 3 != 0 {
            return Err(js_error("positions length is not a multiple of 3"));
        }
        let transform = parse_matrix(matrix).map_err(|err| js_error(&err))?;
        let mesh = GeomMesh::from_flat(positions, indices.as_deref(), normals.as_deref());
        let target = match uniform_scale.filter(|s| s.is_finite() && *s > 0.0) {
            Some(scale) => TargetMesh::with_uniform_scale(name, mesh, transform, scale),
            None => TargetMesh::new(name, mesh, transform, self.session.config().fit_size),
        };
        debug_log!("[engine] load_target '{}' ({} vertices)", name, positions.len() / 3);
        self.session.load_target(target);
        Ok(())
    }

    #[wasm_bindgen]
    pub fn unload_target(&mut self) {
        self.session.unload_target();
    }

    /// Name of the zone document to look for next to the loaded target.
    #[wasm_bindgen]
    pub fn zone_document_name(&self) -> Result<Option<String>, JsValue> {
        self.session.target().map(TargetMesh::document_name).transpose().map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn set_target_matrix(&mut self, matrix: &[f64]) -> Result<(), JsValue> {
        let transform = parse_matrix(matrix).map_err(|err| js_error(&err))?;
        self.session.set_target_transform(transform).map_err(to_js_error)
    }

    /// Perspective camera from its column-major world matrix.
    #[wasm_bindgen]
    pub fn set_camera(
        &mut self,
        matrix: &[f64],
        fov_y_degrees: f64,
        width: f64,
        height: f64,
        left: Option<f64>,
        top: Option<f64>,
    ) -> Result<(), JsValue> {
        let world = parse_matrix(matrix).map_err(|err| js_error(&err))?;
        let viewport = viewport(width, height, left, top);
        let aspect = if height > 0.0 { width / height } else { 1.0 };
        let projection = Projection::Perspective { fov_y_degrees, aspect };
        self.session.set_camera(Camera::new(world, projection), viewport);
        Ok(())
    }

    #[wasm_bindgen]
    pub fn set_orthographic_camera(
        &mut self,
        matrix: &[f64],
        view_height: f64,
        width: f64,
        height: f64,
        left: Option<f64>,
        top: Option<f64>,
    ) -> Result<(), JsValue> {
        let world = parse_matrix(matrix).map_err(|err| js_error(&err))?;
        let viewport = viewport(width, height, left, top);
        let aspect = if height > 0.0 { width / height } else { 1.0 };
        let projection = Projection::Orthographic {
            height: view_height,
            aspect,
        };
        self.session.set_camera(Camera::new(world, projection), viewport);
        Ok(())
    }

    #[wasm_bindgen]
    pub fn set_tool(&mut self, mode: &str) -> Result<(), JsValue> {
        let mode: ToolMode = mode.parse().map_err(|err: String| js_error(&err))?;
        self.session.set_tool(mode);
        Ok(())
    }

    /// Select the symbol for placement and zone authoring; `None` or an
    /// empty string clears it.
    #[wasm_bindgen]
    pub fn select_symbol(&mut self, symbol: Option<String>) -> Result<(), JsValue> {
        let symbol = match symbol.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(parse_symbol(text).map_err(|err| js_error(&err))?),
        };
        self.session.select_symbol(symbol);
        Ok(())
    }

    #[wasm_bindgen]
    pub fn pointer_down(&mut self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        let outcome = self.session.pointer_down(x, y).map_err(to_js_error)?;
        debug_log!("[engine] pointer_down ({x}, {y}) -> {outcome:?}");
        to_js(&outcome)
    }

    #[wasm_bindgen]
    pub fn pointer_move(&self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        to_js(&self.session.pointer_move(x, y))
    }

    #[wasm_bindgen]
    pub fn pointer_leave(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.pointer_leave())
    }

    #[wasm_bindgen]
    pub fn add_zone(&mut self, point: &[f64], normal: &[f64], symbol: &str) -> Result<u32, JsValue> {
        let point = parse_vec3(point).map_err(|err| js_error(&err))?;
        let normal = parse_vec3(normal).map_err(|err| js_error(&err))?;
        let symbol = parse_symbol(symbol).map_err(|err| js_error(&err))?;
        let id = self
            .session
            .add_zone(Point3::from(point), normal, symbol)
            .map_err(to_js_error)?;
        Ok(id.0)
    }

    #[wasm_bindgen]
    pub fn clear_zones(&mut self) {
        self.session.clear_zones();
    }

    /// Replace all zones with the contents of a zone document.
    #[wasm_bindgen]
    pub fn import_zones(&mut self, json: &str) -> Result<u32, JsValue> {
        let count = self.session.import_zones(json).map_err(to_js_error)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Silent import for documents found next to a freshly loaded model.
    /// Returns the number of zones loaded, or nothing when the document was
    /// unusable.
    #[wasm_bindgen]
    pub fn auto_load_zones(&mut self, json: &str) -> Option<u32> {
        self.session
            .auto_load_zones(json)
            .map(|count| u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Zone document for the loaded target. `timestamp_ms` is the export time
    /// in milliseconds since the Unix epoch (`Date.now()`).
    #[wasm_bindgen]
    pub fn export_zones(&self, timestamp_ms: f64) -> Result<JsValue, JsValue> {
        let stamp = timestamp_from_millis(timestamp_ms).map_err(|err| js_error(&err))?;
        let doc = self.session.export_zones(stamp).map_err(to_js_error)?;
        let exported = ExportedZones {
            file_name: zone_document_name(&doc.model_name).map_err(to_js_error)?,
            json: doc.to_json().map_err(to_js_error)?,
        };
        to_js(&exported)
    }

    #[wasm_bindgen]
    pub fn erase_marker(&mut self, id: u32) -> Result<(), JsValue> {
        self.session.erase_marker(MarkerId(id)).map_err(to_js_error)
    }

    /// Erase every placed sticker.
    #[wasm_bindgen]
    pub fn reset(&mut self) -> u32 {
        u32::try_from(self.session.reset()).unwrap_or(u32::MAX)
    }

    #[wasm_bindgen]
    pub fn validate(&mut self) -> Result<JsValue, JsValue> {
        let result = self.session.validate();
        to_js(&result)
    }

    #[wasm_bindgen]
    pub fn enter_review(&mut self) -> Result<JsValue, JsValue> {
        let hints = self.session.enter_review();
        to_js(&hints)
    }

    /// Scene nodes added and removed since the previous call.
    #[wasm_bindgen]
    pub fn take_scene_diff(&mut self) -> Result<JsValue, JsValue> {
        let diff = self.session.sink_mut().take();
        to_js(&diff)
    }

    #[wasm_bindgen]
    pub fn scene_summary(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.summary())
    }

    #[wasm_bindgen]
    pub fn decal_cache_stats(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.zones().stats())
    }
}

fn viewport(width: f64, height: f64, left: Option<f64>, top: Option<f64>) -> Viewport {
    Viewport {
        left: left.unwrap_or(0.0),
        top: top.unwrap_or(0.0),
        width,
        height,
    }
}

fn parse_matrix(values: &[f64]) -> Result<Transform, String> {
    let cols: &[f64; 16] = values
        .try_into()
        .map_err(|_| format!("expected 16 matrix elements, got {}", values.len()))?;
    let transform = Transform::from_cols_array(cols);
    if !transform.is_finite() {
        return Err("matrix contains non-finite values".to_string());
    }
    Ok(transform)
}

fn parse_vec3(values: &[f64]) -> Result<Vec3, String> {
    match values {
        [x, y, z] if x.is_finite() && y.is_finite() && z.is_finite() => Ok(Vec3::new(*x, *y, *z)),
        [_, _, _] => Err("vector contains non-finite values".to_string()),
        _ => Err(format!("expected 3 vector components, got {}", values.len())),
    }
}

fn parse_symbol(text: &str) -> Result<char, String> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(symbol), None) => Ok(symbol),
        _ => Err(format!("a symbol is exactly one character, got '{text}'")),
    }
}

fn timestamp_from_millis(millis: f64) -> Result<OffsetDateTime, String> {
    if !millis.is_finite() {
        return Err("timestamp is not finite".to_string());
    }
    #[allow(clippy::cast_possible_truncation)]
    let nanos = (millis * 1_000_000.0).round() as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|err| err.to_string())
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|err| JsError::new(&err.to_string()).into())
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_column_major_matrices() {
        let mut cols = [0.0; 16];
        cols[0] = 1.0;
        cols[5] = 1.0;
        cols[10] = 1.0;
        cols[15] = 1.0;
        cols[12] = 3.0;
        let transform = parse_matrix(&cols).expect("matrix");
        assert_eq!(transform.translation(), Vec3::new(3.0, 0.0, 0.0));

        assert!(parse_matrix(&cols[..15]).is_err());
        cols[3] = f64::NAN;
        assert!(parse_matrix(&cols).is_err());
    }

    #[test]
    fn symbols_are_single_characters() {
        assert_eq!(parse_symbol("A"), Ok('A'));
        assert_eq!(parse_symbol("Я"), Ok('Я'));
        assert!(parse_symbol("").is_err());
        assert!(parse_symbol("AB").is_err());
    }

    #[test]
    fn vectors_need_three_finite_components() {
        assert_eq!(parse_vec3(&[1.0, 2.0, 3.0]), Ok(Vec3::new(1.0, 2.0, 3.0)));
        assert!(parse_vec3(&[1.0, 2.0]).is_err());
        assert!(parse_vec3(&[1.0, f64::INFINITY, 0.0]).is_err());
    }

    #[test]
    fn timestamps_come_from_js_millis() {
        let stamp = timestamp_from_millis(1_700_000_000_123.0).expect("stamp");
        assert_eq!(stamp.unix_timestamp(), 1_700_000_000);
        assert_eq!(stamp.millisecond(), 123);
        assert!(timestamp_from_millis(f64::NAN).is_err());
    }
}
