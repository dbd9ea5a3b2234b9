//! Grading placed stickers against authored zones.
//!
//! All distances are measured in target-local space, so grading is unaffected
//! by where the target currently sits in the world.

use log::{debug, info};
use serde::Serialize;

use crate::geom::Point3;

use super::markers::{Marker, MarkerRecord};
use super::zones::{ZoneId, ZoneStatus, ZoneStore};

/// Anything that carries a symbol at a target-local position.
pub trait Placement {
    fn symbol(&self) -> char;
    fn local_position(&self) -> Point3;
}

impl Placement for Marker {
    fn symbol(&self) -> char {
        self.symbol
    }

    fn local_position(&self) -> Point3 {
        self.local_position
    }
}

impl Placement for MarkerRecord {
    fn symbol(&self) -> char {
        self.symbol
    }

    fn local_position(&self) -> Point3 {
        self.position
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub total: usize,
    pub correct: usize,
    pub is_perfect: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneVerdict {
    pub zone_id: ZoneId,
    pub expected_symbol: char,
    pub status: ZoneStatus,
    /// Distance to the nearest marker, if there is any marker at all.
    pub distance: Option<f64>,
    pub marker_symbol: Option<char>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub report: ValidationReport,
    pub verdicts: Vec<ZoneVerdict>,
}

/// Grades every zone against its nearest placement and stores the outcome as
/// the zone's last status.
///
/// A zone is `Correct` when the nearest placement lies within `threshold` and
/// carries the expected symbol, `WrongSymbol` when it lies within `threshold`
/// with another symbol, and `Missing` otherwise. Equidistant placements
/// resolve to the one that comes first in `placements`.
pub fn validate<P: Placement>(zones: &mut ZoneStore, placements: &[P], threshold: f64) -> Validation {
    let mut verdicts = Vec::with_capacity(zones.len());
    let mut correct = 0;

    for zone in zones.zones_mut() {
        let mut nearest: Option<(f64, char)> = None;
        for placement in placements {
            let d = placement.local_position().distance_to(zone.local_position);
            if nearest.is_none_or(|(best, _)| d < best) {
                nearest = Some((d, placement.symbol()));
            }
        }

        let status = match nearest {
            Some((d, symbol)) if d <= threshold => {
                if symbol == zone.expected_symbol {
                    correct += 1;
                    ZoneStatus::Correct
                } else {
                    ZoneStatus::WrongSymbol
                }
            }
            _ => ZoneStatus::Missing,
        };
        zone.last_status = status;

        match nearest {
            Some((d, symbol)) => debug!(
                "zone {} ('{}'): {status:?}, nearest '{symbol}' at {d:.3}",
                zone.id.0, zone.expected_symbol
            ),
            None => debug!("zone {} ('{}'): no stickers placed", zone.id.0, zone.expected_symbol),
        }

        verdicts.push(ZoneVerdict {
            zone_id: zone.id,
            expected_symbol: zone.expected_symbol,
            status,
            distance: nearest.map(|(d, _)| d),
            marker_symbol: nearest.map(|(_, s)| s),
        });
    }

    let total = verdicts.len();
    let report = ValidationReport {
        total,
        correct,
        is_perfect: total > 0 && correct == total,
    };
    info!("validation: {correct}/{total} zones correct (threshold {threshold:.4})");
    Validation { report, verdicts }
}
