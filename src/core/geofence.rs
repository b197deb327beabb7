//! Zone membership test for a single position.
//!
//! Pure functions only. Active zones are tested in snapshot order and the
//! first zone whose radius contains the point wins, even if a later zone is
//! closer. When nothing matches, the nearest active zone is reported for
//! guidance but the verdict stays outside.

use crate::domain::model::{Coordinate, GeofenceVerdict, RecyclingZone};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

pub const NO_ZONES_MESSAGE: &str = "No recycling zones configured. Contact admin to add locations.";

/// Great-circle distance in meters between two WGS-84 points.
pub fn haversine_distance(from: Coordinate, to: Coordinate) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let d_phi = (to.latitude - from.latitude).to_radians();
    let d_lambda = (to.longitude - from.longitude).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // 超出範圍的經緯度可能讓 a 落在 [0, 1] 之外
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

pub fn evaluate(point: Coordinate, zones: &[RecyclingZone]) -> GeofenceVerdict {
    let active: Vec<&RecyclingZone> = zones.iter().filter(|zone| zone.active).collect();

    if active.is_empty() {
        return GeofenceVerdict::unverified(NO_ZONES_MESSAGE);
    }

    let mut nearest: Option<(&RecyclingZone, f64)> = None;

    for zone in &active {
        let distance = haversine_distance(point, zone.center());

        if distance <= zone.radius_meters {
            return GeofenceVerdict {
                is_inside: true,
                matched_zone_id: Some(zone.id.clone()),
                matched_zone_name: Some(zone.name.clone()),
                distance_meters: Some(distance),
                nearest_zone_name: Some(zone.name.clone()),
                message: format!("You are at {} ({}m away)", zone.name, distance.round()),
            };
        }

        // 座標壞掉 (NaN) 的 zone 不參與最近距離比較
        if distance.is_finite() && nearest.map_or(true, |(_, best)| distance < best) {
            nearest = Some((zone, distance));
        }
    }

    match nearest {
        Some((zone, distance)) => GeofenceVerdict {
            is_inside: false,
            matched_zone_id: None,
            matched_zone_name: None,
            distance_meters: Some(distance),
            nearest_zone_name: Some(zone.name.clone()),
            message: format!(
                "Not at a valid recycling location. Nearest: {} ({}m away)",
                zone.name,
                distance.round()
            ),
        },
        None => GeofenceVerdict {
            message: "Not at a valid recycling location.".to_string(),
            ..GeofenceVerdict::unverified("")
        },
    }
}
