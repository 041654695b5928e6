//! GeoJSON normalization for event payloads.
//!
//! A payload may carry a ready `geometry`, only a `location {lat, lon}`, or
//! nothing. The result is a GeoJSON Feature whose geometry has been validated.
//! Normalizing an already normalized Feature returns the same geometry.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GeoOutcome {
    Success {
        geojson: Value,
        geometry_type: String,
        timestamp: String,
    },
    Warning {
        message: String,
    },
    Error {
        message: String,
    },
}

impl GeoOutcome {
    pub fn geometry(&self) -> Option<&Value> {
        match self {
            GeoOutcome::Success { geojson, .. } => geojson.get("geometry"),
            _ => None,
        }
    }
}

pub fn normalize_to_geojson(payload: &Value) -> GeoOutcome {
    let geometry = match payload.get("geometry").filter(|g| !g.is_null()) {
        Some(g) => g.clone(),
        None => match point_from_location(payload.get("location")) {
            Some(point) => point,
            None => {
                return GeoOutcome::Warning {
                    message: "No geometry data available for GeoJSON conversion".into(),
                }
            }
        },
    };

    if let Err(reason) = validate_geometry(&geometry) {
        tracing::warn!(%reason, "geo: invalid geometry");
        return GeoOutcome::Error {
            message: format!("Invalid GeoJSON generated: {reason}"),
        };
    }

    let now = Utc::now().to_rfc3339();
    let existing = payload
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut properties = existing.clone();
    properties.insert(
        "timestamp".into(),
        carried(payload, &existing, "timestamp").unwrap_or_else(|| json!(now)),
    );
    properties.insert(
        "source".into(),
        carried(payload, &existing, "source").unwrap_or_else(|| json!("unknown")),
    );
    properties.insert(
        "event_type".into(),
        carried(payload, &existing, "event_type").unwrap_or_else(|| json!("unknown")),
    );

    let geometry_type = geometry
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    GeoOutcome::Success {
        geojson: json!({
            "type": "Feature",
            "geometry": geometry,
            "properties": properties,
        }),
        geometry_type,
        timestamp: now,
    }
}

/// A top-level field of the payload, else the same key already in properties.
fn carried(payload: &Value, properties: &Map<String, Value>, key: &str) -> Option<Value> {
    payload
        .get(key)
        .filter(|v| !v.is_null())
        .or_else(|| properties.get(key))
        .cloned()
}

fn point_from_location(location: Option<&Value>) -> Option<Value> {
    let location = location?;
    let lat = location.get("lat")?.as_f64()?;
    let lon = location.get("lon")?.as_f64()?;
    Some(json!({"type": "Point", "coordinates": [lon, lat]}))
}

/// Structural GeoJSON geometry check (RFC 7946 section 3.1).
pub fn validate_geometry(geometry: &Value) -> Result<(), String> {
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or("geometry has no type")?;

    if kind == "GeometryCollection" {
        let members = geometry
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or("GeometryCollection has no geometries")?;
        return members.iter().try_for_each(validate_geometry);
    }

    let coords = geometry
        .get("coordinates")
        .ok_or_else(|| format!("{kind} has no coordinates"))?;

    match kind {
        "Point" => position(coords),
        "MultiPoint" => each(coords, position),
        "LineString" => line(coords),
        "MultiLineString" => each(coords, line),
        "Polygon" => polygon(coords),
        "MultiPolygon" => each(coords, polygon),
        other => Err(format!("unknown geometry type {other}")),
    }
}

fn each(value: &Value, check: fn(&Value) -> Result<(), String>) -> Result<(), String> {
    value
        .as_array()
        .ok_or("expected an array")?
        .iter()
        .try_for_each(check)
}

fn position(value: &Value) -> Result<(), String> {
    let parts = value.as_array().ok_or("position is not an array")?;
    if !(2..=3).contains(&parts.len()) {
        return Err(format!("position has {} elements", parts.len()));
    }
    let nums: Vec<f64> = parts
        .iter()
        .map(|p| p.as_f64().filter(|n| n.is_finite()))
        .collect::<Option<_>>()
        .ok_or("position has a non-numeric element")?;
    let (lon, lat) = (nums[0], nums[1]);
    if !(-180.0..=180.0).contains(&lon) {
        return Err(format!("longitude {lon} out of range"));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("latitude {lat} out of range"));
    }
    Ok(())
}

fn line(value: &Value) -> Result<(), String> {
    let points = value.as_array().ok_or("line is not an array")?;
    if points.len() < 2 {
        return Err("line needs at least two positions".into());
    }
    points.iter().try_for_each(position)
}

fn polygon(value: &Value) -> Result<(), String> {
    let rings = value.as_array().ok_or("polygon is not an array")?;
    if rings.is_empty() {
        return Err("polygon has no rings".into());
    }
    for ring in rings {
        let points = ring.as_array().ok_or("ring is not an array")?;
        if points.len() < 4 {
            return Err("ring needs at least four positions".into());
        }
        points.iter().try_for_each(position)?;
        if points.first() != points.last() {
            return Err("ring is not closed".into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_becomes_lon_lat_point() {
        let outcome = normalize_to_geojson(&json!({
            "source": "FRED",
            "event_type": "economic_indicator",
            "location": {"lat": 39.8283, "lon": -98.5795}
        }));
        let GeoOutcome::Success { geojson, geometry_type, .. } = outcome else {
            panic!("expected success");
        };
        assert_eq!(geometry_type, "Point");
        assert_eq!(geojson["geometry"]["coordinates"], json!([-98.5795, 39.8283]));
        assert_eq!(geojson["properties"]["source"], "FRED");
    }

    #[test]
    fn no_location_is_a_warning() {
        let outcome = normalize_to_geojson(&json!({"source": "GDELT", "location": null}));
        assert!(matches!(outcome, GeoOutcome::Warning { .. }));
    }

    #[test]
    fn missing_names_default_to_unknown() {
        let outcome = normalize_to_geojson(&json!({"location": {"lat": 1.0, "lon": 2.0}}));
        let GeoOutcome::Success { geojson, .. } = outcome else {
            panic!("expected success");
        };
        assert_eq!(geojson["properties"]["source"], "unknown");
        assert_eq!(geojson["properties"]["event_type"], "unknown");
    }

    #[test]
    fn out_of_range_coordinates_are_errors() {
        let outcome = normalize_to_geojson(&json!({"location": {"lat": 95.0, "lon": 10.0}}));
        assert!(matches!(outcome, GeoOutcome::Error { .. }));
    }

    #[test]
    fn open_ring_is_an_error() {
        let outcome = normalize_to_geojson(&json!({
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]]
            }
        }));
        assert!(matches!(outcome, GeoOutcome::Error { .. }));
    }

    #[test]
    fn renormalizing_keeps_geometry_and_properties() {
        let first = normalize_to_geojson(&json!({
            "source": "NOAA",
            "event_type": "weather_flood_warning",
            "timestamp": "2025-03-01T12:00:00+00:00",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
            }
        }));
        let GeoOutcome::Success { geojson, .. } = &first else {
            panic!("expected success");
        };
        let second = normalize_to_geojson(geojson);

        assert_eq!(first.geometry(), second.geometry());
        let GeoOutcome::Success { geojson: again, .. } = &second else {
            panic!("expected success");
        };
        assert_eq!(again["properties"], geojson["properties"]);
    }

    #[test]
    fn geometry_collection_checks_members() {
        let ok = json!({
            "type": "GeometryCollection",
            "geometries": [{"type": "Point", "coordinates": [1.0, 2.0]}]
        });
        assert!(validate_geometry(&ok).is_ok());

        let bad = json!({
            "type": "GeometryCollection",
            "geometries": [{"type": "LineString", "coordinates": [[1.0, 2.0]]}]
        });
        assert!(validate_geometry(&bad).is_err());
    }
}
