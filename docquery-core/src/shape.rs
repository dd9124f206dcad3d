//! Structural predicates over BSON values.
//!
//! Calls that accept several argument shapes decide between them with these
//! pure functions instead of inspecting concrete types at each call site.

use bson::{Bson, Document};

/// Loose truthiness: `null`, `false`, zero, `NaN` and the empty string are falsy.
pub fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => false,
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0 && !n.is_nan(),
        Bson::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// `0` or `false`, the markers of an exclusion in a projection.
pub fn is_exclusion_marker(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => !*b,
        Bson::Int32(n) => *n == 0,
        Bson::Int64(n) => *n == 0,
        Bson::Double(n) => *n == 0.0,
        _ => false,
    }
}

pub fn is_number(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

pub fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

pub fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(*n as i64),
        Bson::Int64(n) => Some(*n),
        Bson::Double(n) if n.fract() == 0.0 => Some(*n as i64),
        _ => None,
    }
}

pub fn is_operator_key(key: &str) -> bool {
    key.starts_with('$')
}

/// Has a string `type` and an array of `coordinates`.
pub fn looks_like_geojson(value: &Bson) -> bool {
    match value {
        Bson::Document(doc) => {
            matches!(doc.get("type"), Some(Bson::String(_)))
                && matches!(doc.get("coordinates"), Some(Bson::Array(_)))
        }
        _ => false,
    }
}

/// A GeoJSON point, the only geometry `$near` accepts.
pub fn looks_like_geojson_point(value: &Bson) -> bool {
    match value {
        Bson::Document(doc) => {
            matches!(doc.get("type"), Some(Bson::String(t)) if t == "Point")
                && matches!(doc.get("coordinates"), Some(Bson::Array(_)))
        }
        _ => false,
    }
}

/// A truthy `center` and a `radius` key.
pub fn has_center_and_radius(doc: &Document) -> bool {
    doc.get("center").is_some_and(is_truthy) && doc.contains_key("radius")
}

pub fn has_key(value: &Bson, key: &str) -> bool {
    matches!(value, Bson::Document(doc) if doc.contains_key(key))
}

/// A `{ $meta: ... }` projection or sort descriptor.
pub fn is_meta_descriptor(value: &Bson) -> bool {
    matches!(value, Bson::Document(doc) if doc.contains_key("$meta"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{bson, doc};

    #[test]
    fn truthiness_follows_loose_rules() {
        for falsy in [Bson::Null, bson!(false), bson!(0), bson!(0i64), bson!(0.0), bson!(f64::NAN), bson!("")] {
            assert!(!is_truthy(&falsy), "{falsy:?} should be falsy");
        }
        for truthy in [bson!(true), bson!(1), bson!(-1i64), bson!("0"), bson!([]), bson!({})] {
            assert!(is_truthy(&truthy), "{truthy:?} should be truthy");
        }
    }

    #[test]
    fn geojson_requires_type_and_coordinates() {
        assert!(looks_like_geojson(&bson!({ "type": "Polygon", "coordinates": [[1, 2]] })));
        assert!(!looks_like_geojson(&bson!({ "type": "Polygon" })));
        assert!(!looks_like_geojson(&bson!({ "coordinates": [1, 2] })));
        assert!(!looks_like_geojson(&bson!({ "type": 3, "coordinates": [1, 2] })));
        assert!(!looks_like_geojson(&Bson::Null));
        assert!(looks_like_geojson_point(&bson!({ "type": "Point", "coordinates": [1, 2] })));
        assert!(!looks_like_geojson_point(&bson!({ "type": "LineString", "coordinates": [[1, 2]] })));
    }

    #[test]
    fn circle_needs_center_and_radius() {
        assert!(has_center_and_radius(&doc! { "center": [1, 2], "radius": 3 }));
        assert!(!has_center_and_radius(&doc! { "center": 1 }));
        assert!(!has_center_and_radius(&doc! { "radius": 1 }));
        assert!(!has_center_and_radius(&doc! { "center": Bson::Null, "radius": 1 }));
    }

    #[test]
    fn exclusion_markers() {
        assert!(is_exclusion_marker(&bson!(0)));
        assert!(is_exclusion_marker(&bson!(false)));
        assert!(!is_exclusion_marker(&bson!(1)));
        assert!(!is_exclusion_marker(&bson!({ "$slice": 0 })));
    }
}
