//! Geospatial operators.
//!
//! `within`, `intersects` and `near` record which geo comparison is active so a
//! following [`Query::geometry`] knows which operator to wrap the GeoJSON in.
//! Shape helpers (`box_`, `polygon`, `circle`) always write under the "within"
//! operator, whose name depends on [`config::use_geo_within`].

use bson::{Bson, Document};
use serde::Serialize;

use crate::{
    args::Args,
    config,
    error::{QueryError, QueryResult},
    query::Query,
    shape,
};

/// The geo comparison recorded by an entry call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GeoOperator {
    Within,
    Intersects,
    Near,
    NearSphere,
}

impl GeoOperator {
    /// The operator key, resolved against the current dialect.
    pub fn key(&self) -> &'static str {
        match self {
            GeoOperator::Within => within_key(),
            GeoOperator::Intersects => "$geoIntersects",
            GeoOperator::Near => "$near",
            GeoOperator::NearSphere => "$nearSphere",
        }
    }
}

fn within_key() -> &'static str {
    if config::use_geo_within() { "$geoWithin" } else { "$within" }
}

fn invalid() -> QueryError {
    QueryError::invalid("Invalid argument")
}

impl Query {
    /// Runs `apply` with `op` recorded as the active geo comparison, restoring
    /// the previous comparison if it fails.
    fn with_geo_comparison<F>(&mut self, op: GeoOperator, apply: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Self) -> QueryResult<()>,
    {
        let previous = self.spec.geo_comparison.replace(op);

        match apply(self) {
            Ok(()) => Ok(self),
            Err(err) => {
                self.spec.geo_comparison = previous;
                Err(err)
            }
        }
    }

    /// `$geoWithin` (or `$within`) on the active path.
    ///
    /// Dispatches on its arguments:
    ///
    /// * none: only records the comparison for a following [`Query::geometry`]
    /// * two points: [`Query::box_`]
    /// * more than two points: [`Query::polygon`]
    /// * one document with `center`, `box` or `polygon`, or a GeoJSON object
    ///
    /// # Errors
    ///
    /// [`QueryError::Usage`] without an active path, [`QueryError::InvalidArgument`]
    /// for a single argument of unrecognized shape.
    pub fn within(&mut self, args: &[Bson]) -> QueryResult<&mut Self> {
        self.resolve_path(None, "within")?;

        self.with_geo_comparison(GeoOperator::Within, |query| match args {
            [] => Ok(()),
            [area] => query.within_area(area),
            [_, _] => query.box_(args).map(|_| ()),
            _ => query.polygon(args).map(|_| ()),
        })
    }

    /// Alias of [`Query::within`].
    pub fn geo_within(&mut self, args: &[Bson]) -> QueryResult<&mut Self> {
        self.within(args)
    }

    fn within_area(&mut self, area: &Bson) -> QueryResult<()> {
        let Bson::Document(doc) = area else {
            return Err(invalid());
        };

        if doc.get("center").is_some_and(shape::is_truthy) {
            self.circle(&[area.clone()])?;
        } else if let Some(corners) = doc.get("box") {
            self.box_(&spread(corners))?;
        } else if let Some(points) = doc.get("polygon") {
            self.polygon(&spread(points))?;
        } else if shape::looks_like_geojson(area) {
            self.geometry(area.clone())?;
        } else {
            return Err(invalid());
        }

        Ok(())
    }

    /// Writes `{ $geoWithin: { $box: [lower_left, upper_right] } }`.
    ///
    /// Accepts `[corner, corner]` for the active path or `["path", corner, corner]`.
    pub fn box_(&mut self, args: &[Bson]) -> QueryResult<&mut Self> {
        let (path, corners) = match Args::split(args, 2) {
            Args::Bare(corners @ [_, _]) => (self.resolve_path(None, "box")?, corners),
            Args::WithPath(path, corners @ [_, _]) => (path.to_string(), corners),
            _ => return Err(invalid()),
        };

        let mut shape = Document::new();
        shape.insert("$box", corners.to_vec());
        self.set_operator(&path, within_key(), Bson::Document(shape));
        Ok(self)
    }

    /// Writes `{ $geoWithin: { $polygon: [points...] } }`. A leading string
    /// is the path, otherwise the active path is used.
    pub fn polygon(&mut self, args: &[Bson]) -> QueryResult<&mut Self> {
        let split = Args::split(args, 0);
        let points = split.values();

        if points.len() < 2 {
            return Err(QueryError::invalid("polygon() requires at least two points"));
        }

        let path = self.resolve_path(split.path(), "polygon")?;
        let mut shape = Document::new();
        shape.insert("$polygon", points.to_vec());
        self.set_operator(&path, within_key(), Bson::Document(shape));
        Ok(self)
    }

    /// Writes `{ $geoWithin: { $center: [center, radius] } }`, or
    /// `$centerSphere` when the descriptor has `spherical: true`.
    ///
    /// Accepts `[descriptor]` for the active path or `["path", descriptor]`.
    /// A `unique` key in the descriptor is copied to `$uniqueDocs`.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidArgument`] when `center` or `radius` is missing.
    pub fn circle(&mut self, args: &[Bson]) -> QueryResult<&mut Self> {
        self.write_circle(args, false)
    }

    /// Like [`Query::circle`] but always spherical.
    pub fn center_sphere(&mut self, args: &[Bson]) -> QueryResult<&mut Self> {
        self.write_circle(args, true)
    }

    fn write_circle(&mut self, args: &[Bson], force_spherical: bool) -> QueryResult<&mut Self> {
        let (path, value) = match args {
            [value] => (self.resolve_path(None, "circle")?, value),
            [Bson::String(path), value] => (path.clone(), value),
            _ => return Err(invalid()),
        };

        let descriptor = match value {
            Bson::Document(doc) if shape::has_center_and_radius(doc) => doc,
            _ => return Err(QueryError::invalid("center and radius are required")),
        };

        let spherical = force_spherical || descriptor.get("spherical").is_some_and(shape::is_truthy);
        let center = descriptor.get("center").cloned().unwrap_or(Bson::Null);
        let radius = descriptor.get("radius").cloned().unwrap_or(Bson::Null);

        let mut circle = Document::new();
        circle.insert(if spherical { "$centerSphere" } else { "$center" }, vec![center, radius]);
        if let Some(unique) = descriptor.get("unique") {
            circle.insert("$uniqueDocs", shape::is_truthy(unique));
        }

        self.set_operator(&path, within_key(), Bson::Document(circle));
        Ok(self)
    }

    /// Wraps a GeoJSON object under the active geo comparison:
    /// `{ <comparison>: { $geometry: geometry } }`.
    ///
    /// # Errors
    ///
    /// [`QueryError::Usage`] when no `within`, `intersects` or `near` call
    /// preceded it or no path is active, [`QueryError::InvalidArgument`] when
    /// `geometry` lacks a `type` or a `coordinates` array.
    pub fn geometry(&mut self, geometry: impl Into<Bson>) -> QueryResult<&mut Self> {
        let Some(comparison) = self.spec.geo_comparison else {
            return Err(QueryError::Usage(
                "geometry() must come after `within()`, `intersects()`, or `near()`".into(),
            ));
        };

        let path = self.resolve_path(None, "geometry")?;
        let geometry = geometry.into();
        if !shape::looks_like_geojson(&geometry) {
            return Err(invalid());
        }

        let mut wrapped = Document::new();
        wrapped.insert("$geometry", geometry);
        self.set_operator(&path, comparison.key(), Bson::Document(wrapped));
        Ok(self)
    }

    /// `$geoIntersects` on the active path. With a GeoJSON argument this is
    /// `intersects` followed by [`Query::geometry`].
    pub fn intersects(&mut self, geometry: Option<Bson>) -> QueryResult<&mut Self> {
        self.resolve_path(None, "intersects")?;

        self.with_geo_comparison(GeoOperator::Intersects, |query| match geometry {
            None => Ok(()),
            Some(geometry) if shape::looks_like_geojson(&geometry) => {
                query.geometry(geometry).map(|_| ())
            }
            Some(_) => Err(invalid()),
        })
    }

    /// `$near` (or `$nearSphere` with `spherical: true`).
    ///
    /// Accepts no arguments (records the comparison for [`Query::geometry`]),
    /// `[descriptor]` for the active path, or `["path", descriptor]`. The
    /// descriptor holds a mandatory `center` and optional `spherical`,
    /// `maxDistance` and `minDistance`.
    ///
    /// A legacy coordinate pair center yields sibling distance operators:
    /// `{ $near: [x, y], $maxDistance: d }`. A GeoJSON point center nests them:
    /// `{ $near: { $geometry: point, $maxDistance: d } }`.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidArgument`] for more than two arguments or a
    /// GeoJSON center that is not a point, [`QueryError::Usage`] without a
    /// resolvable path or without a `center`.
    pub fn near(&mut self, args: &[Bson]) -> QueryResult<&mut Self> {
        self.write_near(args, false)
    }

    /// Like [`Query::near`] but always spherical.
    pub fn near_sphere(&mut self, args: &[Bson]) -> QueryResult<&mut Self> {
        self.write_near(args, true)
    }

    fn write_near(&mut self, args: &[Bson], force_spherical: bool) -> QueryResult<&mut Self> {
        let comparison = if force_spherical { GeoOperator::NearSphere } else { GeoOperator::Near };

        let (path, value) = match args {
            [] => {
                self.resolve_path(None, "near")?;
                return self.with_geo_comparison(comparison, |_| Ok(()));
            }
            [value] => (self.resolve_path(None, "near")?, value),
            [Bson::String(path), value] => (path.clone(), value),
            _ => return Err(invalid()),
        };

        let descriptor = match value {
            Bson::Document(doc) => doc.clone(),
            _ => Document::new(),
        };
        let Some(center) = descriptor.get("center").filter(|c| shape::is_truthy(c)).cloned() else {
            return Err(QueryError::Usage("center is required".into()));
        };

        let spherical = force_spherical || descriptor.get("spherical").is_some_and(shape::is_truthy);
        let operator = if spherical { GeoOperator::NearSphere } else { GeoOperator::Near };

        self.with_geo_comparison(comparison, |query| {
            match center {
                Bson::Array(_) => {
                    query.set_operator(&path, operator.key(), center);
                    for (key, distance) in distances(&descriptor) {
                        query.set_operator(&path, key, distance.clone());
                    }
                }
                point if shape::looks_like_geojson_point(&point) => {
                    let mut near = Document::new();
                    near.insert("$geometry", point);
                    for (key, distance) in distances(&descriptor) {
                        near.insert(key, distance.clone());
                    }
                    query.set_operator(&path, operator.key(), Bson::Document(near));
                }
                _ => {
                    return Err(QueryError::invalid(format!(
                        "Invalid GeoJSON specified for {}",
                        operator.key()
                    )));
                }
            }
            Ok(())
        })
    }
}

/// The `$maxDistance`/`$minDistance` bounds set on a near descriptor. Null
/// counts as unset.
fn distances(descriptor: &Document) -> impl Iterator<Item = (&'static str, &Bson)> {
    [("maxDistance", "$maxDistance"), ("minDistance", "$minDistance")]
        .into_iter()
        .filter_map(move |(key, operator)| match descriptor.get(key) {
            None | Some(Bson::Null) => None,
            Some(distance) => Some((operator, distance)),
        })
}

/// Spreads an array value into positional arguments.
fn spread(value: &Bson) -> Vec<Bson> {
    match value {
        Bson::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}
