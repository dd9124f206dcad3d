//! Process-wide configuration.
//!
//! The only global knob is the geospatial dialect: whether the "within"
//! operator renders as `$geoWithin` (the default) or the legacy `$within`.
//! The flag is read every time a shape is written, never snapshotted into a
//! [`Query`](crate::query::Query). There is no reset on teardown, so test
//! suites that flip it must not run concurrently with suites that depend on it.

use std::sync::atomic::{AtomicBool, Ordering};

static USE_GEO_WITHIN: AtomicBool = AtomicBool::new(true);

/// Returns `true` when `$geoWithin` is emitted, `false` for `$within`.
pub fn use_geo_within() -> bool {
    USE_GEO_WITHIN.load(Ordering::Relaxed)
}

/// Selects the geospatial "within" dialect for every query in the process.
pub fn set_use_geo_within(enabled: bool) {
    tracing::debug!(enabled, "geo within dialect changed");
    USE_GEO_WITHIN.store(enabled, Ordering::Relaxed);
}
