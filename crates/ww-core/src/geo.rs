//! Great-circle distance and map deep links.

use crate::models::Coordinate;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Minimum separation between two bins, roughly 20 feet.
pub const DEFAULT_DUPLICATE_RADIUS_M: f64 = 6.0;

/// Haversine surface distance between two coordinates, in meters.
///
/// Out-of-range input is not rejected; it simply yields a meaningless (or NaN)
/// result. Validate with [`Coordinate::is_valid`] first where that matters.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let sin_dlat_half = (dlat / 2.0).sin();
    let sin_dlon_half = (dlon / 2.0).sin();
    let h = sin_dlat_half.mul_add(
        sin_dlat_half,
        lat1.cos() * lat2.cos() * sin_dlon_half * sin_dlon_half,
    );
    // Rounding can push h a hair past 1.0 for antipodal points. `f64::min`
    // would swallow NaN, so clamp by hand.
    let root = h.sqrt();
    let root = if root > 1.0 { 1.0 } else { root };
    let c = 2.0 * root.asin();

    EARTH_RADIUS_KM * c * 1000.0
}

impl Coordinate {
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance_meters(*self, *other)
    }
}

/// Builds a turn-by-turn deep link, e.g. `http://maps.apple.com/?daddr=1.5,2.5`.
pub fn navigation_url(base: &str, destination: Coordinate) -> String {
    format!(
        "{}?daddr={},{}",
        base,
        destination.latitude,
        destination.longitude
    )
}
