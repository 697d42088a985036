//! Spherical geometry shared by the index, the matcher and the aggregator.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Projects a latitude/longitude pair (degrees) onto an Earth-sized sphere
/// centered at the origin.
///
/// Euclidean distance between two projected points is the chord length,
/// which matches the great-circle distance to well under a millimeter at
/// the tens-of-meters scale used for matching.
pub fn to_cartesian(lat: f64, lng: f64) -> [f64; 3] {
    let phi = lat.to_radians();
    let theta = lng.to_radians();
    [
        EARTH_RADIUS_M * phi.cos() * theta.cos(),
        EARTH_RADIUS_M * phi.cos() * theta.sin(),
        EARTH_RADIUS_M * phi.sin(),
    ]
}

/// Great-circle distance in meters between two points given in degrees.
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (lat1, lng1, lat2, lng2) = (
        lat1.to_radians(),
        lng1.to_radians(),
        lat2.to_radians(),
        lng2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Speed in km/h for `meters` covered in `seconds`.
pub fn speed_kmh(meters: f64, seconds: f64) -> f64 {
    (meters / 1000.0) / (seconds / 3600.0)
}

/// Rounds to one decimal place, correctly rounded against the exact binary
/// value with ties to even.
///
/// `0.15` is stored just below the midpoint and rounds to `0.1`; `1.25` is an
/// exact tie and rounds to `1.2`.
pub fn round1(value: f64) -> f64 {
    let scaled = value * 10.0;
    // Exact error of the multiplication.
    let residual = value.mul_add(10.0, -scaled);
    let floor = scaled.floor();

    let rounded = if scaled - floor != 0.5 {
        scaled.round()
    } else if residual > 0.0 {
        floor + 1.0
    } else if residual < 0.0 {
        floor
    } else {
        scaled.round_ties_even()
    };
    rounded / 10.0
}
