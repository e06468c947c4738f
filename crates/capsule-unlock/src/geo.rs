use capsule_types::models::GeoPoint;

/// Mean Earth radius used for every distance in the system.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine great-circle distance between two points, in meters.
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    // Absolute deltas keep the result bit-identical when a and b swap.
    let d_phi = (b.latitude - a.latitude).abs().to_radians();
    let d_lambda = (b.longitude - a.longitude).abs().to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// True when `a` is within `threshold_meters` of `b`, boundary included.
pub fn is_near(a: GeoPoint, b: GeoPoint, threshold_meters: f64) -> bool {
    distance_meters(a, b) <= threshold_meters
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn point() -> impl Strategy<Value = GeoPoint> {
        (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lon)| GeoPoint::new(lat, lon))
    }

    #[test]
    fn zero_for_identical_points() {
        let p = GeoPoint::new(40.0, -74.0);
        assert_eq!(distance_meters(p, p), 0.0);
    }

    #[test]
    fn one_degree_of_latitude() {
        // 2 * pi * R / 360
        let d = distance_meters(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!((d - 111_194.93).abs() < 1.0, "got {d}");
    }

    #[test]
    fn antipodes_are_half_the_circumference() {
        let d = distance_meters(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1e-3);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let a = GeoPoint::new(40.0, -74.0);
        let b = GeoPoint::new(40.0005, -74.0);
        let d = distance_meters(a, b);
        assert!(is_near(a, b, d));
        assert!(!is_near(a, b, d - 0.001));
    }

    proptest! {
        #[test]
        fn distance_is_symmetric(a in point(), b in point()) {
            prop_assert_eq!(distance_meters(a, b), distance_meters(b, a));
        }

        #[test]
        fn distance_to_self_is_zero(a in point()) {
            prop_assert_eq!(distance_meters(a, a), 0.0);
        }

        #[test]
        fn is_near_matches_distance(a in point(), b in point(), r in 0.0f64..25_000_000.0) {
            prop_assert_eq!(is_near(a, b, r), distance_meters(a, b) <= r);
        }

        #[test]
        fn grows_with_separation_along_a_meridian(
            lat in -80.0f64..0.0,
            near in 0.001f64..40.0,
            extra in 0.001f64..40.0,
        ) {
            let origin = GeoPoint::new(lat, 10.0);
            let closer = GeoPoint::new(lat + near, 10.0);
            let farther = GeoPoint::new(lat + near + extra, 10.0);
            prop_assert!(distance_meters(origin, closer) < distance_meters(origin, farther));
        }
    }
}
