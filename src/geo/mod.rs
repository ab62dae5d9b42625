pub mod resolver;

use rand::Rng;

use crate::models::partner::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Rough conversion used for jitter math; one degree of latitude is ~111 km.
const KM_PER_DEGREE: f64 = 111.0;

/// Great-circle distance between two points, rounded to 2 decimal places.
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    let km = EARTH_RADIUS_KM * central_angle;
    (km * 100.0).round() / 100.0
}

/// Map viewport zoom for a given span. Bands are checked in ascending order;
/// the first threshold the distance falls under wins.
pub fn zoom_level_for(distance_km: f64) -> u8 {
    const BANDS: [(f64, u8); 10] = [
        (1.0, 16),
        (2.0, 15),
        (5.0, 14),
        (10.0, 13),
        (20.0, 12),
        (50.0, 11),
        (100.0, 10),
        (200.0, 9),
        (500.0, 8),
        (1000.0, 7),
    ];

    for (limit, zoom) in BANDS {
        if distance_km < limit {
            return zoom;
        }
    }
    6
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelMode {
    Walking,
    Bike,
    Scooter,
    Car,
}

/// Estimated minutes to cover `distance_km`, ceiling-rounded. Speeds are
/// flat per-mode averages; anything unrecognized upstream should map to
/// `Bike` before calling.
pub fn travel_time_minutes(distance_km: f64, mode: TravelMode) -> u32 {
    let speed_kmh = match mode {
        TravelMode::Walking => 5.0,
        TravelMode::Bike => 15.0,
        TravelMode::Scooter => 25.0,
        TravelMode::Car => 30.0,
    };

    (distance_km / speed_kmh * 60.0).ceil() as u32
}

/// Uniformly-random point within roughly `radius_km` of `center`. Longitude
/// offset is corrected by cos(lat) so the jitter circle does not squash near
/// the poles.
pub fn jitter_position(center: &GeoPoint, radius_km: f64) -> GeoPoint {
    let mut rng = rand::thread_rng();
    let radius_deg = radius_km / KM_PER_DEGREE;

    let lat_offset = rng.gen_range(-radius_deg..=radius_deg);
    let lng_scale = center.lat.to_radians().cos().max(0.01);
    let lng_offset = rng.gen_range(-radius_deg..=radius_deg) / lng_scale;

    GeoPoint {
        lat: center.lat + lat_offset,
        lng: center.lng + lng_offset,
    }
}

/// Fake route of `num_points` waypoints from `start` to `end`: exact
/// endpoints, interior points linearly interpolated and perturbed. The noise
/// is scaled by sin(ratio * pi) so it vanishes at the endpoints and peaks at
/// the midpoint, and is bounded by min(0.01, direct_deg * 0.005) degrees.
pub fn mock_route(start: &GeoPoint, end: &GeoPoint, num_points: usize) -> Vec<GeoPoint> {
    let mut rng = rand::thread_rng();

    let direct_deg =
        ((end.lat - start.lat).powi(2) + (end.lng - start.lng).powi(2)).sqrt();
    let max_deviation = (direct_deg * 0.005).min(0.01);

    let mut route = Vec::with_capacity(num_points);
    for i in 0..num_points {
        if i == 0 {
            route.push(*start);
            continue;
        }
        if i == num_points - 1 {
            route.push(*end);
            continue;
        }

        let ratio = i as f64 / (num_points - 1) as f64;
        let envelope = (ratio * std::f64::consts::PI).sin();
        let noise = max_deviation * envelope;

        route.push(GeoPoint {
            lat: start.lat + (end.lat - start.lat) * ratio + rng.gen_range(-noise..=noise),
            lng: start.lng + (end.lng - start.lng) * ratio + rng.gen_range(-noise..=noise),
        });
    }

    route
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 12.9716,
            lng: 77.5946,
        };
        assert_eq!(distance_km(&p, &p), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let bangalore = GeoPoint {
            lat: 12.9716,
            lng: 77.5946,
        };
        let mumbai = GeoPoint {
            lat: 19.076,
            lng: 72.8777,
        };
        assert_eq!(
            distance_km(&bangalore, &mumbai),
            distance_km(&mumbai, &bangalore)
        );
    }

    #[test]
    fn bangalore_to_mumbai_is_around_840_km() {
        let bangalore = GeoPoint {
            lat: 12.9716,
            lng: 77.5946,
        };
        let mumbai = GeoPoint {
            lat: 19.076,
            lng: 72.8777,
        };
        let distance = distance_km(&bangalore, &mumbai);
        assert!((distance - 840.0).abs() < 10.0);
    }

    #[test]
    fn zoom_never_increases_with_distance() {
        let samples = [0.5, 1.5, 3.0, 8.0, 15.0, 40.0, 80.0, 150.0, 400.0, 900.0, 2000.0];
        for window in samples.windows(2) {
            assert!(
                zoom_level_for(window[0]) >= zoom_level_for(window[1]),
                "zoom increased between {} and {} km",
                window[0],
                window[1]
            );
        }
    }

    #[test]
    fn zoom_band_edges() {
        assert_eq!(zoom_level_for(0.2), 16);
        assert_eq!(zoom_level_for(1.0), 15);
        assert_eq!(zoom_level_for(999.9), 7);
        assert_eq!(zoom_level_for(1000.0), 6);
    }

    #[test]
    fn travel_time_rounds_up() {
        // 10 km at 15 km/h = 40 minutes exactly.
        assert_eq!(travel_time_minutes(10.0, TravelMode::Bike), 40);
        // 1 km walking = 12 minutes; 1.01 km rounds up to 13.
        assert_eq!(travel_time_minutes(1.01, TravelMode::Walking), 13);
        assert_eq!(travel_time_minutes(10.0, TravelMode::Car), 20);
    }

    #[test]
    fn jitter_stays_near_center() {
        let center = GeoPoint {
            lat: 12.9716,
            lng: 77.5946,
        };
        for _ in 0..100 {
            let p = jitter_position(&center, 5.0);
            // Uniform box jitter can land slightly outside the circle;
            // allow the diagonal of the box.
            assert!(distance_km(&center, &p) <= 5.0 * 1.5);
        }
    }

    #[test]
    fn mock_route_has_exact_endpoints_and_bounded_deviation() {
        let start = GeoPoint {
            lat: 12.9716,
            lng: 77.5946,
        };
        let end = GeoPoint {
            lat: 13.0827,
            lng: 80.2707,
        };

        let route = mock_route(&start, &end, 8);
        assert_eq!(route.len(), 8);
        assert_eq!(route[0], start);
        assert_eq!(route[7], end);

        let direct_deg =
            ((end.lat - start.lat).powi(2) + (end.lng - start.lng).powi(2)).sqrt();
        let bound = (direct_deg * 0.005).min(0.01);

        for (i, point) in route.iter().enumerate() {
            let ratio = i as f64 / 7.0;
            let expected_lat = start.lat + (end.lat - start.lat) * ratio;
            let expected_lng = start.lng + (end.lng - start.lng) * ratio;
            assert!((point.lat - expected_lat).abs() <= bound + 1e-9);
            assert!((point.lng - expected_lng).abs() <= bound + 1e-9);
        }
    }

    #[test]
    fn mock_route_two_points_is_just_the_endpoints() {
        let start = GeoPoint { lat: 1.0, lng: 1.0 };
        let end = GeoPoint { lat: 2.0, lng: 2.0 };
        let route = mock_route(&start, &end, 2);
        assert_eq!(route, vec![start, end]);
    }
}
