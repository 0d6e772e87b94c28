use geo::HaversineDistance;
use geo::Point;

/// Great-circle distance in meters between two (lat, lon) coordinates.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p1 = Point::new(lon1, lat1);
    let p2 = Point::new(lon2, lat2);
    p1.haversine_distance(&p2)
}

#[cfg(test)]
mod tests {
    use super::haversine_distance;

    #[test]
    fn zero_distance_for_identical_points() {
        assert_eq!(haversine_distance(60.17, 24.94, 60.17, 24.94), 0.0);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = haversine_distance(60.0, 24.9, 61.0, 24.9);
        assert!((d - 111_195.0).abs() < 500.0, "got {d}");
    }
}
