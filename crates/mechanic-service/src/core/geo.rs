// Great-circle distance used to shortlist repairs near a mechanic.

use crate::core::repair::Location;

const EARTH_RADIUS_KM: f64 = 6371.0;

pub fn haversine_km(a: Location, b: Location) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod geo_tests {
    use super::*;
    use rstest::rstest;

    const BERLIN: Location = Location {
        longitude: 13.405,
        latitude: 52.52,
    };
    const HAMBURG: Location = Location {
        longitude: 9.993,
        latitude: 53.551,
    };

    #[rstest]
    fn it_should_measure_zero_between_identical_points() {
        assert_eq!(haversine_km(BERLIN, BERLIN), 0.0);
    }

    #[rstest]
    fn it_should_be_symmetric() {
        assert!((haversine_km(BERLIN, HAMBURG) - haversine_km(HAMBURG, BERLIN)).abs() < 1e-9);
    }

    #[rstest]
    fn it_should_measure_berlin_to_hamburg_around_255_km() {
        let distance = haversine_km(BERLIN, HAMBURG);
        assert!((distance - 255.0).abs() < 5.0, "got {distance}");
    }
}
