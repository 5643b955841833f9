// Deterministic distance math used by the estimation core.

/// Average-speed assumption used to turn a routed duration into a distance.
/// 50 km/h is a deliberate approximation, not a measurement.
const ASSUMED_SPEED_M_PER_S: f64 = 50_000.0 / 3600.0;

pub fn duration_to_distance_m(duration_secs: f64) -> f64 {
    duration_secs * ASSUMED_SPEED_M_PER_S
}

#[cfg(test)]
mod geo_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn it_should_convert_one_hour_to_fifty_kilometres() {
        assert_eq!(duration_to_distance_m(3600.0), 50_000.0);
    }

    #[rstest]
    fn it_should_convert_zero_duration_to_zero_distance() {
        assert_eq!(duration_to_distance_m(0.0), 0.0);
    }
}
