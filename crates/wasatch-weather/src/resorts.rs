//! The fixed set of resorts we report on.

use crate::error::WeatherError;
use crate::types::Location;

pub const ALTA: Location = Location {
    name: "Alta",
    latitude: 40.5883,
    longitude: -111.6358,
    elevation_m: 2600,
};

pub const BRIGHTON: Location = Location {
    name: "Brighton",
    latitude: 40.5977,
    longitude: -111.5836,
    elevation_m: 2669,
};

pub const SNOWBIRD: Location = Location {
    name: "Snowbird",
    latitude: 40.5817,
    longitude: -111.6558,
    elevation_m: 2500,
};

pub const SOLITUDE: Location = Location {
    name: "Solitude",
    latitude: 40.6199,
    longitude: -111.5919,
    elevation_m: 2645,
};

pub const PARK_CITY: Location = Location {
    name: "Park City",
    latitude: 40.6514,
    longitude: -111.5080,
    elevation_m: 2103,
};

pub const DEER_VALLEY: Location = Location {
    name: "Deer Valley",
    latitude: 40.6374,
    longitude: -111.4783,
    elevation_m: 2179,
};

pub const SNOWBASIN: Location = Location {
    name: "Snowbasin",
    latitude: 41.2160,
    longitude: -111.8571,
    elevation_m: 2050,
};

/// All tracked resorts, in fetch order.
pub const RESORTS: [Location; 7] = [
    ALTA,
    BRIGHTON,
    SNOWBIRD,
    SOLITUDE,
    PARK_CITY,
    DEER_VALLEY,
    SNOWBASIN,
];

/// Look up a location by its exact name within `locations`.
pub fn find(locations: &[Location], name: &str) -> Result<Location, WeatherError> {
    locations
        .iter()
        .find(|loc| loc.name == name)
        .copied()
        .ok_or_else(|| WeatherError::UnknownLocation(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_seven_unique_resorts() {
        let names: HashSet<_> = RESORTS.iter().map(|r| r.name).collect();
        assert_eq!(names.len(), 7);
    }

    #[test]
    fn test_find_known_resort() {
        let alta = find(&RESORTS, "Alta").unwrap();
        assert_eq!(alta.latitude, 40.5883);
        assert_eq!(alta.longitude, -111.6358);
        assert_eq!(find(&RESORTS, "Park City").unwrap().elevation_m, 2103);
    }

    #[test]
    fn test_find_is_exact() {
        assert!(matches!(find(&RESORTS, "alta"), Err(WeatherError::UnknownLocation(_))));
        assert!(matches!(
            find(&RESORTS, "Vail"),
            Err(WeatherError::UnknownLocation(ref n)) if n == "Vail"
        ));
    }

    #[test]
    fn test_find_within_custom_set() {
        let subset = [SNOWBIRD, SOLITUDE];
        assert_eq!(find(&subset, "Solitude").unwrap(), SOLITUDE);
        assert!(matches!(find(&subset, "Alta"), Err(WeatherError::UnknownLocation(_))));
    }
}
