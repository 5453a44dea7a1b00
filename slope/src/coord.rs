use crate::error::ParseError;
use geo::geometry::Point;

/// A WGS-84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    /// Returns a coordinate, or an error if either component is not
    /// a valid latitude/longitude.
    pub fn new(lat: f64, lon: f64) -> Result<Self, ParseError> {
        if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
            Ok(Self { lat, lon })
        } else {
            Err(ParseError::OutOfRange { lat, lon })
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Returns this coordinate as a geo point (`x` = longitude).
    pub fn point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// A [Coordinate] with its resolved elevation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevatedPoint {
    pub coord: Coordinate,

    /// Meters above sea level.
    pub elevation: f64,
}

impl ElevatedPoint {
    pub fn new(coord: Coordinate, elevation: f64) -> Self {
        Self { coord, elevation }
    }
}
