use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlopeError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    #[error("{0}")]
    Render(#[from] RenderError),
}

/// Failure to extract a track from an input file.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("invalid GPX, {0}")]
    Gpx(String),

    #[error("invalid KML, {0}")]
    Kml(String),

    #[error("invalid coordinate {0:?}")]
    Coordinate(String),

    #[error("coordinate out of range, lat: {lat}, lon: {lon}")]
    OutOfRange { lat: f64, lon: f64 },

    #[error("no track points in {0}")]
    NoPoints(PathBuf),
}

/// Failure to look up elevations for a track.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("batch {batch}: {source}")]
    Request {
        batch: usize,
        #[source]
        source: FetchError,
    },

    #[error("batch {batch}: malformed response, {source}")]
    Json {
        batch: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("batch {batch}: response is missing elevation results")]
    MissingResults { batch: usize },

    #[error("expected {expected} elevations, got {got}")]
    CountMismatch { expected: usize, got: usize },

    #[error("{0}")]
    Client(String),
}

/// A single elevation request that did not produce a response body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("http status {0}")]
    Status(u16),

    #[error("{0}")]
    Transport(String),
}

/// Failure to write the styled track.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Kml(String),
}
