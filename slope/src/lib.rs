//! Colors a GPS track by terrain grade.
//!
//! ```text
//! read_points -> Resolver::resolve -> render -> StyledTrack::write_file
//! ```

mod coord;
mod elevation;
mod error;
mod grade;
mod reader;
mod render;

pub use crate::{
    coord::{Coordinate, ElevatedPoint},
    elevation::{
        locations_param, HttpTransport, Resolver, ResolverConfig, Transport, DEFAULT_ENDPOINT,
        MAX_BATCH,
    },
    error::{FetchError, ParseError, RenderError, ResolutionError, SlopeError},
    grade::{classify, grade, ColorBucket, LINE_WIDTH, MIN_RUN_M},
    reader::{read_gpx, read_kml, read_points, TrackFormat},
    render::{render, StyledSegment, StyledTrack, KML_NS},
};
pub use geo;

use log::info;
use std::path::{Path, PathBuf};

/// Returns `<dir>/<stem>_elev.kml` for `input`.
pub fn output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}_elev.kml"))
}

/// Summary of a completed conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub output: PathBuf,

    /// Number of track points read from the input.
    pub points: usize,

    pub track: StyledTrack,
}

/// Runs the whole pipeline, writing the styled track to `output`.
///
/// Nothing is written unless every stage succeeds.
pub fn convert<T: Transport>(
    input: &Path,
    output: &Path,
    resolver: &Resolver<T>,
) -> Result<Conversion, SlopeError> {
    convert_with_progress(input, output, resolver, |_, _| {})
}

/// Like [convert], calling `progress(processed, total)` after each
/// elevation batch.
pub fn convert_with_progress<T, F>(
    input: &Path,
    output: &Path,
    resolver: &Resolver<T>,
    progress: F,
) -> Result<Conversion, SlopeError>
where
    T: Transport,
    F: FnMut(usize, usize),
{
    let coords = read_points(input)?;
    let points = resolver.resolve_with_progress(&coords, progress)?;
    let track = render(&points);
    track.write_file(output)?;
    info!("saved {}", output.display());
    Ok(Conversion {
        output: output.to_path_buf(),
        points: points.len(),
        track,
    })
}
