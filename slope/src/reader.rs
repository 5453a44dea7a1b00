//! Track point extraction.
//!
//! `.gpx` files are read with the [gpx] crate; every other file is
//! treated as KML. Track and segment boundaries are not preserved,
//! all points are concatenated in file order.

use crate::{coord::Coordinate, error::ParseError};
use geo::{CoordsIter, GeometryCollection};
use kml::{
    types::{Element, Geometry},
    Kml,
};
use log::info;
use quick_xml::{events::Event, Reader};
use std::{
    ffi::OsStr,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFormat {
    Gpx,
    Kml,
}

impl TrackFormat {
    /// Selects a format by file suffix.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(OsStr::to_str) {
            Some(ext) if ext.eq_ignore_ascii_case("gpx") => Self::Gpx,
            _ => Self::Kml,
        }
    }
}

/// Returns the ordered track points in the file at `path`.
///
/// Never returns an empty vector.
pub fn read_points<P: AsRef<Path>>(path: P) -> Result<Vec<Coordinate>, ParseError> {
    let path = path.as_ref();
    let format = TrackFormat::from_path(path);
    let rdr = BufReader::new(File::open(path)?);
    let points = match format {
        TrackFormat::Gpx => read_gpx(rdr)?,
        TrackFormat::Kml => read_kml(rdr)?,
    };
    if points.is_empty() {
        return Err(ParseError::NoPoints(path.to_path_buf()));
    }
    info!("{format:?}: {} points", points.len());
    Ok(points)
}

/// Flattens every track segment's points, in order.
pub fn read_gpx<R: Read>(rdr: R) -> Result<Vec<Coordinate>, ParseError> {
    let gpx = gpx::read(rdr).map_err(|e| ParseError::Gpx(e.to_string()))?;
    let mut points = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for waypoint in segment.points {
                let point = waypoint.point();
                points.push(Coordinate::new(point.y(), point.x())?);
            }
        }
    }
    Ok(points)
}

/// Reads `gx:coord` track points if the document has any, otherwise
/// the points of all `<coordinates>` blocks.
pub fn read_kml<R: Read>(mut rdr: R) -> Result<Vec<Coordinate>, ParseError> {
    let mut contents = String::new();
    rdr.read_to_string(&mut contents)?;
    check_well_formed(&contents)?;
    let kml: Kml<f64> = contents
        .parse()
        .map_err(|e: kml::Error| ParseError::Kml(e.to_string()))?;

    let mut extended = Vec::new();
    find_extended(&kml, &mut extended);
    if extended.is_empty() {
        standard_points(kml)
    } else {
        extended.into_iter().map(parse_extended).collect()
    }
}

/// Rejects documents that are not well-formed XML.
///
/// The KML reader does not treat a premature end of input as an
/// error, and can loop forever on a truncated `<Placemark>`.
fn check_well_formed(contents: &str) -> Result<(), ParseError> {
    let mut reader = Reader::from_str(contents);
    let mut depth = 0_usize;
    let mut has_root = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                depth += 1;
                has_root = true;
            }
            Ok(Event::Empty(_)) => has_root = true,
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ParseError::Kml(format!(
                    "{e} at byte {}",
                    reader.buffer_position()
                )))
            }
        }
    }
    if !has_root {
        return Err(ParseError::Kml("no root element".to_string()));
    }
    if depth > 0 {
        return Err(ParseError::Kml(format!(
            "unexpected end of document, {depth} unclosed element(s)"
        )));
    }
    Ok(())
}

fn find_extended<'a>(kml: &'a Kml<f64>, out: &mut Vec<&'a str>) {
    match kml {
        Kml::KmlDocument(doc) => {
            for elem in &doc.elements {
                find_extended(elem, out);
            }
        }
        Kml::Document { elements, .. } | Kml::Folder { elements, .. } => {
            for elem in elements {
                find_extended(elem, out);
            }
        }
        Kml::Placemark(placemark) => {
            if let Some(Geometry::Element(elem)) = &placemark.geometry {
                find_coord_elements(elem, out);
            }
            for child in &placemark.children {
                find_coord_elements(child, out);
            }
        }
        Kml::Element(elem) => find_coord_elements(elem, out),
        _ => {}
    }
}

fn find_coord_elements<'a>(elem: &'a Element, out: &mut Vec<&'a str>) {
    let local_name = elem.name.rsplit(':').next().unwrap_or_default();
    if local_name == "coord" {
        out.push(elem.content.as_deref().unwrap_or_default());
    }
    for child in &elem.children {
        find_coord_elements(child, out);
    }
}

/// Parses a space separated `lon lat [alt]` triple.
fn parse_extended(token: &str) -> Result<Coordinate, ParseError> {
    let mut fields = token.split_whitespace().map(str::parse::<f64>);
    match (fields.next(), fields.next()) {
        (Some(Ok(lon)), Some(Ok(lat))) => Coordinate::new(lat, lon),
        _ => Err(ParseError::Coordinate(token.to_string())),
    }
}

fn standard_points(kml: Kml<f64>) -> Result<Vec<Coordinate>, ParseError> {
    let collection =
        GeometryCollection::<f64>::try_from(kml).map_err(|e| ParseError::Kml(e.to_string()))?;
    collection
        .coords_iter()
        .map(|coord| Coordinate::new(coord.y, coord.x))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{read_gpx, read_kml, read_points, TrackFormat};
    use crate::error::ParseError;
    use std::{io::Write, path::Path};

    const GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="slope" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <trkseg>
      <trkpt lat="46.5000" lon="7.9000"><ele>1200</ele></trkpt>
      <trkpt lat="46.5010" lon="7.9010"><ele>1210</ele></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="46.5020" lon="7.9020"></trkpt>
    </trkseg>
  </trk>
  <trk>
    <trkseg>
      <trkpt lat="46.5030" lon="7.9030"></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    const KML_EXTENDED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2" xmlns:gx="http://www.google.com/kml/ext/2.2">
<Document>
  <Placemark>
    <name>ride</name>
    <gx:Track>
      <when>2023-06-01T08:00:00Z</when>
      <when>2023-06-01T08:00:05Z</when>
      <when>2023-06-01T08:00:10Z</when>
      <gx:coord>7.9000 46.5000 1200</gx:coord>
      <gx:coord>7.9010 46.5010 1210</gx:coord>
      <gx:coord>7.9020 46.5020 1190</gx:coord>
    </gx:Track>
  </Placemark>
  <Placemark>
    <LineString>
      <coordinates>1,1,0 2,2,0</coordinates>
    </LineString>
  </Placemark>
</Document>
</kml>"#;

    const KML_STANDARD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
<Document>
  <Placemark>
    <LineString>
      <tessellate>1</tessellate>
      <coordinates>
        -71.30830716441369,44.28309806603165,0
        -71.30,44.27,0
        -71.2972073283768,44.25628098424278,0
      </coordinates>
    </LineString>
  </Placemark>
</Document>
</kml>"#;

    const KML_EMPTY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
<Document>
  <name>nothing here</name>
</Document>
</kml>"#;

    fn write_tmp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(TrackFormat::from_path(Path::new("a/b.gpx")), TrackFormat::Gpx);
        assert_eq!(TrackFormat::from_path(Path::new("a/b.GPX")), TrackFormat::Gpx);
        assert_eq!(TrackFormat::from_path(Path::new("a/b.kml")), TrackFormat::Kml);
        assert_eq!(TrackFormat::from_path(Path::new("a/b.xml")), TrackFormat::Kml);
        assert_eq!(TrackFormat::from_path(Path::new("noext")), TrackFormat::Kml);
    }

    #[test]
    fn test_gpx_flattens_tracks_and_segments() {
        let points = read_gpx(GPX.as_bytes()).unwrap();
        let lats: Vec<f64> = points.iter().map(|p| p.lat()).collect();
        assert_eq!(lats, vec![46.5, 46.501, 46.502, 46.503]);
        assert_eq!(points[3].lon(), 7.903);
    }

    #[test]
    fn test_gpx_malformed() {
        let bad = r#"<gpx version="1.1" creator="x"><trk><trkseg><trkpt lat="abc" lon="1"/></trkseg></trk></gpx>"#;
        assert!(matches!(read_gpx(bad.as_bytes()), Err(ParseError::Gpx(_))));
    }

    #[test]
    fn test_kml_prefers_extended_coords() {
        let points = read_kml(KML_EXTENDED.as_bytes()).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].lat(), 46.5);
        assert_eq!(points[0].lon(), 7.9);
        assert_eq!(points[2].lat(), 46.502);
    }

    #[test]
    fn test_kml_standard_coords() {
        let points = read_kml(KML_STANDARD.as_bytes()).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].lat(), 44.28309806603165);
        assert_eq!(points[0].lon(), -71.30830716441369);
        assert_eq!(points[1].lat(), 44.27);
    }

    #[test]
    fn test_kml_malformed() {
        let bad = r#"<kml><Document><Placemark><LineString><coordinates>1,2,0</coordinates></Document></kml>"#;
        assert!(matches!(read_kml(bad.as_bytes()), Err(ParseError::Kml(_))));
        assert!(matches!(read_kml("".as_bytes()), Err(ParseError::Kml(_))));
        assert!(matches!(read_kml("just text".as_bytes()), Err(ParseError::Kml(_))));
    }

    #[test]
    fn test_kml_truncated() {
        let inside_coordinates = "<kml><Document><Placemark><LineString><coordinates>1,2,0";
        assert!(matches!(
            read_kml(inside_coordinates.as_bytes()),
            Err(ParseError::Kml(_))
        ));

        let inside_placemark =
            "<kml><Placemark><LineString><coordinates>1,2,0 3,4,0</coordinates></LineString>";
        assert!(matches!(
            read_kml(inside_placemark.as_bytes()),
            Err(ParseError::Kml(_))
        ));

        let after_placemark = "<kml><Document><Placemark><LineString><coordinates>1,2,0 3,4,0</coordinates></LineString></Placemark>";
        assert!(matches!(
            read_kml(after_placemark.as_bytes()),
            Err(ParseError::Kml(_))
        ));

        // Cut in the middle of the last closing tag.
        let mid_tag = &KML_STANDARD[..KML_STANDARD.len() - 3];
        assert!(matches!(read_kml(mid_tag.as_bytes()), Err(ParseError::Kml(_))));
    }

    #[test]
    fn test_kml_bad_coord() {
        let kml = KML_EXTENDED.replace("7.9010 46.5010 1210", "abc def 0");
        match read_kml(kml.as_bytes()) {
            Err(ParseError::Coordinate(token)) => assert_eq!(token, "abc def 0"),
            other => panic!("expected coordinate error, got {other:?}"),
        }
    }

    #[test]
    fn test_kml_out_of_range() {
        let extended = KML_EXTENDED.replace("7.9010 46.5010 1210", "7.9010 95.0 1210");
        assert!(matches!(
            read_kml(extended.as_bytes()),
            Err(ParseError::OutOfRange { lat, .. }) if lat == 95.0
        ));

        let standard = KML_STANDARD.replace("-71.30,44.27,0", "-71.30,95.0,0");
        assert!(matches!(
            read_kml(standard.as_bytes()),
            Err(ParseError::OutOfRange { lat, .. }) if lat == 95.0
        ));
    }

    #[test]
    fn test_read_points_dispatches_on_suffix() {
        let gpx = write_tmp(".gpx", GPX);
        assert_eq!(read_points(gpx.path()).unwrap().len(), 4);

        let kml = write_tmp(".kml", KML_STANDARD);
        assert_eq!(read_points(kml.path()).unwrap().len(), 3);
    }

    #[test]
    fn test_read_points_without_coordinates() {
        let kml = write_tmp(".kml", KML_EMPTY);
        assert!(matches!(read_points(kml.path()), Err(ParseError::NoPoints(_))));
    }

    #[test]
    fn test_read_points_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.gpx");
        assert!(matches!(read_points(missing), Err(ParseError::Io(_))));
    }
}
