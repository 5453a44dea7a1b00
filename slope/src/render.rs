//! Grade-colored KML output.
//!
//! The document holds one `<Style>` per [ColorBucket] followed by
//! one two-point `<Placemark>` per track segment:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <kml xmlns="http://www.opengis.net/kml/2.2">
//!   <Document>
//!     <Style id="steep_down_30">
//!       <LineStyle>
//!         <color>ff800000</color>
//!         <width>4</width>
//!       </LineStyle>
//!     </Style>
//!     ...
//!     <Placemark>
//!       <styleUrl>#up_15</styleUrl>
//!       <LineString>
//!         <tessellate>1</tessellate>
//!         <coordinates>7.9,46.5,1200 7.901,46.501,1210</coordinates>
//!       </LineString>
//!     </Placemark>
//!   </Document>
//! </kml>
//! ```

use crate::{
    coord::ElevatedPoint,
    error::RenderError,
    grade::{grade, ColorBucket},
};
use kml::types::Element;
use log::debug;
use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};
use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

pub const KML_NS: &str = "http://www.opengis.net/kml/2.2";

const INDENT: usize = 2;

/// Two adjacent track points and the style of the line joining them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyledSegment {
    pub start: ElevatedPoint,
    pub end: ElevatedPoint,

    /// Percent grade from `start` to `end`.
    pub grade: f64,

    pub bucket: ColorBucket,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyledTrack {
    /// One entry per adjacent point pair, in track order.
    pub segments: Vec<StyledSegment>,
}

/// Classifies every adjacent pair of `points`.
pub fn render(points: &[ElevatedPoint]) -> StyledTrack {
    let segments = points
        .windows(2)
        .map(|pair| {
            let (start, end) = (pair[0], pair[1]);
            let grade = grade(&start, &end);
            StyledSegment {
                start,
                end,
                grade,
                bucket: ColorBucket::classify(grade),
            }
        })
        .collect();
    StyledTrack { segments }
}

impl StyledTrack {
    /// Number of segments in each bucket. Unused buckets are absent.
    pub fn histogram(&self) -> BTreeMap<ColorBucket, usize> {
        let mut counts = BTreeMap::new();
        for segment in &self.segments {
            *counts.entry(segment.bucket).or_insert(0) += 1;
        }
        counts
    }

    /// Serializes this track as a KML document.
    pub fn write<W: Write>(&self, out: W) -> Result<(), RenderError> {
        let mut document = node(
            "Document",
            Vec::with_capacity(ColorBucket::ALL.len() + self.segments.len()),
        );
        document.children.extend(ColorBucket::ALL.into_iter().map(style));
        document.children.extend(self.segments.iter().map(placemark));
        let mut root = node("kml", vec![document]);
        root.attrs.insert("xmlns".to_string(), KML_NS.to_string());

        let mut writer = Writer::new_with_indent(out, b' ', INDENT);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;
        write_element(&mut writer, &root)?;

        let mut out = writer.into_inner();
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }

    /// Writes this track to `path`.
    ///
    /// The document is written to a temporary sibling and renamed into
    /// place, `path` is never left partially written.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<(), RenderError> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        let now = std::time::Instant::now();

        let written = File::create(&tmp_path)
            .map_err(RenderError::from)
            .and_then(|file| self.write(BufWriter::new(file)));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        fs::rename(&tmp_path, path)?;

        debug!(
            "write; segments: {}, path: {}, exec: {:?}",
            self.segments.len(),
            path.display(),
            now.elapsed()
        );
        Ok(())
    }
}

fn write_element<W: Write>(writer: &mut Writer<W>, elem: &Element) -> Result<(), RenderError> {
    let start = BytesStart::new(elem.name.as_str())
        .with_attributes(elem.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    if let Some(content) = &elem.content {
        writer
            .write_event(Event::Text(BytesText::new(content)))
            .map_err(xml_error)?;
    }
    for child in &elem.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(elem.name.as_str())))
        .map_err(xml_error)?;
    Ok(())
}

fn xml_error<E: Display>(e: E) -> RenderError {
    RenderError::Kml(e.to_string())
}

fn style(bucket: ColorBucket) -> Element {
    let line_style = node(
        "LineStyle",
        vec![
            leaf("color", bucket.color().to_string()),
            leaf("width", bucket.width().to_string()),
        ],
    );
    let mut style = node("Style", vec![line_style]);
    style.attrs.insert("id".to_string(), bucket.name().to_string());
    style
}

fn placemark(segment: &StyledSegment) -> Element {
    let StyledSegment { start, end, .. } = segment;
    let coordinates = format!(
        "{},{},{} {},{},{}",
        start.coord.lon(),
        start.coord.lat(),
        start.elevation,
        end.coord.lon(),
        end.coord.lat(),
        end.elevation
    );
    node(
        "Placemark",
        vec![
            leaf("styleUrl", format!("#{}", segment.bucket.name())),
            node(
                "LineString",
                vec![
                    leaf("tessellate", "1".to_string()),
                    leaf("coordinates", coordinates),
                ],
            ),
        ],
    )
}

fn node(name: &str, children: Vec<Element>) -> Element {
    Element {
        name: name.to_string(),
        attrs: HashMap::new(),
        content: None,
        children,
    }
}

fn leaf(name: &str, content: String) -> Element {
    Element {
        name: name.to_string(),
        attrs: HashMap::new(),
        content: Some(content),
        children: Vec::new(),
    }
}
