//! Segment grade and its color classification.

use crate::coord::ElevatedPoint;
use geo::GeodesicDistance;
use std::fmt;

/// Segments shorter than this (meters) have a grade of exactly 0.
pub const MIN_RUN_M: f64 = 0.5;

/// Stroke width of every style in the catalog.
pub const LINE_WIDTH: f64 = 4.0;

/// Returns the signed percent grade from `a` to `b`.
///
/// The run is the ellipsoidal (WGS-84) distance between the two
/// points; positive grades are ascents.
pub fn grade(a: &ElevatedPoint, b: &ElevatedPoint) -> f64 {
    let run_m = a.coord.point().geodesic_distance(&b.coord.point());
    if run_m < MIN_RUN_M {
        0.0
    } else {
        (b.elevation - a.elevation) / run_m * 100.0
    }
}

/// A named grade range and its display style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColorBucket {
    SteepDown30,
    SteepDown25,
    SteepDown20,
    SteepDown15,
    SteepDown10,
    SteepDown5,
    Down4,
    Down3,
    Down2,
    Down1,
    Flat,
    Up1,
    Up2,
    Up3,
    Up4,
    Up5,
    Up10,
    Up15,
    Up20,
    Up25,
    Up30,
}

#[derive(Clone, Copy)]
enum Bound {
    /// Grade is less than or equal to this value.
    AtMost(f64),
    /// Grade is strictly less than this value.
    Below(f64),
}

impl Bound {
    fn contains(self, grade: f64) -> bool {
        match self {
            Bound::AtMost(upper) => grade <= upper,
            Bound::Below(upper) => grade < upper,
        }
    }
}

struct Band {
    bound: Bound,
    bucket: ColorBucket,
    name: &'static str,
    color: &'static str,
}

const fn band(bound: Bound, bucket: ColorBucket, name: &'static str, color: &'static str) -> Band {
    Band {
        bound,
        bucket,
        name,
        color,
    }
}

/// Grade bands, steepest descent first. The first band whose bound
/// contains a grade wins. Colors are KML `aabbggrr`.
#[rustfmt::skip]
static PALETTE: [Band; 21] = [
    band(Bound::AtMost(-25.0),          ColorBucket::SteepDown30, "steep_down_30", "ff800000"),
    band(Bound::AtMost(-20.0),          ColorBucket::SteepDown25, "steep_down_25", "ff990000"),
    band(Bound::AtMost(-15.0),          ColorBucket::SteepDown20, "steep_down_20", "ffB20000"),
    band(Bound::AtMost(-10.0),          ColorBucket::SteepDown15, "steep_down_15", "ffCC0000"),
    band(Bound::AtMost(-5.0),           ColorBucket::SteepDown10, "steep_down_10", "ffE60000"),
    band(Bound::AtMost(-2.5),           ColorBucket::SteepDown5,  "steep_down_5",  "ffff0000"),
    band(Bound::AtMost(-1.5),           ColorBucket::Down4,       "down_4",        "ffcc8000"),
    band(Bound::AtMost(-1.0),           ColorBucket::Down3,       "down_3",        "ffdd9900"),
    band(Bound::AtMost(-0.5),           ColorBucket::Down2,       "down_2",        "ffeeaa00"),
    band(Bound::AtMost(-0.25),          ColorBucket::Down1,       "down_1",        "ffffbb00"),
    band(Bound::Below(0.25),            ColorBucket::Flat,        "flat",          "ffffffff"),
    band(Bound::AtMost(0.25),           ColorBucket::Up1,         "up_1",          "ff0088ff"),
    band(Bound::AtMost(0.5),            ColorBucket::Up2,         "up_2",          "ff0099ff"),
    band(Bound::AtMost(1.0),            ColorBucket::Up3,         "up_3",          "ff00aaff"),
    band(Bound::AtMost(1.5),            ColorBucket::Up4,         "up_4",          "ff00bbff"),
    band(Bound::AtMost(2.5),            ColorBucket::Up5,         "up_5",          "ff00ccff"),
    band(Bound::AtMost(5.0),            ColorBucket::Up10,        "up_10",         "ff0088ff"),
    band(Bound::AtMost(10.0),           ColorBucket::Up15,        "up_15",         "ff0044ff"),
    band(Bound::AtMost(15.0),           ColorBucket::Up20,        "up_20",         "ff0022ff"),
    band(Bound::AtMost(20.0),           ColorBucket::Up25,        "up_25",         "ff0000ff"),
    band(Bound::AtMost(f64::INFINITY),  ColorBucket::Up30,        "up_30",         "ff220088"),
];

impl ColorBucket {
    /// Every bucket, in catalog order.
    pub const ALL: [ColorBucket; 21] = [
        ColorBucket::SteepDown30,
        ColorBucket::SteepDown25,
        ColorBucket::SteepDown20,
        ColorBucket::SteepDown15,
        ColorBucket::SteepDown10,
        ColorBucket::SteepDown5,
        ColorBucket::Down4,
        ColorBucket::Down3,
        ColorBucket::Down2,
        ColorBucket::Down1,
        ColorBucket::Flat,
        ColorBucket::Up1,
        ColorBucket::Up2,
        ColorBucket::Up3,
        ColorBucket::Up4,
        ColorBucket::Up5,
        ColorBucket::Up10,
        ColorBucket::Up15,
        ColorBucket::Up20,
        ColorBucket::Up25,
        ColorBucket::Up30,
    ];

    /// Returns the bucket for a percent grade.
    ///
    /// NaN has no meaningful slope and is treated as flat.
    pub fn classify(grade: f64) -> ColorBucket {
        if grade.is_nan() {
            return ColorBucket::Flat;
        }
        PALETTE
            .iter()
            .find(|band| band.bound.contains(grade))
            .map_or(ColorBucket::Up30, |band| band.bucket)
    }

    /// Style id of this bucket.
    pub fn name(self) -> &'static str {
        self.band().name
    }

    /// KML line color, `aabbggrr` hex.
    pub fn color(self) -> &'static str {
        self.band().color
    }

    pub fn width(self) -> f64 {
        LINE_WIDTH
    }

    fn band(self) -> &'static Band {
        // PALETTE and the enum share declaration order.
        &PALETTE[self as usize]
    }
}

impl fmt::Display for ColorBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shorthand for [ColorBucket::classify].
pub fn classify(grade: f64) -> ColorBucket {
    ColorBucket::classify(grade)
}
