//! Sky coordinate parsing and positional search regions.
//!
//! Right ascension is accepted as sexagesimal hours (`09:55:42.14`), as
//! decimal hours with an `h` marker (`9.93h`) or as decimal degrees
//! (`148.93`). Declination is accepted as sexagesimal degrees
//! (`+69:40:26.0`) or decimal degrees. Everything is normalised to decimal
//! degrees before any geometry is evaluated.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::types::parse_finite;

/// Errors that can occur when parsing coordinates.
#[derive(Debug, Error, PartialEq)]
pub enum CoordinateParseError {
    /// Right ascension could not be parsed.
    #[error("Invalid right ascension: {0}")]
    InvalidRightAscension(String),

    /// Declination could not be parsed.
    #[error("Invalid declination: {0}")]
    InvalidDeclination(String),

    /// A positional search needs both `ra` and `dec`.
    #[error("Missing required coordinate: {0}")]
    MissingCoordinate(String),

    /// Coordinate outside its valid range.
    #[error("Coordinate out of range: {0}")]
    OutOfRange(String),
}

static RA_SEXAGESIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})(?::?(\d{2}(?:\.\d*)?))?$").expect("valid RA pattern")
});

static DEC_SEXAGESIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-])?(\d{1,2}):(\d{2})(?::?(\d{2}(?:\.\d*)?))?$").expect("valid Dec pattern")
});

const ARCSEC_PER_DEGREE: f64 = 3600.0;

/// Slack allowed when comparing an offset against a region bound, so that
/// points on the boundary stay inside despite rounding.
const BOUNDARY_TOLERANCE_ARCSEC: f64 = 1e-6;

/// Radius used when a cone search is requested with `radius=0` or no radius.
pub const DEFAULT_RADIUS_ARCSEC: f64 = 1.0;

/// A position on the sky in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPosition {
    /// Right ascension, `[0, 360)`.
    pub ra_deg: f64,

    /// Declination, `[-90, 90]`.
    pub dec_deg: f64,
}

impl SkyPosition {
    pub fn new(ra_deg: f64, dec_deg: f64) -> Self {
        Self { ra_deg, dec_deg }
    }

    /// Parse a textual `ra`/`dec` pair.
    pub fn parse(ra: &str, dec: &str) -> Result<Self, CoordinateParseError> {
        Ok(Self::new(parse_right_ascension(ra)?, parse_declination(dec)?))
    }

    /// Angular separation to another position, in arcseconds.
    pub fn separation_arcsec(&self, other: &SkyPosition) -> f64 {
        angular_separation_deg(self.ra_deg, self.dec_deg, other.ra_deg, other.dec_deg)
            * ARCSEC_PER_DEGREE
    }
}

/// Parse a right ascension into decimal degrees.
pub fn parse_right_ascension(input: &str) -> Result<f64, CoordinateParseError> {
    let lowered = input.trim().to_lowercase();
    let hour_marker = lowered.contains('h');
    let cleaned = lowered
        .replace('h', "")
        .trim_matches(|c| c == ' ' || c == '.')
        .to_string();

    let degrees = if let Some(caps) = RA_SEXAGESIMAL.captures(&cleaned) {
        let hours: f64 = caps[1].parse().unwrap_or(0.0);
        let minutes: f64 = caps[2].parse().unwrap_or(0.0);
        let seconds: f64 = caps
            .get(3)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0.0);
        check_sexagesimal_fields(minutes, seconds)
            .map_err(|_| CoordinateParseError::InvalidRightAscension(input.to_string()))?;
        (hours + minutes / 60.0 + seconds / 3600.0) * 15.0
    } else if let Some(value) = parse_finite(&cleaned) {
        if hour_marker {
            value * 15.0
        } else {
            value
        }
    } else {
        return Err(CoordinateParseError::InvalidRightAscension(input.to_string()));
    };

    if !(0.0..360.0).contains(&degrees) {
        return Err(CoordinateParseError::OutOfRange(format!(
            "Right ascension {} is out of range [0h, 24h)",
            input.trim()
        )));
    }

    Ok(degrees)
}

/// Parse a declination into decimal degrees.
pub fn parse_declination(input: &str) -> Result<f64, CoordinateParseError> {
    let cleaned = input
        .trim()
        .to_lowercase()
        .trim_matches(|c| c == ' ' || c == '.')
        .to_string();

    let degrees = if let Some(value) = parse_finite(&cleaned) {
        value
    } else if let Some(caps) = DEC_SEXAGESIMAL.captures(&cleaned) {
        let sign = if caps.get(1).map(|m| m.as_str()) == Some("-") {
            -1.0
        } else {
            1.0
        };
        let whole: f64 = caps[2].parse().unwrap_or(0.0);
        let minutes: f64 = caps[3].parse().unwrap_or(0.0);
        let seconds: f64 = caps
            .get(4)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0.0);
        check_sexagesimal_fields(minutes, seconds)
            .map_err(|_| CoordinateParseError::InvalidDeclination(input.to_string()))?;
        sign * (whole + minutes / 60.0 + seconds / 3600.0)
    } else {
        return Err(CoordinateParseError::InvalidDeclination(input.to_string()));
    };

    if !(-90.0..=90.0).contains(&degrees) {
        return Err(CoordinateParseError::OutOfRange(format!(
            "Declination {} is out of range [-90, 90]",
            input.trim()
        )));
    }

    Ok(degrees)
}

fn check_sexagesimal_fields(minutes: f64, seconds: f64) -> Result<(), ()> {
    if minutes >= 60.0 || seconds >= 60.0 {
        Err(())
    } else {
        Ok(())
    }
}

/// Angular distance between two points via the Vincenty formula.
///
/// Unlike the law of cosines this stays accurate for sub-arcsecond
/// separations and for antipodal points. Returns degrees.
pub fn angular_separation_deg(ra1_deg: f64, dec1_deg: f64, ra2_deg: f64, dec2_deg: f64) -> f64 {
    let (sin_dec1, cos_dec1) = dec1_deg.to_radians().sin_cos();
    let (sin_dec2, cos_dec2) = dec2_deg.to_radians().sin_cos();
    let (sin_dra, cos_dra) = (ra2_deg - ra1_deg).to_radians().sin_cos();

    let east = cos_dec2 * sin_dra;
    let north = cos_dec1 * sin_dec2 - sin_dec1 * cos_dec2 * cos_dra;
    let along = sin_dec1 * sin_dec2 + cos_dec1 * cos_dec2 * cos_dra;
    east.hypot(north).atan2(along).to_degrees()
}

fn within(offset_arcsec: f64, bound_arcsec: f64) -> bool {
    offset_arcsec <= bound_arcsec + BOUNDARY_TOLERANCE_ARCSEC
}

/// Absolute right ascension offset, wrapped so it never exceeds 180 degrees.
pub fn ra_offset_deg(ra1_deg: f64, ra2_deg: f64) -> f64 {
    let diff = (ra1_deg - ra2_deg).abs() % 360.0;
    diff.min(360.0 - diff)
}

/// A positional constraint derived from `ra`/`dec` plus `radius`/`width`/`height`.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchRegion {
    /// Everything within `radius_arcsec` of the center (inclusive).
    Cone {
        center: SkyPosition,
        radius_arcsec: f64,
    },

    /// Independent RA and Dec offsets; an absent bound is unconstrained.
    Box {
        center: SkyPosition,
        width_arcsec: Option<f64>,
        height_arcsec: Option<f64>,
    },
}

impl SearchRegion {
    /// Build the region for a request.
    ///
    /// Returns `Ok(None)` when no geometric directive (`radius`, `width`,
    /// `height`) was given, or when one was given without any coordinates.
    /// A box takes priority over a cone when a positive width or height is
    /// present.
    pub fn resolve(
        ra: Option<&str>,
        dec: Option<&str>,
        radius: Option<f64>,
        width: Option<f64>,
        height: Option<f64>,
    ) -> Result<Option<SearchRegion>, CoordinateParseError> {
        if radius.is_none() && width.is_none() && height.is_none() {
            return Ok(None);
        }

        let center = match (ra, dec) {
            (None, None) => return Ok(None),
            (Some(_), None) => return Err(CoordinateParseError::MissingCoordinate("dec".to_string())),
            (None, Some(_)) => return Err(CoordinateParseError::MissingCoordinate("ra".to_string())),
            (Some(ra), Some(dec)) => SkyPosition::parse(ra, dec)?,
        };

        let width = width.filter(|w| *w > 0.0);
        let height = height.filter(|h| *h > 0.0);
        if width.is_some() || height.is_some() {
            return Ok(Some(SearchRegion::Box {
                center,
                width_arcsec: width,
                height_arcsec: height,
            }));
        }

        let radius_arcsec = radius
            .filter(|r| *r > 0.0)
            .unwrap_or(DEFAULT_RADIUS_ARCSEC);
        Ok(Some(SearchRegion::Cone {
            center,
            radius_arcsec,
        }))
    }

    /// Whether a position falls inside the region. Boundaries are inclusive.
    pub fn contains(&self, position: &SkyPosition) -> bool {
        match self {
            SearchRegion::Cone {
                center,
                radius_arcsec,
            } => within(center.separation_arcsec(position), *radius_arcsec),
            SearchRegion::Box {
                center,
                width_arcsec,
                height_arcsec,
            } => {
                let ra_ok = width_arcsec.map_or(true, |w| {
                    within(ra_offset_deg(center.ra_deg, position.ra_deg) * ARCSEC_PER_DEGREE, w)
                });
                let dec_ok = height_arcsec.map_or(true, |h| {
                    within((center.dec_deg - position.dec_deg).abs() * ARCSEC_PER_DEGREE, h)
                });
                ra_ok && dec_ok
            }
        }
    }
}
