//! GPS coordinates.
//!
//! EXIF stores these as reference letters plus rational triplets, XMP stores
//! them as text like `37,20.1264N`. Both are lossy in different ways, so
//! values read from different places are compared with [`GpsCoords::equivalent`]
//! rather than `==`.

use alloc::{
    format,
    string::{String, ToString},
    vec,
    vec::Vec,
};
use core::str::FromStr;

use crate::{FixedFloat, ValueError};

/// One foot, in meters.
const FEET_TO_METERS: FixedFloat = FixedFloat::from_micros(304_800);

/// Latitude and longitude slop allowed by [`GpsCoords::equivalent`], in
/// millionths of a degree. About a hundredth of an arc-second.
const ANGLE_SLOP: i64 = 3;

/// Altitude slop allowed by [`GpsCoords::equivalent`], in millionths of a
/// meter.
const ALTITUDE_SLOP: i64 = 100_000;

/// A position on the Earth.
///
/// The value is empty when either latitude or longitude is zero. An altitude
/// of zero means "no altitude".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GpsCoords {
    /// Degrees north of the equator.
    pub latitude: FixedFloat,

    /// Degrees east of the prime meridian.
    pub longitude: FixedFloat,

    /// Meters above sea level.
    pub altitude: FixedFloat,
}

/// GPS coordinates as stored in the EXIF GPS IFD.
///
/// Angles are three rationals (degrees, minutes, seconds) flattened into six
/// `u32`s. Altitude is one rational.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ExifGps {
    /// `N` or `S`.
    pub lat_ref: String,
    pub lat: Vec<u32>,

    /// `E` or `W`.
    pub long_ref: String,
    pub long: Vec<u32>,

    /// `0` above sea level, `1` below.
    pub alt_ref: u8,
    pub alt: Vec<u32>,
}

/// GPS coordinates as stored in the XMP `exif:` namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct XmpGps {
    pub lat: String,
    pub long: String,
    pub alt_ref: String,
    pub alt: String,
}

impl GpsCoords {
    /// Whether there's no position here.
    pub fn is_empty(&self) -> bool {
        self.latitude == FixedFloat::ZERO || self.longitude == FixedFloat::ZERO
    }

    /// Whether there's an altitude here.
    pub fn has_altitude(&self) -> bool {
        !self.is_empty() && self.altitude != FixedFloat::ZERO
    }

    /// Parses the human form, `lat, long` with an optional third altitude
    /// part suffixed by `m`, `ft`, or `'`.
    ///
    /// ```
    /// use photo_metadata_types::GpsCoords;
    ///
    /// let gps = GpsCoords::parse("37.33544, -122.01990, 200ft").unwrap();
    /// assert_eq!(gps.altitude.to_string(), "60.96");
    /// assert_eq!(gps.to_string(), "37.33544, -122.0199, 200ft");
    /// ```
    pub fn parse(s: &str) -> Result<Self, ValueError> {
        let mut gps = GpsCoords::default();
        if s.trim().is_empty() {
            return Ok(gps);
        }

        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(ValueError::GpsCoords);
        }
        gps.latitude = FixedFloat::parse(parts[0]).map_err(|_| ValueError::GpsCoords)?;
        gps.longitude = FixedFloat::parse(parts[1]).map_err(|_| ValueError::GpsCoords)?;

        let Some(alt) = parts.get(2).map(|a| a.trim()) else {
            return Ok(gps);
        };
        let (number, feet) = if let Some(n) = alt.strip_suffix("ft") {
            (n, true)
        } else if let Some(n) = alt.strip_suffix('\'') {
            (n, true)
        } else if let Some(n) = alt.strip_suffix('m') {
            (n, false)
        } else {
            return Err(ValueError::GpsCoords);
        };
        gps.altitude = FixedFloat::parse(number).map_err(|_| ValueError::GpsCoords)?;
        if feet {
            gps.altitude = gps.altitude.mul(FEET_TO_METERS);
        }
        Ok(gps)
    }

    /// Decodes the EXIF form.
    ///
    /// All-empty input gives an empty value. Some cameras write `0/0` for a
    /// zero seconds component, which is tolerated.
    pub fn parse_exif(exif: &ExifGps) -> Result<Self, ValueError> {
        let mut gps = GpsCoords::default();
        if exif.lat_ref.is_empty()
            && exif.lat.is_empty()
            && exif.long_ref.is_empty()
            && exif.long.is_empty()
            && exif.alt_ref == 0
            && exif.alt.is_empty()
        {
            return Ok(gps);
        }

        gps.latitude = exif_angle(&exif.lat)?;
        match exif.lat_ref.as_str() {
            "N" => (),
            "S" => gps.latitude = -gps.latitude,
            _ => return Err(ValueError::GpsCoords),
        }
        gps.longitude = exif_angle(&exif.long)?;
        match exif.long_ref.as_str() {
            "E" => (),
            "W" => gps.longitude = -gps.longitude,
            _ => return Err(ValueError::GpsCoords),
        }

        if exif.alt_ref == 0 && exif.alt.is_empty() {
            return Ok(gps);
        }
        if exif.alt_ref > 1 || exif.alt.len() != 2 {
            return Err(ValueError::GpsCoords);
        }
        gps.altitude = FixedFloat::from_fraction(exif.alt[0].into(), exif.alt[1].into())?;
        if exif.alt_ref == 1 {
            gps.altitude = -gps.altitude;
        }
        Ok(gps)
    }

    /// Encodes the EXIF form: decimal degrees in the first rational, with
    /// zero minutes and seconds.
    pub fn as_exif(&self) -> ExifGps {
        let mut exif = ExifGps::default();
        if self.is_empty() {
            return exif;
        }

        exif.lat_ref = if self.latitude.is_negative() { "S" } else { "N" }.into();
        exif.lat = exif_degrees(self.latitude.abs());
        exif.long_ref = if self.longitude.is_negative() { "W" } else { "E" }.into();
        exif.long = exif_degrees(self.longitude.abs());

        if self.has_altitude() {
            exif.alt_ref = u8::from(self.altitude.is_negative());
            exif.alt = exif_rational(self.altitude.abs()).to_vec();
        }
        exif
    }

    /// Decodes the XMP form.
    ///
    /// Angles may be `DDD,MM.mmX`, `DDD,MM,SSX`, `DDD.ddX`, or a signed
    /// `±DDD.dd`. Altitude may be `num/den`, `num den`, or a decimal.
    pub fn parse_xmp(xmp: &XmpGps) -> Result<Self, ValueError> {
        let mut gps = GpsCoords {
            latitude: xmp_angle(&xmp.lat, 90)?,
            longitude: xmp_angle(&xmp.long, 180)?,
            altitude: FixedFloat::ZERO,
        };
        if !xmp.alt.is_empty() {
            gps.altitude = xmp_altitude(&xmp.alt_ref, &xmp.alt)?;
        }
        Ok(gps)
    }

    /// Encodes the XMP form. Angles are always `DDD,MM.mmX`.
    pub fn as_xmp(&self) -> XmpGps {
        let mut xmp = XmpGps::default();
        if self.is_empty() {
            return xmp;
        }
        xmp.lat = xmp_angle_string(self.latitude, 'N', 'S');
        xmp.long = xmp_angle_string(self.longitude, 'E', 'W');
        if self.has_altitude() {
            xmp.alt_ref = if self.altitude.is_negative() { "1" } else { "0" }.into();

            let mut num = self.altitude.abs().micros();
            let mut den = FixedFloat::SCALE;
            while num % 10 == 0 && den % 10 == 0 {
                num /= 10;
                den /= 10;
            }
            xmp.alt = format!("{num}/{den}");
        }
        xmp
    }

    /// Whether two positions agree to the precision of the less precise one.
    ///
    /// Angles within about a hundredth of an arc-second match, as do
    /// altitudes within a tenth of a meter. A missing altitude on either side
    /// matches any altitude.
    pub fn equivalent(&self, other: &GpsCoords) -> bool {
        if self.is_empty() || other.is_empty() {
            return self.is_empty() == other.is_empty();
        }
        if (self.latitude - other.latitude).micros().abs() > ANGLE_SLOP
            || (self.longitude - other.longitude).micros().abs() > ANGLE_SLOP
        {
            return false;
        }
        if self.altitude == FixedFloat::ZERO || other.altitude == FixedFloat::ZERO {
            return true;
        }
        (self.altitude - other.altitude).micros().abs() <= ALTITUDE_SLOP
    }
}

/// Sums a degrees/minutes/seconds triplet.
fn exif_angle(rationals: &[u32]) -> Result<FixedFloat, ValueError> {
    let &[d, d_den, m, m_den, s, mut s_den] = rationals else {
        return Err(ValueError::GpsCoords);
    };
    if d_den == 0 || m_den == 0 {
        return Err(ValueError::GpsCoords);
    }
    if s_den == 0 {
        // `0/0` seconds is illegal but common
        if s != 0 {
            return Err(ValueError::GpsCoords);
        }
        s_den = 1;
    }

    Ok(FixedFloat::from_fraction(d.into(), d_den.into())?
        + FixedFloat::from_fraction(m.into(), i64::from(m_den) * 60)?
        + FixedFloat::from_fraction(s.into(), i64::from(s_den) * 3600)?)
}

/// Reduces a value to the smallest power-of-ten rational that holds it.
fn exif_rational(f: FixedFloat) -> [u32; 2] {
    let mut num = f.micros() as u32;
    let mut den = FixedFloat::SCALE as u32;
    while num % 10 == 0 && den > 1 {
        num /= 10;
        den /= 10;
    }
    [num, den]
}

/// `(degrees, 0/1, 0/1)`.
fn exif_degrees(f: FixedFloat) -> Vec<u32> {
    let [num, den] = exif_rational(f);
    vec![num, den, 0, 1, 0, 1]
}

/// Parses a single XMP angle, up to `max` degrees either way.
fn xmp_angle(xmp: &str, max: i64) -> Result<FixedFloat, ValueError> {
    if xmp.is_empty() {
        return Ok(FixedFloat::ZERO);
    }

    let mut s = xmp;
    let mut neg = false;
    if let Some(dir) = s.chars().last().filter(|c| "NSEW".contains(*c)) {
        neg = dir == 'S' || dir == 'W';
        s = &s[..s.len() - 1];
    } else if let Some(rest) = s.strip_prefix('-') {
        neg = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    let parts: Vec<&str> = s.split(',').collect();
    let int = |p: &str| p.trim().parse::<i64>().map_err(|_| ValueError::GpsCoords);
    let f = match parts.as_slice() {
        [decimal] => FixedFloat::parse(decimal).map_err(|_| ValueError::GpsCoords)?,
        [degrees, minutes] => {
            let degrees = int(*degrees)?;
            let minutes = FixedFloat::parse(minutes).map_err(|_| ValueError::GpsCoords)?;
            if minutes.is_negative() || minutes >= FixedFloat::from_int(60) {
                return Err(ValueError::GpsCoords);
            }
            FixedFloat::from_micros(minutes.micros() / 60) + FixedFloat::from_int(degrees)
        }
        [degrees, minutes, seconds] => {
            let (degrees, minutes, seconds) = (int(*degrees)?, int(*minutes)?, int(*seconds)?);
            if !(0..60).contains(&minutes) || !(0..60).contains(&seconds) {
                return Err(ValueError::GpsCoords);
            }
            FixedFloat::from_int(degrees)
                + FixedFloat::from_fraction(minutes, 60)?
                + FixedFloat::from_fraction(seconds, 3600)?
        }
        _ => return Err(ValueError::GpsCoords),
    };
    if f > FixedFloat::from_int(max) {
        return Err(ValueError::GpsCoords);
    }

    Ok(if neg { -f } else { f })
}

/// Parses an XMP altitude and its `0`/`1` sign reference.
fn xmp_altitude(alt_ref: &str, alt: &str) -> Result<FixedFloat, ValueError> {
    let mut parts: Vec<&str> = alt.split('/').collect();
    if parts.len() == 1 {
        parts = alt.split(' ').collect();
    }

    let f = match parts.as_slice() {
        [decimal] => {
            let f = FixedFloat::parse(decimal).map_err(|_| ValueError::GpsCoords)?;
            if alt_ref == "1" && f.is_negative() {
                return Err(ValueError::GpsCoords);
            }
            f
        }
        [num, den] => {
            let num = num.parse::<i64>().map_err(|_| ValueError::GpsCoords)?;
            let den = den.parse::<i64>().map_err(|_| ValueError::GpsCoords)?;
            FixedFloat::from_fraction(num, den).map_err(|_| ValueError::GpsCoords)?
        }
        _ => return Err(ValueError::GpsCoords),
    };

    // an empty reference isn't legal, but it's common
    match alt_ref {
        "" | "0" => Ok(f),
        "1" => Ok(-f),
        _ => Err(ValueError::GpsCoords),
    }
}

/// Renders `DDD,MM.mmX`.
fn xmp_angle_string(f: FixedFloat, pos: char, neg: char) -> String {
    let suffix = if f.is_negative() { neg } else { pos };
    let f = f.abs();
    let degrees = f.trunc();
    let minutes = (f - FixedFloat::from_int(degrees)).mul(FixedFloat::from_int(60));
    format!("{degrees},{minutes}{suffix}")
}

impl core::fmt::Display for GpsCoords {
    /// Prints the human form, with altitude in feet. Empty values print
    /// nothing.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        write!(f, "{}, {}", self.latitude, self.longitude)?;
        if self.has_altitude() {
            let feet = self
                .altitude
                .div(FEET_TO_METERS)
                .map(|ft| ft.to_string())
                .unwrap_or_default();
            write!(f, ", {feet}ft")?;
        }
        Ok(())
    }
}

impl FromStr for GpsCoords {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use alloc::{string::ToString, vec};

    use super::{ExifGps, GpsCoords, XmpGps};
    use crate::FixedFloat;

    #[test]
    fn human_form() {
        let gps = GpsCoords::parse("37.33544, -122.01990").unwrap();
        assert!(!gps.has_altitude());
        assert_eq!(gps.to_string(), "37.33544, -122.0199");

        let gps = GpsCoords::parse("1, 2, 10m").unwrap();
        assert_eq!(gps.altitude, FixedFloat::from_int(10));

        assert!(GpsCoords::parse("").unwrap().is_empty());
        assert!(GpsCoords::parse("12").is_err());
        assert!(GpsCoords::parse("1, 2, 10 furlongs").is_err());
    }

    #[test]
    fn exif_then_xmp() {
        let gps = GpsCoords::parse("37.33544, -122.01990, 200ft").unwrap();

        let exif = gps.as_exif();
        assert_eq!(exif.lat_ref, "N");
        assert_eq!(exif.lat, vec![3_733_544, 100_000, 0, 1, 0, 1]);
        assert_eq!(exif.long_ref, "W");
        assert_eq!(exif.long, vec![1_220_199, 10_000, 0, 1, 0, 1]);
        assert_eq!(exif.alt_ref, 0);
        assert_eq!(exif.alt, vec![6096, 100]);

        let from_exif = GpsCoords::parse_exif(&exif).unwrap();
        assert_eq!(from_exif, gps);

        let xmp = from_exif.as_xmp();
        assert_eq!(xmp.lat, "37,20.1264N");
        assert_eq!(xmp.long, "122,1.194W");
        assert_eq!(xmp.alt_ref, "0");
        assert_eq!(xmp.alt, "6096/100");

        let from_xmp = GpsCoords::parse_xmp(&xmp).unwrap();
        assert_eq!(from_xmp.to_string(), "37.33544, -122.0199, 200ft");
    }

    #[test]
    fn exif_dms_and_fixups() {
        let exif = ExifGps {
            lat_ref: "S".into(),
            lat: vec![37, 1, 51, 1, 0, 0],
            long_ref: "E".into(),
            long: vec![1, 1, 30, 1, 0, 1],
            ..Default::default()
        };
        let gps = GpsCoords::parse_exif(&exif).unwrap();
        assert_eq!(gps.latitude.micros(), -37_850_000);
        assert_eq!(gps.longitude.micros(), 1_500_000);

        let bad = ExifGps {
            lat_ref: "X".into(),
            ..exif
        };
        assert!(GpsCoords::parse_exif(&bad).is_err());
        assert!(GpsCoords::parse_exif(&ExifGps::default()).unwrap().is_empty());
    }

    #[test]
    fn xmp_angle_layouts() {
        let xmp = |lat: &str, long: &str| XmpGps {
            lat: lat.into(),
            long: long.into(),
            ..Default::default()
        };
        let gps = GpsCoords::parse_xmp(&xmp("37,51,30N", "-122.5")).unwrap();
        assert_eq!(gps.latitude.micros(), 37_858_333);
        assert_eq!(gps.longitude.micros(), -122_500_000);

        assert!(GpsCoords::parse_xmp(&xmp("91N", "1E")).is_err());
        assert!(GpsCoords::parse_xmp(&xmp("1,60.5N", "1E")).is_err());

        let alt = XmpGps {
            alt_ref: "1".into(),
            alt: "15 2".into(),
            ..xmp("1N", "1E")
        };
        assert_eq!(
            GpsCoords::parse_xmp(&alt).unwrap().altitude.micros(),
            -7_500_000
        );
    }

    #[test]
    fn equivalence_has_slop() {
        let a = GpsCoords::parse("37.335440, -122.019900, 10m").unwrap();
        let b = GpsCoords::parse("37.335442, -122.019898").unwrap();
        let c = GpsCoords::parse("37.335450, -122.019900").unwrap();
        let d = GpsCoords::parse("37.335440, -122.019900, 11m").unwrap();
        assert!(a.equivalent(&b));
        assert!(!a.equivalent(&c));
        assert!(!a.equivalent(&d));
        assert!(!a.equivalent(&GpsCoords::default()));
    }
}
