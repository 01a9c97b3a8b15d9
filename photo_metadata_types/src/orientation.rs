//! Image orientation, as EXIF numbers it.

use crate::ValueError;

/// What has to be done to the stored pixels to get them upright.
///
/// The discriminants match the EXIF `Orientation` tag. Zero isn't a valid
/// orientation; callers use `Option<Orientation>` for "unset".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Orientation {
    #[default]
    Rotate0 = 1,
    FlipX = 2,
    FlipXY = 3,
    FlipY = 4,
    Rotate90FlipX = 5,
    Rotate90 = 6,
    Rotate270FlipX = 7,
    Rotate270 = 8,
}

impl Orientation {
    /// Maps an EXIF value. Zero means "unset" and gives `None`.
    pub fn from_exif(value: u16) -> Result<Option<Self>, ValueError> {
        Ok(Some(match value {
            0 => return Ok(None),
            1 => Self::Rotate0,
            2 => Self::FlipX,
            3 => Self::FlipXY,
            4 => Self::FlipY,
            5 => Self::Rotate90FlipX,
            6 => Self::Rotate90,
            7 => Self::Rotate270FlipX,
            8 => Self::Rotate270,
            other => return Err(ValueError::Orientation(other)),
        }))
    }

    /// The EXIF value.
    pub const fn as_exif(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for Orientation {
    type Error = ValueError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::from_exif(value)?.ok_or(ValueError::Orientation(value))
    }
}

impl core::fmt::Display for Orientation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Rotate0 => "Rotate0",
            Self::FlipX => "FlipX",
            Self::FlipXY => "FlipXY",
            Self::FlipY => "FlipY",
            Self::Rotate90FlipX => "Rotate90FlipX",
            Self::Rotate90 => "Rotate90",
            Self::Rotate270FlipX => "Rotate270FlipX",
            Self::Rotate270 => "Rotate270",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Orientation;
    use crate::ValueError;

    #[test]
    fn exif_values() {
        assert_eq!(Orientation::from_exif(0), Ok(None));
        assert_eq!(Orientation::from_exif(6), Ok(Some(Orientation::Rotate90)));
        assert_eq!(Orientation::from_exif(9), Err(ValueError::Orientation(9)));
        for v in 1..=8 {
            assert_eq!(Orientation::try_from(v).map(Orientation::as_exif), Ok(v));
        }
        assert!(Orientation::try_from(0).is_err());
    }
}
