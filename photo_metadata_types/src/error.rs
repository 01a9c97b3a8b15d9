//! Errors from parsing value types.

/// A value couldn't be parsed from its textual (or numeric) form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Hash)]
pub enum ValueError {
    /// The text wasn't a date and time in any of the accepted layouts.
    DateTime,

    /// The text wasn't a decimal number, or a fraction had a non-positive
    /// denominator.
    FixedFloat,

    /// The GPS coordinates were malformed or out of range.
    GpsCoords,

    /// A hierarchical value had an empty component, or contained a `|`.
    HierValue,

    /// An orientation value was outside of `1..=8`.
    Orientation(u16),
}

impl core::fmt::Display for ValueError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DateTime => f.write_str("invalid DateTime value"),
            Self::FixedFloat => f.write_str("invalid fixed floating point number"),
            Self::GpsCoords => f.write_str("invalid GPSCoords value"),
            Self::HierValue => f.write_str(
                "hierarchical values cannot have empty components \
                    or contain `|` characters",
            ),
            Self::Orientation(v) => write!(
                f,
                "orientation value out of range. \
                    expected: `1..=8`; \
                    got: `{v}`"
            ),
        }
    }
}

impl core::error::Error for ValueError {}
