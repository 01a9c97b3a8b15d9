/// Something was wrong with a TIFF-style block.
#[derive(Clone, Debug, PartialEq, PartialOrd, Hash)]
pub enum TiffError {
    /// The block didn't start with `II*\0` or `MM\0*`.
    BadHeader { found: Vec<u8> },

    /// An IFD's entry count or entries ran past the end of the block.
    IfdOutOfBounds { offset: u32 },

    /// A tag used a type code we don't know the size of.
    UnknownType { tag: u16, ty: u16 },

    /// A tag's data ran past the end of the block.
    DataOutOfBounds { tag: u16, offset: u32, size: u64 },

    /// Two parsed structures claimed the same bytes.
    OverlappingRange { start: u32, end: u32 },

    /// A range ended before it started.
    InvalidRange { start: u32, end: u32 },

    /// A tag was expected to point at an IFD, but it isn't a single LONG.
    NotAnIfd { tag: u16 },

    /// The rendered block would be larger than 4 GiB, which TIFF offsets
    /// can't address.
    TooLarge,
}

impl core::fmt::Display for TiffError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TiffError::BadHeader { found } => {
                write!(f, "The block didn't start with a TIFF header. found: `{found:x?}`")
            }
            TiffError::IfdOutOfBounds { offset } => write!(
                f,
                "The IFD at offset `{offset:#x}` runs past the end of the block."
            ),
            TiffError::UnknownType { tag, ty } => {
                write!(f, "Tag `{tag:#06x}` has unknown type `{ty}`.")
            }
            TiffError::DataOutOfBounds { tag, offset, size } => write!(
                f,
                "Data for tag `{tag:#06x}` (`{size}` bytes at offset `{offset:#x}`) \
                runs past the end of the block."
            ),
            TiffError::OverlappingRange { start, end } => write!(
                f,
                "The range `[{start:#x}, {end:#x})` overlaps data that was already parsed."
            ),
            TiffError::InvalidRange { start, end } => {
                write!(f, "The range `[{start:#x}, {end:#x})` ends before it starts.")
            }
            TiffError::NotAnIfd { tag } => {
                write!(f, "Tag `{tag:#06x}` doesn't point to an IFD.")
            }
            TiffError::TooLarge => f.write_str("The rendered block wouldn't fit in 4 GiB."),
        }
    }
}

impl core::error::Error for TiffError {}
