/// Something was wrong with an IPTC IIM block.
#[derive(Clone, Debug, PartialEq, PartialOrd, Hash)]
pub enum IimError {
    /// A dataset didn't start with the `0x1C` tag marker.
    BadMarker { offset: u64, found: u8 },

    /// An extended-length dataset gave a length-of-length outside `1..=8`.
    BadLengthSize { offset: u64, length_size: u16 },

    /// An extended-length dataset claimed more than we're willing to read.
    UnreasonableSize { offset: u64, size: u64 },

    /// A dataset's header or body ran past the end of the block.
    Truncated { offset: u64 },

    /// A dataset body is too large to render.
    TooLarge { id: u16 },
}

impl core::fmt::Display for IimError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            IimError::BadMarker { offset, found } => write!(
                f,
                "Expected a dataset tag marker at offset `{offset}`, but found `{found:#04x}`."
            ),
            IimError::BadLengthSize {
                offset,
                length_size,
            } => write!(
                f,
                "Dataset at offset `{offset}` has an unsupported length size: `{length_size}`."
            ),
            IimError::UnreasonableSize { offset, size } => write!(
                f,
                "Dataset at offset `{offset}` claims an unreasonable size: `{size}` bytes."
            ),
            IimError::Truncated { offset } => {
                write!(f, "Dataset at offset `{offset}` runs past the end of the block.")
            }
            IimError::TooLarge { id } => {
                write!(f, "Dataset `{id:#06x}` is too large to render.")
            }
        }
    }
}

impl core::error::Error for IimError {}
