/// Something was wrong with a JPEG's segment stream.
#[derive(Clone, Debug, PartialEq, PartialOrd, Hash)]
pub enum JpegError {
    /// The file didn't start with an SOI marker.
    NotJpeg,

    /// A segment didn't start with `0xFF`, or its marker byte was `0x00`.
    BadMarker { offset: u64, found: u8 },

    /// A segment's length was smaller than the length field itself.
    BadLength { offset: u64, length: u16 },

    /// The stream ended before the start of scan.
    Truncated { offset: u64 },
}

impl core::fmt::Display for JpegError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            JpegError::NotJpeg => f.write_str("The data doesn't start with a JPEG SOI marker."),
            JpegError::BadMarker { offset, found } => write!(
                f,
                "Expected a segment marker at offset `{offset}`, but found `{found:#04x}`."
            ),
            JpegError::BadLength { offset, length } => write!(
                f,
                "Segment at offset `{offset}` has an impossible length: `{length}`."
            ),
            JpegError::Truncated { offset } => write!(
                f,
                "The segment stream ended at offset `{offset}`, before the image data."
            ),
        }
    }
}

impl core::error::Error for JpegError {}
