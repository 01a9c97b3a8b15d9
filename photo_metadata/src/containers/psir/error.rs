/// Something was wrong with a sequence of Photoshop image resources.
#[derive(Clone, Debug, PartialEq, PartialOrd, Hash)]
pub enum PsirError {
    /// A resource didn't start with `8BIM`, or its header was cut short.
    InvalidHeader { offset: u64 },

    /// The resource's name or size ran past the end of the sequence.
    IncompleteHeader { offset: u64 },

    /// The resource's body ran past the end of the sequence.
    IncompleteBody { id: u16, offset: u64, size: u32 },

    /// Two resources had the same ID.
    DuplicateId { id: u16 },

    /// A rendered body would be larger than 4 GiB.
    TooLarge { id: u16 },
}

impl core::fmt::Display for PsirError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PsirError::InvalidHeader { offset } => {
                write!(f, "No valid resource header at offset `{offset}`.")
            }
            PsirError::IncompleteHeader { offset } => {
                write!(f, "The resource header at offset `{offset}` was cut short.")
            }
            PsirError::IncompleteBody { id, offset, size } => write!(
                f,
                "Resource `{id:#06x}` claims `{size}` bytes at offset `{offset}`, \
                but the sequence ends first."
            ),
            PsirError::DuplicateId { id } => {
                write!(f, "Found more than one resource with ID `{id:#06x}`.")
            }
            PsirError::TooLarge { id } => {
                write!(f, "Resource `{id:#06x}` is too large to render.")
            }
        }
    }
}

impl core::error::Error for PsirError {}
