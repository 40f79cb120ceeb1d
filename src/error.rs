use parse_display::Display;

/// Error returned when a collection or a change builder is used against its contract.
#[non_exhaustive]
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum ChangeError {
    /// An edit was recorded, or a batch was ended, while no batch was open.
    #[display("`begin_change` was not called")]
    NotInBatch,

    /// A field of a change was read while the cursor was not positioned on a sub-change.
    #[display("`next()` must be called before reading a change")]
    NoCurrentChange,

    #[display("index {index} out of bounds for length {len}")]
    OutOfBounds { index: usize, len: usize },

    #[display("invalid range {from}..{to}")]
    InvalidRange { from: usize, to: usize },

    #[display("invalid permutation")]
    InvalidPermutation,

    /// The collection was modified after the change was produced.
    #[display("change is stale")]
    Stale,

    #[display("source of length {src} does not fit in destination of length {dest}")]
    IncompatibleSize { src: usize, dest: usize },
}

impl ChangeError {
    /// Returns `true` for errors caused by breaking the batch or cursor protocol.
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::NotInBatch | Self::NoCurrentChange | Self::Stale)
    }

    pub(crate) fn check_index(index: usize, len: usize) -> Result<(), Self> {
        if index < len {
            Ok(())
        } else {
            Err(Self::OutOfBounds { index, len })
        }
    }
    pub(crate) fn check_insert_index(index: usize, len: usize) -> Result<(), Self> {
        if index <= len {
            Ok(())
        } else {
            Err(Self::OutOfBounds { index, len })
        }
    }
}

impl std::error::Error for ChangeError {}
