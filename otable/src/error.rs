use std::fmt;

use otable_heap::AllocError;

/// Errors surfaced by table operations.
///
/// Key absence is not an error (lookups return `Option`), and a full small
/// form is handled internally by promoting to the large form. What remains
/// are the two conditions the caller has to deal with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The requested capacity exceeds the hard limit of the representation.
    CapacityExceeded,
    /// The host failed to provide a backing buffer.
    AllocationFailure(AllocError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CapacityExceeded => write!(f, "table capacity limit exceeded"),
            Error::AllocationFailure(err) => write!(f, "table allocation failed: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::CapacityExceeded => None,
            Error::AllocationFailure(err) => Some(err),
        }
    }
}

impl From<AllocError> for Error {
    fn from(err: AllocError) -> Self {
        Error::AllocationFailure(err)
    }
}
