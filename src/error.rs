use thiserror::Error;

/// The largest hash width, in bits, that a bucket key can hold.
pub const MAX_BITSIZE: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// Errors surfaced by the index and its bit vectors.
pub enum IndexError {
    /// The index was configured with an unsupported hash width.
    #[error("bitsize must be between 1 and {}, got {bitsize}", MAX_BITSIZE)]
    Configuration {
        /// The rejected hash width.
        bitsize: usize,
    },

    /// A bit vector could not be parsed from text.
    #[error("bit vector parse error: unexpected {character:?} at position {position}")]
    Format {
        /// The offending character.
        character: char,
        /// The character offset of the offending character.
        position: usize,
    },

    /// A vector passed to a checked operation has the wrong number of dimensions.
    #[error("expected a vector of {expected} dimensions, got {actual}")]
    Dimension {
        /// The dimensionality the index was built with.
        expected: usize,
        /// The dimensionality of the given vector.
        actual: usize,
    },

    /// Decoded page storage breaks the invariants of its chains.
    #[error("corrupt page storage: {0}")]
    Corrupt(String),

    /// No further pages can be allocated.
    #[error("page storage exhausted after {pages} pages")]
    Exhausted {
        /// The number of pages allocated when exhaustion occurred.
        pages: usize,
    },
}

/// A result whose error type is [`IndexError`].
pub type Result<T> = std::result::Result<T, IndexError>;
