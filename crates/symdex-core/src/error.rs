//! # Error Types
//!
//! General error handling for the symbol index.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

use crate::index::UnitId;

/// Main error type for index operations
///
/// Lookups that simply find nothing return `Ok(None)`; this enum is reserved
/// for conditions the caller has to react to.
///
/// ## Error Categories
///
/// 1. **Handle errors**: UnitNotFound, UserCycle
/// 2. **Expansion errors**: ReentrantExpansion, ReadFailed
/// 3. **Control errors**: Interrupted, InvalidArgument, CapacityExceeded
/// 4. **Reader errors**: Image, Dwarf
/// 5. **I/O errors**: Io (for file operations, etc.), Format
#[derive(Error, Debug)]
pub enum SymdexError
{
    /// The handle does not name a unit currently installed in the store
    ///
    /// This happens when a unit was discarded and its handle kept around, or
    /// when a handle from one store is used with another.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// Following the shared-unit user links from this unit never reaches an owner
    #[error("Shared unit chain starting at {0} is cyclic")]
    UserCycle(UnitId),

    /// Expansion of a unit was requested while that same unit was being expanded
    ///
    /// This is a contract violation by the reader (or by a dependency graph
    /// whose non-shared edges form a cycle). The unit is left pending.
    #[error("Unit {0} is already being expanded")]
    ReentrantExpansion(UnitId),

    /// The reader could not build the full table for a unit
    ///
    /// The failure is memoized: later expansion requests return this error
    /// again without calling the reader. Other units stay queryable.
    #[error("Failed to read symbols for {filename} ({unit}): {reason}")]
    ReadFailed
    {
        /// The unit whose expansion failed
        unit: UnitId,
        /// The unit's file name, for messages
        filename: String,
        /// What the reader reported
        reason: String,
    },

    /// A long-running operation observed its cancellation token
    #[error("Interrupted")]
    Interrupted,

    /// Invalid argument passed to an index function
    ///
    /// Examples:
    /// - An unparsable address or domain name on the command line
    /// - A unit installed as its own user
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An arena ran out of 32-bit ids
    #[error("Too many {0} for 32-bit ids")]
    CapacityExceeded(&'static str),

    /// The binary image could not be parsed
    #[error("Image error: {0}")]
    Image(String),

    /// Malformed or unsupported debug information
    #[error("DWARF error while {context}: {source}")]
    Dwarf
    {
        /// What the reader was doing when the error occurred
        context: String,
        /// The underlying `gimli` error
        source: gimli::Error,
    },

    /// I/O error (for file operations, etc.)
    ///
    /// Used for errors when reading binaries or source files.
    /// This is a standard Rust `std::io::Error` converted to our error type.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Rendering a dump or report into a string failed
    #[error("Formatting error: {0}")]
    Format(#[from] std::fmt::Error),
}

impl SymdexError
{
    /// Whether the error only concerns a single unit and the index stays usable
    #[must_use]
    pub const fn is_unit_local(&self) -> bool
    {
        matches!(self, Self::ReadFailed { .. })
    }
}

/// Convenience type alias for `Result<T, SymdexError>`
///
/// ```rust
/// use symdex_core::error::SymdexResult;
/// fn foo() -> SymdexResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type SymdexResult<T> = std::result::Result<T, SymdexError>;

/// Id for the next entry of an arena currently holding `len` entries
pub(crate) fn next_id(len: usize, what: &'static str) -> SymdexResult<u32>
{
    u32::try_from(len).map_err(|_| SymdexError::CapacityExceeded(what))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_next_id_refuses_to_wrap()
    {
        assert_eq!(next_id(0, "symbols").unwrap(), 0);
        assert_eq!(next_id(u32::MAX as usize, "symbols").unwrap(), u32::MAX);

        let error = next_id(u32::MAX as usize + 1, "names").unwrap_err();
        assert!(matches!(error, SymdexError::CapacityExceeded("names")));
        assert_eq!(error.to_string(), "Too many names for 32-bit ids");
    }
}
