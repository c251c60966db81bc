//! Code address type.

use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed code address
///
/// This wrapper around `u64` keeps addresses apart from sizes, counts, and
/// symbol ids when they travel through the index.
///
/// ## Relocated and unrelocated addresses
///
/// Everything the reader stores in the index (unit ranges, symbol addresses,
/// address map breakpoints) is *unrelocated*: it is the address recorded in
/// the debug information. Queries arrive with *relocated* program counters,
/// i.e. the address at which the image was actually loaded. The two differ by
/// the image's text section offset, which may be "negative" when the image
/// was loaded below its link address, so both conversions wrap.
///
/// ## Example
///
/// ```rust
/// use symdex_core::types::Address;
///
/// let linked = Address::from(0x1000);
/// let loaded = linked.relocate(0x5555_0000);
/// assert_eq!(loaded.value(), 0x5555_1000);
/// assert_eq!(loaded.unrelocate(0x5555_0000), linked);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    ///
    /// Symbols at address zero are usually unrelocated placeholders; the
    /// closest-symbol search treats them specially.
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    ///
    /// This is equivalent to `Address::from(value)` but can be used in const contexts.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use symdex_core::types::Address;
    ///
    /// const ENTRY: Address = Address::new(0x401000);
    /// assert_eq!(ENTRY.value(), 0x401000);
    /// ```
    #[must_use]
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    #[must_use]
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// ## Example
    ///
    /// ```rust
    /// use symdex_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_add(0x100), Some(Address::from(0x1100)));
    /// assert_eq!(addr.checked_add(u64::MAX), None); // Overflow
    /// ```
    #[must_use]
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract an offset from this address, checking for underflow
    #[must_use]
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Add an offset to this address, saturating at the maximum value
    #[must_use]
    pub fn saturating_add(self, offset: u64) -> Self
    {
        Address(self.0.saturating_add(offset))
    }

    /// Translate an unrelocated address into the image's loaded address space
    #[must_use]
    pub const fn relocate(self, text_offset: u64) -> Self
    {
        Address(self.0.wrapping_add(text_offset))
    }

    /// Translate a loaded address back into the address space of the debug information
    #[must_use]
    pub const fn unrelocate(self, text_offset: u64) -> Self
    {
        Address(self.0.wrapping_sub(text_offset))
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}
