//! Address-to-unit map.
//!
//! The map is a sorted set of breakpoints. Each breakpoint names the unit
//! owning the interval from its address up to the next breakpoint, or no
//! unit. Addresses below the first breakpoint belong to nobody.
//!
//! Ranges are added with "set empty" semantics: a range only claims the
//! addresses inside it that nobody owns yet. Readers record the ranges of
//! earlier units first, so the first unit to claim an address keeps it.

use std::collections::BTreeMap;

use super::unit::UnitId;
use crate::types::Address;

/// Map from unrelocated addresses to the units that own them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressMap
{
    transitions: BTreeMap<Address, Option<UnitId>>,
}

impl AddressMap
{
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Whether no range was ever recorded
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.transitions.is_empty()
    }

    /// Number of breakpoints
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.transitions.len()
    }

    /// The unit owning `address`
    ///
    /// ## Example
    ///
    /// ```rust
    /// use symdex_core::index::{AddressMap, UnitId};
    /// use symdex_core::types::Address;
    ///
    /// let a = UnitId::from_raw(1);
    /// let b = UnitId::from_raw(2);
    /// let mut map = AddressMap::new();
    /// map.set_empty(Address::new(0x1000), Address::new(0x2000), a);
    /// map.set_empty(Address::new(0x1800), Address::new(0x2800), b);
    ///
    /// assert_eq!(map.find(Address::new(0x1900)), Some(a));
    /// assert_eq!(map.find(Address::new(0x2100)), Some(b));
    /// assert_eq!(map.find(Address::new(0x2800)), None);
    /// ```
    #[must_use]
    pub fn find(&self, address: Address) -> Option<UnitId>
    {
        self.transitions
            .range(..=address)
            .next_back()
            .and_then(|(_, owner)| *owner)
    }

    /// Give `unit` every address in `[low, high)` that has no owner yet
    pub fn set_empty(&mut self, low: Address, high: Address, unit: UnitId)
    {
        if low >= high {
            return;
        }

        let owner_at_high = self.find(high);
        self.transitions.entry(high).or_insert(owner_at_high);
        let owner_at_low = self.find(low);
        self.transitions.entry(low).or_insert(owner_at_low);

        for owner in self.transitions.range_mut(low..high).map(|(_, owner)| owner) {
            if owner.is_none() {
                *owner = Some(unit);
            }
        }
        self.coalesce();
    }

    /// Release every interval owned by `unit`
    pub fn remove_unit(&mut self, unit: UnitId)
    {
        for owner in self.transitions.values_mut() {
            if *owner == Some(unit) {
                *owner = None;
            }
        }
        self.coalesce();
    }

    /// Breakpoints in address order
    pub fn entries(&self) -> impl Iterator<Item = (Address, Option<UnitId>)> + '_
    {
        self.transitions.iter().map(|(address, owner)| (*address, *owner))
    }

    /// Drop breakpoints that do not change the owner.
    fn coalesce(&mut self)
    {
        let mut previous = None;
        let redundant: Vec<Address> = self
            .transitions
            .iter()
            .filter_map(|(address, owner)| {
                let same = *owner == previous;
                previous = *owner;
                same.then_some(*address)
            })
            .collect();
        for address in redundant {
            self.transitions.remove(&address);
        }
    }
}
