//! # Types
//!
//! Value types shared by the index, the readers, and the diagnostics.
//!
//! Nothing in here knows about units or stores; these are the vocabulary
//! the rest of the crate is written in (addresses, domains, address classes,
//! languages, search kinds).

pub mod address;
pub mod arch;
pub mod symbols;

// Re-export all public types
pub use address::Address;
pub use arch::Architecture;
pub use symbols::{
    AddressClass, BlockSearchFlags, Domain, Placement, SearchKind, SectionIndex, SymbolLanguage, SymbolName,
};
