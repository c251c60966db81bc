//! # symdex-core
//!
//! Lazy symbol index for a source-level debugger.
//!
//! Fully parsing the debug information of every compilation unit up front is
//! expensive. This crate keeps a small *partial* index per unit instead:
//! - the unit's address range, recorded in an address map
//! - its global and static symbol names, deduplicated through a shared cache
//! - links to the units it depends on
//!
//! Queries by address or by name find the unit they need and only then ask a
//! [`DebugInfoReader`](reader::DebugInfoReader) to build that unit's full
//! table. Every unit is expanded at most once.
//!
//! ## Layout
//!
//! - [`index`]: the store of units, the symbol cache, and the address map
//! - [`partial`]: [`PartialIndex`], which adds address resolution, name
//!   search, expansion, and diagnostics on top of the store
//! - [`backend`]: the [`SymbolIndex`] trait and the lazy / eager backends
//! - [`reader`]: the traits a debug-information reader implements
//! - [`dwarf`]: a reader for DWARF in ELF and Mach-O images

pub mod backend;
pub mod cancel;
pub mod config;
pub mod dwarf;
pub mod error;
pub mod index;
pub mod names;
pub mod partial;
pub mod paths;
pub mod prelude;
pub mod reader;
pub mod types;

pub use backend::{EagerIndex, IndexBackend, SymbolIndex};
pub use cancel::CancellationToken;
pub use config::IndexConfig;
pub use error::{SymdexError, SymdexResult};
pub use partial::{ConsistencyFinding, MatchOutcome, MatchRequest, PartialIndex};
