//! Common module for library exports

pub use crate::backend::{IndexBackend, SymbolIndex};
pub use crate::cancel::CancellationToken;
pub use crate::config::IndexConfig;
pub use crate::error::{SymdexError, SymdexResult};
pub use crate::index::{CompunitSymtab, NewSymbol, Store, TableId, UnitId};
pub use crate::names::{LookupName, MatchType};
pub use crate::partial::{MatchOutcome, MatchRequest, PartialIndex};
pub use crate::reader::{DebugInfoReader, ImageServices, MinimalSymbol, SourceLocator};
pub use crate::types::{Address, AddressClass, Architecture, BlockSearchFlags, Domain, Placement, SearchKind};
