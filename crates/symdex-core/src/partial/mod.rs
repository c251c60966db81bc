//! # Partial index
//!
//! [`PartialIndex`] is the lazy symbol index of one binary image. It owns the
//! [`Store`] of partial units, the arena of full tables built so far, and the
//! collaborators that fill both.
//!
//! Queries are split over several files:
//!
//! - `resolve`: which unit covers an address
//! - `matcher`: which units define a name
//! - `expander`: turning a unit into its full table, exactly once
//! - `diagnostics`: dumps, statistics, consistency checks
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use symdex_core::dwarf;
//! use symdex_core::types::Address;
//! use symdex_core::IndexConfig;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>>
//! {
//!     let mut index = dwarf::open_index(Path::new("/path/to/binary"), None, IndexConfig::from_env())?;
//!     if let Some(table) = index.find_compunit_symtab(Address::new(0x401136), None, None)? {
//!         println!("{}", index.table(table).map_or("?", |t| t.filename.as_str()));
//!     }
//!     Ok(())
//! }
//! ```

mod diagnostics;
mod expander;
mod matcher;
mod resolve;

use std::path::PathBuf;

use tracing::info;

pub use diagnostics::ConsistencyFinding;
pub use matcher::{MatchOutcome, MatchRequest, OrderedCompare};

use crate::cancel::CancellationToken;
use crate::config::IndexConfig;
use crate::error::SymdexResult;
use crate::index::{CompunitSymtab, Store, TableArena, TableId, UnitId, UnitRange};
use crate::reader::{recorded_path, DebugInfoReader, ImageServices, SourceLocator};

/// Lazy partial symbol index of one binary image
pub struct PartialIndex
{
    store: Store,
    tables: TableArena,
    reader: Box<dyn DebugInfoReader>,
    image: Box<dyn ImageServices>,
    locator: Box<dyn SourceLocator>,
    config: IndexConfig,
    cancel: CancellationToken,
    scanned: bool,
}

impl std::fmt::Debug for PartialIndex
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("PartialIndex")
            .field("image", &self.image.name())
            .field("units", &self.store.len())
            .field("tables", &self.tables.len())
            .field("config", &self.config)
            .field("scanned", &self.scanned)
            .finish_non_exhaustive()
    }
}

impl PartialIndex
{
    /// Create an index whose partial symbols are read on first use
    pub fn new(
        image: Box<dyn ImageServices>,
        reader: Box<dyn DebugInfoReader>,
        locator: Box<dyn SourceLocator>,
        config: IndexConfig,
    ) -> Self
    {
        Self {
            store: Store::new(),
            tables: TableArena::new(),
            reader,
            image,
            locator,
            config,
            cancel: CancellationToken::new(),
            scanned: false,
        }
    }

    /// Share `token` with whoever may interrupt long operations
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self
    {
        self.cancel = token;
        self
    }

    /// The cancellation token checked between units
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken
    {
        &self.cancel
    }

    /// Behavior switches
    #[must_use]
    pub fn config(&self) -> &IndexConfig
    {
        &self.config
    }

    /// The image being indexed
    #[must_use]
    pub fn image(&self) -> &dyn ImageServices
    {
        self.image.as_ref()
    }

    /// The partial units, as scanned so far
    #[must_use]
    pub fn store(&self) -> &Store
    {
        &self.store
    }

    /// Mutable access to the store, for readers that are driven by hand
    pub fn store_mut(&mut self) -> &mut Store
    {
        &mut self.store
    }

    /// The full table behind `id`
    #[must_use]
    pub fn table(&self, id: TableId) -> Option<&CompunitSymtab>
    {
        self.tables.get(id)
    }

    /// Every full table built so far
    #[must_use]
    pub fn tables(&self) -> &TableArena
    {
        &self.tables
    }

    /// Whether the reader's partial scan has run
    #[must_use]
    pub fn is_scanned(&self) -> bool
    {
        self.scanned
    }

    /// Run the reader's partial scan if it has not run yet, then iterate over the units
    ///
    /// ## Errors
    ///
    /// Whatever the reader reports. The scan is not retried after a failure;
    /// the units installed before the error stay available.
    pub fn require_partial_symbols(&mut self) -> SymdexResult<UnitRange<'_>>
    {
        if !self.scanned {
            self.scanned = true;
            if self.config.verbose {
                info!("Reading symbols from {}...", self.image.name());
            }
            self.reader.read_partial_symbols(&mut self.store, self.image.as_ref())?;
            if self.config.verbose && self.store.is_empty() {
                info!("(No debugging symbols found in {})", self.image.name());
            }
        }
        Ok(self.store.range())
    }

    /// Whether the image has any unit at all
    ///
    /// ## Errors
    ///
    /// Errors of the partial scan.
    pub fn has_symbols(&mut self) -> SymdexResult<bool>
    {
        Ok(self.require_partial_symbols()?.next().is_some())
    }

    /// Whether some unit has not been read in yet
    ///
    /// ## Errors
    ///
    /// Errors of the partial scan.
    pub fn has_unexpanded_symtabs(&mut self) -> SymdexResult<bool>
    {
        self.require_partial_symbols()?;
        Ok(self
            .store
            .range()
            .any(|unit| !unit.is_shared() && !unit.state().is_read_in()))
    }

    /// Canonical path of `unit`'s source file
    ///
    /// Asks the source locator once per unit and caches the answer; when the
    /// locator finds nothing, the recorded `dirname/filename` is used.
    ///
    /// ## Errors
    ///
    /// `UnitNotFound` if the unit is not installed.
    pub fn fullname(&mut self, unit: UnitId) -> SymdexResult<PathBuf>
    {
        let target = self.store.get(unit)?;
        if let Some(cached) = target.cached_fullname() {
            return Ok(cached.to_path_buf());
        }
        let found = self
            .locator
            .find_and_open(target.filename(), target.dirname())
            .unwrap_or_else(|| recorded_path(target.filename(), target.dirname()));
        self.store.get_mut(unit)?.set_fullname(Some(found.clone()));
        Ok(found)
    }

    /// Forget every cached full path, e.g. after the source search path changed
    pub fn forget_cached_source_info(&mut self)
    {
        self.store.forget_cached_source_info();
    }
}
