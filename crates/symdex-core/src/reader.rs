//! # Collaborator interfaces
//!
//! The index never parses debug information itself. It talks to three
//! collaborators:
//!
//! - a [`DebugInfoReader`] that fills the store with partial symbols and
//!   builds full tables on demand,
//! - [`ImageServices`] describing the binary image (name, architecture,
//!   relocation offset, minimal symbols),
//! - a [`SourceLocator`] that turns recorded file names into paths.
//!
//! [`crate::dwarf`] provides implementations backed by `object` and `gimli`;
//! tests script their own.

use std::path::{Path, PathBuf};

use crate::error::SymdexResult;
use crate::index::{CompunitSymtab, Store, Unit};
use crate::types::{Address, Architecture, SectionIndex};

/// An entry of the image's linker symbol table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimalSymbol
{
    /// Linkage name
    pub name: String,
    /// Relocated address
    pub address: Address,
    /// Size in bytes, 0 when unknown
    pub size: u64,
    /// Section the symbol lives in
    pub section: Option<SectionIndex>,
}

/// Reader of one debug-information format
pub trait DebugInfoReader
{
    /// Scan the image once, creating and finalizing one unit per compilation unit
    ///
    /// ## Errors
    ///
    /// Any error aborts the scan; units installed so far stay in the store.
    fn read_partial_symbols(&mut self, store: &mut Store, image: &dyn ImageServices) -> SymdexResult<()>;

    /// Build the full table of `unit`
    ///
    /// Called at most once per unit. The store is only borrowed for reading;
    /// the reader must not try to expand other units from here.
    ///
    /// ## Errors
    ///
    /// Failures are memoized on the unit and reported as `ReadFailed`.
    fn read_compunit(&mut self, unit: &Unit, store: &Store) -> SymdexResult<CompunitSymtab>;
}

/// Properties of the binary image being indexed
pub trait ImageServices
{
    /// Name of the image, usually its path
    fn name(&self) -> &str;

    /// Architecture the image was built for
    fn architecture(&self) -> Architecture;

    /// Amount added to every unrelocated address to get the loaded address
    fn text_section_offset(&self) -> u64;

    /// The linker symbol covering the relocated address `pc`
    fn lookup_minimal_symbol_by_pc(&self, pc: Address) -> Option<MinimalSymbol>;
}

/// Maps recorded source file names to paths on this machine
pub trait SourceLocator
{
    /// Find `filename` (relative to `dirname` when given) and return its canonical path
    fn find_and_open(&mut self, filename: &str, dirname: Option<&str>) -> Option<PathBuf>;
}

/// Locator that checks the file system and canonicalizes what it finds
#[derive(Debug, Clone, Default)]
pub struct FsSourceLocator
{
    search_dirs: Vec<PathBuf>,
}

impl FsSourceLocator
{
    /// Create a locator that only looks at the recorded paths
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Also look for relative file names under `dir`
    #[must_use]
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self
    {
        self.search_dirs.push(dir.into());
        self
    }
}

impl SourceLocator for FsSourceLocator
{
    fn find_and_open(&mut self, filename: &str, dirname: Option<&str>) -> Option<PathBuf>
    {
        let recorded = recorded_path(filename, dirname);
        std::iter::once(recorded)
            .chain(self.search_dirs.iter().map(|dir| dir.join(filename)))
            .find(|candidate| candidate.is_file())
            .and_then(|found| found.canonicalize().ok())
    }
}

/// `dirname/filename`, or `filename` when it is absolute or there is no directory
#[must_use]
pub fn recorded_path(filename: &str, dirname: Option<&str>) -> PathBuf
{
    let file = Path::new(filename);
    match dirname {
        Some(dir) if !file.is_absolute() => Path::new(dir).join(file),
        _ => file.to_path_buf(),
    }
}
