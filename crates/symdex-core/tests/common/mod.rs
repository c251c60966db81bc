//! Scripted collaborators for driving a `PartialIndex` without a real image

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

use symdex_core::error::{SymdexError, SymdexResult};
use symdex_core::index::{Block, CompunitSymtab, FullSymbol, NewSymbol, Store, SymbolId, Unit, UnitId};
use symdex_core::reader::{DebugInfoReader, ImageServices, MinimalSymbol, SourceLocator};
use symdex_core::types::{Address, Architecture, Placement, SymbolLanguage};
use symdex_core::{IndexConfig, PartialIndex};

type Scan = Box<dyn FnOnce(&mut Store) -> SymdexResult<()>>;

/// Counters shared between a test and the collaborators it handed to the index
#[derive(Debug, Clone, Default)]
pub struct Counters
{
    /// Calls to `read_partial_symbols`
    pub scans: Rc<Cell<usize>>,
    /// Calls to `read_compunit`
    pub reads: Rc<Cell<usize>>,
    /// File names passed to `read_compunit`, in call order
    pub expanded: Rc<RefCell<Vec<String>>>,
    /// Calls to the source locator
    pub locates: Rc<Cell<usize>>,
}

/// Reader whose partial scan is a closure and whose full tables mirror the partial symbols
pub struct MockReader
{
    scan: Option<Scan>,
    counters: Counters,
    failing: HashSet<String>,
    omitted: HashSet<String>,
    blocks: HashMap<String, (Address, Address)>,
}

impl MockReader
{
    pub fn new(scan: impl FnOnce(&mut Store) -> SymdexResult<()> + 'static) -> Self
    {
        Self {
            scan: Some(Box::new(scan)),
            counters: Counters::default(),
            failing: HashSet::new(),
            omitted: HashSet::new(),
            blocks: HashMap::new(),
        }
    }

    /// `read_compunit` fails for the unit called `filename`
    pub fn failing(mut self, filename: &str) -> Self
    {
        self.failing.insert(filename.to_string());
        self
    }

    /// Full tables leave out symbols called `name`
    pub fn omitting(mut self, name: &str) -> Self
    {
        self.omitted.insert(name.to_string());
        self
    }

    /// Full table blocks of `filename` span `[low, high)` instead of the unit's range
    pub fn with_block(mut self, filename: &str, low: u64, high: u64) -> Self
    {
        self.blocks
            .insert(filename.to_string(), (Address::new(low), Address::new(high)));
        self
    }

    fn full_symbols(&self, store: &Store, ids: &[SymbolId]) -> Vec<FullSymbol>
    {
        ids.iter()
            .filter_map(|id| {
                let symbol = store.symbol(*id)?;
                let name = store.symbol_name(*id);
                if self.omitted.contains(name) {
                    return None;
                }
                Some(FullSymbol {
                    name: name.to_string(),
                    domain: symbol.domain,
                    class: symbol.class,
                    address: symbol.address,
                    language: symbol.language,
                })
            })
            .collect()
    }
}

impl DebugInfoReader for MockReader
{
    fn read_partial_symbols(&mut self, store: &mut Store, _image: &dyn ImageServices) -> SymdexResult<()>
    {
        self.counters.scans.set(self.counters.scans.get() + 1);
        match self.scan.take() {
            Some(scan) => scan(store),
            None => Ok(()),
        }
    }

    fn read_compunit(&mut self, unit: &Unit, store: &Store) -> SymdexResult<CompunitSymtab>
    {
        self.counters.reads.set(self.counters.reads.get() + 1);
        self.counters.expanded.borrow_mut().push(unit.filename().to_string());
        if self.failing.contains(unit.filename()) {
            return Err(SymdexError::Image(format!("corrupt debug info in {}", unit.filename())));
        }

        let (start, end) = self
            .blocks
            .get(unit.filename())
            .copied()
            .unwrap_or_else(|| unit.text_range(store.cache()));
        let mut table = CompunitSymtab::new(unit.filename());
        table.global_block = Block {
            start,
            end,
            symbols: self.full_symbols(store, unit.global_symbols()),
        };
        table.static_block = Block {
            start,
            end,
            symbols: self.full_symbols(store, unit.static_symbols()),
        };

        // Shared units owned by this one contribute to its table.
        for shared in store.range() {
            if shared.id() != unit.id() && shared.is_shared() && store.owner_of(shared.id()).ok() == Some(unit.id()) {
                table
                    .global_block
                    .symbols
                    .extend(self.full_symbols(store, shared.global_symbols()));
                table
                    .static_block
                    .symbols
                    .extend(self.full_symbols(store, shared.static_symbols()));
            }
        }
        Ok(table)
    }
}

/// Image with a fixed text offset and a sorted list of linker symbols
#[derive(Debug, Clone, Default)]
pub struct MockImage
{
    pub text_offset: u64,
    pub minimal: Vec<MinimalSymbol>,
}

impl MockImage
{
    pub fn with_offset(text_offset: u64) -> Self
    {
        Self {
            text_offset,
            minimal: Vec::new(),
        }
    }
}

impl ImageServices for MockImage
{
    fn name(&self) -> &str
    {
        "mock-image"
    }

    fn architecture(&self) -> Architecture
    {
        Architecture::X86_64
    }

    fn text_section_offset(&self) -> u64
    {
        self.text_offset
    }

    fn lookup_minimal_symbol_by_pc(&self, pc: Address) -> Option<MinimalSymbol>
    {
        self.minimal.iter().rev().find(|symbol| symbol.address <= pc).cloned()
    }
}

/// Locator that resolves every file under `/work` and counts its calls
#[derive(Debug, Clone)]
pub struct MockLocator
{
    calls: Rc<Cell<usize>>,
}

impl SourceLocator for MockLocator
{
    fn find_and_open(&mut self, filename: &str, _dirname: Option<&str>) -> Option<PathBuf>
    {
        self.calls.set(self.calls.get() + 1);
        Some(PathBuf::from("/work").join(filename))
    }
}

/// Index over `reader` with the default configuration and no text offset
pub fn index(reader: MockReader) -> (PartialIndex, Counters)
{
    index_with(reader, IndexConfig::default(), MockImage::default())
}

/// Index over `reader` with an explicit configuration and image
pub fn index_with(reader: MockReader, config: IndexConfig, image: MockImage) -> (PartialIndex, Counters)
{
    let counters = reader.counters.clone();
    let locator = MockLocator {
        calls: counters.locates.clone(),
    };
    let index = PartialIndex::new(Box::new(image), Box::new(reader), Box::new(locator), config);
    (index, counters)
}

/// Create a finalized unit `[low, high)` holding global C functions
pub fn code_unit(store: &mut Store, filename: &str, low: u64, high: u64, functions: &[(&str, u64)])
    -> SymdexResult<UnitId>
{
    let unit = store.create_unit(filename, Some(Address::new(low)));
    store.set_text_range(unit, Address::new(low), Address::new(high))?;
    for (name, address) in functions {
        store.add_symbol(
            unit,
            NewSymbol::function(name, Address::new(*address)).language(SymbolLanguage::C),
        )?;
    }
    store.finalize(unit)?;
    Ok(unit)
}

/// Add a file-local C function to `unit`
pub fn add_static_function(store: &mut Store, unit: UnitId, name: &str, address: u64) -> SymdexResult<SymbolId>
{
    let (id, _) = store.add_symbol(
        unit,
        NewSymbol::function(name, Address::new(address))
            .language(SymbolLanguage::C)
            .placement(Placement::Static),
    )?;
    Ok(id)
}

/// Look a unit up by file name
pub fn unit_named(index: &PartialIndex, filename: &str) -> UnitId
{
    index
        .store()
        .range()
        .find(|unit| unit.filename() == filename)
        .map(Unit::id)
        .unwrap_or_else(|| panic!("no unit named {filename}"))
}
