//! Tests for the lazy and eager backends behind `SymbolIndex`

mod common;

use std::ops::ControlFlow;

use common::{code_unit, index, index_with, MockImage, MockReader};
use symdex_core::names::LookupName;
use symdex_core::reader::MinimalSymbol;
use symdex_core::types::{Address, Domain, SymbolLanguage};
use symdex_core::{IndexBackend, IndexConfig, MatchOutcome, MatchRequest, SymbolIndex};

fn nested_units() -> MockReader
{
    MockReader::new(|store| {
        code_unit(store, "outer.c", 0x1000, 0x4000, &[("outer", 0x1000)])?;
        code_unit(store, "inner.c", 0x2000, 0x2800, &[("inner", 0x2000)])?;
        Ok(())
    })
}

fn overlapping_units() -> MockReader
{
    MockReader::new(|store| {
        code_unit(store, "a.c", 0x1000, 0x2000, &[("a_main", 0x1000), ("a_tail", 0x1900)])?;
        code_unit(store, "b.c", 0x1800, 0x2800, &[("b_entry", 0x1850)])?;
        Ok(())
    })
}

fn table_name(backend: &IndexBackend, pc_table: Option<symdex_core::index::TableId>) -> Option<String>
{
    pc_table
        .and_then(|id| backend.table(id))
        .map(|table| table.filename.clone())
}

#[test]
fn test_select_picks_backend_by_readnow()
{
    let (partial, counters) = index(nested_units());
    let backend = IndexBackend::select(partial, false).unwrap();
    assert!(matches!(backend, IndexBackend::Partial(_)));
    assert_eq!(counters.reads.get(), 0);

    let (partial, counters) = index(nested_units());
    let backend = IndexBackend::select(partial, true).unwrap();
    assert!(matches!(backend, IndexBackend::Eager(_)));
    assert_eq!(counters.reads.get(), 2);
}

#[test]
fn test_eager_backend_has_nothing_left_to_expand()
{
    let (partial, counters) = index(nested_units());
    let mut backend = IndexBackend::select(partial, true).unwrap();

    assert!(backend.has_symbols().unwrap());
    assert!(!backend.has_unexpanded_symtabs().unwrap());
    backend.expand_all().unwrap();
    assert_eq!(counters.reads.get(), 2);
    assert!(backend.stats().unwrap().contains("  Read now: all units expanded at load"));
}

#[test]
fn test_eager_backend_prefers_narrowest_table()
{
    let (partial, _) = index(nested_units());
    let mut backend = IndexBackend::select(partial, true).unwrap();

    let inner = backend.find_compunit_symtab(Address::new(0x2100), None).unwrap();
    assert_eq!(table_name(&backend, inner).as_deref(), Some("inner.c"));
    let outer = backend.find_compunit_symtab(Address::new(0x3000), None).unwrap();
    assert_eq!(table_name(&backend, outer).as_deref(), Some("outer.c"));
    assert_eq!(backend.find_compunit_symtab(Address::new(0x5000), None).unwrap(), None);

    let producer = backend.find_unit_for_pc(Address::new(0x2100), None).unwrap();
    let inner_unit = backend
        .partial()
        .store()
        .range()
        .find(|unit| unit.filename() == "inner.c")
        .map(|unit| unit.id());
    assert_eq!(producer, inner_unit);
}

#[test]
fn test_eager_backend_searches_full_tables()
{
    let (partial, _) = index(nested_units());
    let mut backend = IndexBackend::select(partial, true).unwrap();
    let name = LookupName::new("inner");

    let mut files = Vec::new();
    let outcome = backend
        .expand_symtabs_matching(MatchRequest::new().lookup_name(&name), &mut |_, table| {
            files.push(table.filename.clone());
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(outcome, MatchOutcome::Completed);
    assert_eq!(files, vec!["inner.c"]);

    let mut seen = 0;
    let outcome = backend
        .expand_symtabs_matching(MatchRequest::new(), &mut |_, _| {
            seen += 1;
            ControlFlow::Break(())
        })
        .unwrap();
    assert_eq!(outcome, MatchOutcome::Stopped);
    assert_eq!(seen, 1);

    assert_eq!(
        backend.lookup_global_symbol_language("outer", Domain::Var).unwrap(),
        Some(SymbolLanguage::C)
    );
}

#[test]
fn test_eager_backend_leaves_out_failed_units()
{
    let (partial, _) = index(nested_units().failing("outer.c"));
    let mut backend = IndexBackend::select(partial, true).unwrap();

    assert_eq!(backend.partial().tables().len(), 1);
    assert_eq!(backend.find_compunit_symtab(Address::new(0x3000), None).unwrap(), None);
}

#[test]
fn test_partial_backend_takes_hint_from_linker_symbols()
{
    let image = MockImage {
        text_offset: 0,
        minimal: vec![MinimalSymbol {
            name: "b_entry".to_string(),
            address: Address::new(0x1850),
            size: 0,
            section: None,
        }],
    };
    let (partial, counters) = index_with(overlapping_units(), IndexConfig::default(), image);
    let mut backend = IndexBackend::select(partial, false).unwrap();

    let table = backend.find_compunit_symtab(Address::new(0x1900), None).unwrap();
    assert_eq!(table_name(&backend, table).as_deref(), Some("b.c"));
    assert_eq!(counters.reads.get(), 1);
}

#[test]
fn test_partial_backend_dump_covers_units_and_address_map()
{
    let (partial, counters) = index(nested_units());
    let mut backend = IndexBackend::select(partial, false).unwrap();

    let dump = backend.dump().unwrap();
    assert!(dump.contains("Partial symtab for source file outer.c"));
    assert!(dump.contains("Partial symtab for source file inner.c"));
    assert!(dump.contains("Address map of mock-image:"));
    assert_eq!(counters.reads.get(), 0);
}
