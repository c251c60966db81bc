//! Tests for dumps, statistics, and the consistency check

mod common;

use common::{add_static_function, code_unit, index, unit_named, MockReader};
use regex::Regex;
use symdex_core::types::Address;
use symdex_core::ConsistencyFinding;

fn program() -> MockReader
{
    MockReader::new(|store| {
        let util = code_unit(store, "src/util.c", 0x2000, 0x3000, &[("util_init", 0x2000)])?;
        let main = code_unit(store, "src/main.c", 0x1000, 0x2000, &[("main", 0x1000)])?;
        add_static_function(store, main, "parse_args", 0x1400)?;
        store.add_dependency(main, util)?;
        store.record_address_range(main, Address::new(0x1000), Address::new(0x2000))?;
        store.record_address_range(util, Address::new(0x2000), Address::new(0x3000))?;
        Ok(())
    })
}

#[test]
fn test_expanded_units_are_consistent()
{
    let (mut index, _) = index(program());
    index.expand_all().unwrap();

    assert_eq!(index.check_consistency(), Vec::new());
}

#[test]
fn test_symbol_missing_from_full_table_is_reported()
{
    let (mut index, _) = index(program().omitting("parse_args"));
    index.expand_all().unwrap();
    let main = unit_named(&index, "src/main.c");

    let findings = index.check_consistency();
    assert_eq!(
        findings,
        vec![ConsistencyFinding::MissingSymbol {
            unit: main,
            filename: "src/main.c".to_string(),
            symbol: "parse_args".to_string(),
            global: false,
        }]
    );
    assert_eq!(
        findings[0].to_string(),
        "Static symbol `parse_args' only found in src/main.c unit"
    );
}

#[test]
fn test_static_function_at_zero_is_not_reported()
{
    let reader = MockReader::new(|store| {
        let unit = code_unit(store, "lib.c", 0x1000, 0x2000, &[("lib_fn", 0x1000)])?;
        add_static_function(store, unit, "discarded_inline", 0)?;
        Ok(())
    })
    .omitting("discarded_inline");
    let (mut index, _) = index(reader);
    index.expand_all().unwrap();

    assert!(index.check_consistency().is_empty());
}

#[test]
fn test_bad_range_is_reported_without_expanding()
{
    let (mut index, counters) = index(MockReader::new(|store| {
        let broken = store.create_unit("broken.c", None);
        store.set_text_range(broken, Address::new(0x3000), Address::new(0x1000))?;
        store.finalize(broken)?;
        Ok(())
    }));
    index.require_partial_symbols().unwrap();

    let findings = index.check_consistency();
    assert_eq!(findings.len(), 1);
    assert!(matches!(findings[0], ConsistencyFinding::BadRange { .. }));
    assert_eq!(
        findings[0].to_string(),
        "Unit broken.c covers bad range 0x0000000000003000 - 0x0000000000001000"
    );
    assert_eq!(counters.reads.get(), 0);
}

#[test]
fn test_bad_range_is_the_only_finding_for_a_read_in_unit()
{
    let reader = MockReader::new(|store| {
        let broken = store.create_unit("broken.c", None);
        store.set_text_range(broken, Address::new(0x3000), Address::new(0x1000))?;
        add_static_function(store, broken, "lost_helper", 0x1800)?;
        store.finalize(broken)?;
        Ok(())
    })
    .omitting("lost_helper")
    .with_block("broken.c", 0x4000, 0x5000);
    let (mut index, counters) = index(reader);
    index.expand_all().unwrap();
    assert_eq!(counters.reads.get(), 1);

    let findings = index.check_consistency();
    assert_eq!(findings.len(), 1);
    assert!(matches!(findings[0], ConsistencyFinding::BadRange { .. }));
}

#[test]
fn test_range_wider_than_table_block_is_reported()
{
    let (mut index, _) = index(program().with_block("src/util.c", 0x2000, 0x2800));
    index.expand_all().unwrap();
    let util = unit_named(&index, "src/util.c");

    assert_eq!(
        index.check_consistency(),
        vec![ConsistencyFinding::RangeExceedsBlock {
            unit: util,
            filename: "src/util.c".to_string(),
            low: Address::new(0x2000),
            high: Address::new(0x3000),
            block_start: Address::new(0x2000),
            block_end: Address::new(0x2800),
        }]
    );
}

#[test]
fn test_unexpanded_units_only_get_range_check()
{
    let (mut index, counters) = index(program().omitting("main").with_block("src/main.c", 0, 0x10));
    index.require_partial_symbols().unwrap();

    assert!(index.check_consistency().is_empty());
    assert_eq!(counters.reads.get(), 0);
}

#[test]
fn test_dump_unit_describes_state_and_symbols()
{
    let (mut index, _) = index(program());
    index.require_partial_symbols().unwrap();
    let main = unit_named(&index, "src/main.c");

    let before = index.dump_unit(main).unwrap();
    assert!(before.contains(&format!("Partial symtab for source file src/main.c ({main})")));
    assert!(before.contains("Read from object file mock-image"));
    assert!(before.contains("Symbols not yet read in"));
    assert!(before.contains("Address map supported - yes."));
    assert!(before.contains("Depends on 1 other partial symtabs."));
    assert!(before.contains("Global partial symbols:"));
    assert!(before.contains("`main'"));
    assert!(before.contains("Static partial symbols:"));
    assert!(before.contains("`parse_args'"));

    let table = index.expand(main).unwrap();
    let after = index.dump_unit(main).unwrap();
    assert!(after.contains(&format!("Full symtab was read ({table})")));
}

#[test]
fn test_dump_address_map_lists_breakpoints()
{
    let (mut index, _) = index(program());
    index.require_partial_symbols().unwrap();
    let main = unit_named(&index, "src/main.c");
    let util = unit_named(&index, "src/util.c");

    let all = index.dump_address_map(None).unwrap();
    assert!(all.starts_with("Address map of mock-image:\n"));
    assert!(all.contains(&format!("  0x0000000000001000 {main} (src/main.c)")));
    assert!(all.contains(&format!("  0x0000000000002000 {util} (src/util.c)")));
    assert!(all.contains("  0x0000000000003000 <nobody>"));

    let only_util = index.dump_address_map(Some(util)).unwrap();
    assert!(!only_util.contains("src/main.c"));
    assert!(only_util.contains("src/util.c"));
}

#[test]
fn test_info_units_filters_by_regex()
{
    let (mut index, _) = index(program());

    let everything = index.info_units(None).unwrap();
    assert!(everything.starts_with("{ image mock-image\n"));
    assert!(everything.contains("  { unit src/main.c ("));
    assert!(everything.contains("  { unit src/util.c ("));
    assert!(everything.contains("    readin no"));
    assert!(everything.contains("    statics 1"));

    let regex = Regex::new(r"util\.c$").unwrap();
    let filtered = index.info_units(Some(&regex)).unwrap();
    assert!(filtered.contains("src/util.c"));
    assert!(!filtered.contains("{ unit src/main.c"));

    let nothing = Regex::new("nothing-matches").unwrap();
    assert_eq!(index.info_units(Some(&nothing)).unwrap(), "");
}

#[test]
fn test_units_for_source_matches_trailing_components()
{
    let (mut index, _) = index(program());
    index.require_partial_symbols().unwrap();
    let util = unit_named(&index, "src/util.c");

    assert_eq!(index.units_for_source("util.c").unwrap(), vec![util]);
    assert_eq!(index.units_for_source("src/util.c").unwrap(), vec![util]);
    assert_eq!(index.units_for_source("/work/src/util.c").unwrap(), vec![util]);
    assert!(index.units_for_source("til.c").unwrap().is_empty());
}

#[test]
fn test_print_stats_reports_counts()
{
    let (mut index, _) = index(program());
    index.require_partial_symbols().unwrap();
    let main = unit_named(&index, "src/main.c");
    index.expand(main).unwrap();

    let stats = index.print_stats().unwrap();
    assert!(stats.starts_with("Statistics for 'mock-image':\n"));
    assert!(stats.contains("  Number of partial symbols read: 3\n"));
    assert!(stats.contains("  Number of units: 2\n"));
    assert!(stats.contains("  Number of full tables: 2\n"));
}
