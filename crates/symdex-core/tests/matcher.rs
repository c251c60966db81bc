//! Tests for name, file, and domain based searches over units

mod common;

use std::ops::ControlFlow;

use common::{add_static_function, code_unit, index, index_with, unit_named, Counters, MockImage, MockReader};
use symdex_core::index::{CompunitSymtab, NewSymbol, Store, TableId};
use symdex_core::names::{LookupName, MatchType};
use symdex_core::types::{Address, AddressClass, BlockSearchFlags, Domain, SearchKind, SymbolLanguage};
use symdex_core::{IndexConfig, MatchOutcome, MatchRequest, PartialIndex, SymdexResult};

/// Run a pass and collect the file names handed to the callback
fn expanded_files(index: &mut PartialIndex, request: MatchRequest<'_>) -> (MatchOutcome, Vec<String>)
{
    let mut files = Vec::new();
    let outcome = index
        .expand_symtabs_matching(request, |_: TableId, table: &CompunitSymtab| {
            files.push(table.filename.clone());
            ControlFlow::Continue(())
        })
        .unwrap();
    (outcome, files)
}

fn three_units(store: &mut Store) -> SymdexResult<()>
{
    code_unit(store, "one.c", 0x1000, 0x2000, &[("one", 0x1000), ("shared_name", 0x1800)])?;
    code_unit(store, "two.c", 0x2000, 0x3000, &[("two", 0x2000)])?;
    code_unit(store, "three.c", 0x3000, 0x4000, &[("three", 0x3000)])?;
    Ok(())
}

fn source_tree() -> (PartialIndex, Counters)
{
    source_tree_with(IndexConfig::default())
}

fn source_tree_with(config: IndexConfig) -> (PartialIndex, Counters)
{
    let reader = MockReader::new(|store| {
        code_unit(store, "src/main.c", 0x1000, 0x2000, &[("main", 0x1000)])?;
        code_unit(store, "src/util.c", 0x2000, 0x3000, &[("util", 0x2000)])?;
        Ok(())
    });
    index_with(reader, config, MockImage::default())
}

#[test]
fn test_lookup_name_expands_only_defining_units()
{
    let (mut index, counters) = index(MockReader::new(three_units));
    let name = LookupName::new("two");

    let (outcome, files) = expanded_files(&mut index, MatchRequest::new().lookup_name(&name));
    assert_eq!(outcome, MatchOutcome::Completed);
    assert_eq!(files, vec!["two.c"]);
    assert_eq!(counters.reads.get(), 1);
}

#[test]
fn test_empty_request_expands_everything_not_read_in()
{
    let (mut index, counters) = index(MockReader::new(three_units));
    index.require_partial_symbols().unwrap();
    let two = unit_named(&index, "two.c");
    index.expand(two).unwrap();

    let (_, files) = expanded_files(&mut index, MatchRequest::new());
    assert_eq!(files, vec!["three.c", "one.c"]);
    assert_eq!(counters.reads.get(), 3);
}

#[test]
fn test_callback_can_stop_the_pass()
{
    let (mut index, counters) = index(MockReader::new(three_units));

    let mut seen = 0;
    let outcome = index
        .expand_symtabs_matching(MatchRequest::new(), |_, _| {
            seen += 1;
            ControlFlow::Break(())
        })
        .unwrap();
    assert_eq!(outcome, MatchOutcome::Stopped);
    assert_eq!(seen, 1);
    assert_eq!(counters.reads.get(), 1);
}

#[test]
fn test_basename_mismatch_skips_source_lookup()
{
    let (mut index, counters) = source_tree();
    let mut filter = |name: &str, basename_only: bool| {
        if basename_only {
            name == "util.c"
        } else {
            name == "/work/src/util.c"
        }
    };

    let (_, files) = expanded_files(&mut index, MatchRequest::new().file_filter(&mut filter));
    assert_eq!(files, vec!["src/util.c"]);
    // Only util.c got past the basename check.
    assert_eq!(counters.locates.get(), 1);
}

#[test]
fn test_basenames_may_differ_always_resolves_full_path()
{
    let (mut index, counters) = source_tree_with(IndexConfig::default().with_basenames_may_differ(true));
    let mut reject_all = |_: &str, _: bool| false;

    let (_, files) = expanded_files(&mut index, MatchRequest::new().file_filter(&mut reject_all));
    assert!(files.is_empty());
    assert_eq!(counters.locates.get(), 2);

    // Full paths are cached per unit.
    let (_, files) = expanded_files(&mut index, MatchRequest::new().file_filter(&mut reject_all));
    assert!(files.is_empty());
    assert_eq!(counters.locates.get(), 2);
}

#[test]
fn test_recorded_name_match_needs_no_source_lookup()
{
    let (mut index, counters) = source_tree();
    let mut filter = |name: &str, _: bool| name == "src/main.c";

    let (_, files) = expanded_files(&mut index, MatchRequest::new().file_filter(&mut filter));
    assert_eq!(files, vec!["src/main.c"]);
    assert_eq!(counters.locates.get(), 0);
}

#[test]
fn test_anonymous_units_never_match_file_filters()
{
    let reader = MockReader::new(|store| {
        let anon = store.create_anonymous_unit("<artificial>");
        store.set_text_range(anon, Address::new(0x1000), Address::new(0x2000))?;
        store.finalize(anon)?;
        Ok(())
    });
    let (mut index, counters) = index(reader);
    let mut accept_all = |_: &str, _: bool| true;

    let (_, files) = expanded_files(&mut index, MatchRequest::new().file_filter(&mut accept_all));
    assert!(files.is_empty());
    assert_eq!(counters.reads.get(), 0);
}

#[test]
fn test_symbol_in_shared_dependency_expands_owner()
{
    let (mut index, counters) = index(MockReader::new(|store| {
        let header = code_unit(store, "util.h", 0x1000, 0x2000, &[("inline_helper", 0x1200)])?;
        let owner = code_unit(store, "main.c", 0x1000, 0x2000, &[("main", 0x1000)])?;
        store.set_user(header, owner)?;
        store.add_dependency(owner, header)?;
        Ok(())
    }));
    let name = LookupName::new("inline_helper");

    let (_, files) = expanded_files(&mut index, MatchRequest::new().lookup_name(&name));
    assert_eq!(files, vec!["main.c"]);
    assert_eq!(counters.reads.get(), 1);
}

#[test]
fn test_cyclic_shared_dependencies_terminate()
{
    let scan = |store: &mut Store| -> SymdexResult<()> {
        let owner = code_unit(store, "main.c", 0x1000, 0x2000, &[("main", 0x1000)])?;
        let one = code_unit(store, "one.h", 0x1000, 0x2000, &[])?;
        let two = code_unit(store, "two.h", 0x1000, 0x2000, &[])?;
        let three = code_unit(store, "three.h", 0x1000, 0x2000, &[("deep", 0x1500)])?;
        for shared in [one, two, three] {
            store.set_user(shared, owner)?;
        }
        store.add_dependency(owner, one)?;
        store.add_dependency(one, two)?;
        store.add_dependency(two, three)?;
        store.add_dependency(three, one)?;
        Ok(())
    };

    let (mut index, counters) = index(MockReader::new(scan));
    let missing = LookupName::new("nowhere");
    let (outcome, files) = expanded_files(&mut index, MatchRequest::new().lookup_name(&missing));
    assert_eq!(outcome, MatchOutcome::Completed);
    assert!(files.is_empty());
    assert_eq!(counters.reads.get(), 0);

    let deep = LookupName::new("deep");
    let (_, files) = expanded_files(&mut index, MatchRequest::new().lookup_name(&deep));
    assert_eq!(files, vec!["main.c"]);
    assert_eq!(counters.reads.get(), 1);
}

#[test]
fn test_shared_dependency_is_searched_once_per_pass()
{
    let (mut index, counters) = index(MockReader::new(|store| {
        let header = code_unit(store, "common.h", 0x1000, 0x2000, &[("shared_helper", 0x1200)])?;
        let left = code_unit(store, "left.c", 0x1000, 0x1800, &[("left", 0x1000)])?;
        let right = code_unit(store, "right.c", 0x1800, 0x2000, &[("right", 0x1800)])?;
        store.set_user(header, left)?;
        store.add_dependency(left, header)?;
        store.add_dependency(right, header)?;
        Ok(())
    }));
    let mut helper_checks = 0;
    let mut count_helper = |name: &str| {
        if name == "shared_helper" {
            helper_checks += 1;
        }
        false
    };

    let (outcome, files) = expanded_files(&mut index, MatchRequest::new().symbol_filter(&mut count_helper));
    assert_eq!(outcome, MatchOutcome::Completed);
    assert!(files.is_empty());
    assert_eq!(helper_checks, 1);
    assert_eq!(counters.reads.get(), 0);
}

#[test]
fn test_kind_and_symbol_filter()
{
    let (mut index, _) = index(MockReader::new(|store| {
        let vars = store.create_unit("vars.c", None);
        store.add_symbol(
            vars,
            NewSymbol::variable("counter", Address::new(0x8000)).language(SymbolLanguage::C),
        )?;
        store.finalize(vars)?;
        code_unit(store, "funcs.c", 0x1000, 0x2000, &[("counter_reset", 0x1000)])?;
        Ok(())
    }));
    let mut starts_with_counter = |name: &str| name.starts_with("counter");

    let request = MatchRequest::new()
        .symbol_filter(&mut starts_with_counter)
        .kind(SearchKind::Functions);
    let (_, files) = expanded_files(&mut index, request);
    assert_eq!(files, vec!["funcs.c"]);

    let request = MatchRequest::new()
        .symbol_filter(&mut starts_with_counter)
        .kind(SearchKind::Variables);
    let (_, files) = expanded_files(&mut index, request);
    assert_eq!(files, vec!["vars.c"]);
}

#[test]
fn test_block_flags_select_symbol_lists()
{
    let (mut index, counters) = index(MockReader::new(|store| {
        let unit = code_unit(store, "hidden.c", 0x1000, 0x2000, &[("visible", 0x1000)])?;
        add_static_function(store, unit, "hidden", 0x1800)?;
        Ok(())
    }));
    let name = LookupName::new("hidden");

    let request = MatchRequest::new()
        .lookup_name(&name)
        .block_flags(BlockSearchFlags::GLOBAL);
    let (_, files) = expanded_files(&mut index, request);
    assert!(files.is_empty());

    let request = MatchRequest::new()
        .lookup_name(&name)
        .block_flags(BlockSearchFlags::STATIC);
    let (_, files) = expanded_files(&mut index, request);
    assert_eq!(files, vec!["hidden.c"]);
    assert_eq!(counters.reads.get(), 1);
}

#[test]
fn test_struct_tags_match_var_domain_in_cpp_only()
{
    let scan = |store: &mut Store| -> SymdexResult<()> {
        let cpp = store.create_unit("shapes.cc", None);
        store.add_symbol(
            cpp,
            NewSymbol::new("Point", Domain::Struct, AddressClass::Typedef).language(SymbolLanguage::Cpp),
        )?;
        store.finalize(cpp)?;
        let c = store.create_unit("shapes.c", None);
        store.add_symbol(
            c,
            NewSymbol::new("Point", Domain::Struct, AddressClass::Typedef)
                .language(SymbolLanguage::C)
                .at(Address::new(1)),
        )?;
        store.finalize(c)?;
        Ok(())
    };
    let (mut index, _) = index(MockReader::new(scan));
    let name = LookupName::new("Point");

    let (_, files) = expanded_files(&mut index, MatchRequest::new().lookup_name(&name).domain(Domain::Var));
    assert_eq!(files, vec!["shapes.cc"]);

    let (_, files) = expanded_files(&mut index, MatchRequest::new().lookup_name(&name).domain(Domain::Struct));
    assert_eq!(files, vec!["shapes.c"]);

    let (_, files) = expanded_files(&mut index, MatchRequest::new().lookup_name(&name).domain(Domain::Module));
    assert!(files.is_empty());
}

#[test]
fn test_search_ignores_parameter_lists_and_supports_wild_names()
{
    let scan = |store: &mut Store| -> SymdexResult<()> {
        let cpp = store.create_unit("overloads.cc", None);
        store.add_symbol(
            cpp,
            NewSymbol::function("scale(int)", Address::new(0x1000)).language(SymbolLanguage::Cpp),
        )?;
        store.finalize(cpp)?;
        let rust = store.create_unit("lib.rs", None);
        store.add_symbol(
            rust,
            NewSymbol::function("app::worker::run", Address::new(0x2000)).language(SymbolLanguage::Rust),
        )?;
        store.finalize(rust)?;
        Ok(())
    };
    let (mut index, _) = index(MockReader::new(scan));

    let scale = LookupName::new("scale");
    let (_, files) = expanded_files(&mut index, MatchRequest::new().lookup_name(&scale));
    assert_eq!(files, vec!["overloads.cc"]);

    let run = LookupName::new("run");
    let (_, files) = expanded_files(&mut index, MatchRequest::new().lookup_name(&run));
    assert!(files.is_empty());

    let wild = LookupName::new("run").with_match_type(MatchType::Wild);
    let (_, files) = expanded_files(&mut index, MatchRequest::new().lookup_name(&wild));
    assert_eq!(files, vec!["lib.rs"]);
}

#[test]
fn test_global_symbol_language_honors_case_setting()
{
    let scan = |store: &mut Store| -> SymdexResult<()> {
        code_unit(store, "main.c", 0x1000, 0x2000, &[("main", 0x1000)])?;
        Ok(())
    };

    let (mut sensitive, _) = index(MockReader::new(scan));
    assert_eq!(
        sensitive.lookup_global_symbol_language("main", Domain::Var).unwrap(),
        Some(SymbolLanguage::C)
    );
    assert_eq!(sensitive.lookup_global_symbol_language("MAIN", Domain::Var).unwrap(), None);

    let config = IndexConfig::default().with_case_sensitive(false);
    let (mut insensitive, _) = index_with(MockReader::new(scan), config, MockImage::default());
    assert_eq!(
        insensitive.lookup_global_symbol_language("MAIN", Domain::Var).unwrap(),
        Some(SymbolLanguage::C)
    );
}

#[test]
fn test_global_symbol_language_skips_read_in_units()
{
    let (mut index, _) = index(MockReader::new(three_units));
    index.require_partial_symbols().unwrap();
    let one = unit_named(&index, "one.c");

    assert!(index
        .lookup_global_symbol_language("shared_name", Domain::Var)
        .unwrap()
        .is_some());
    index.expand(one).unwrap();
    assert_eq!(index.lookup_global_symbol_language("shared_name", Domain::Var).unwrap(), None);
}

#[test]
fn test_expand_matching_symbols_counts_expansions()
{
    let (mut index, counters) = index(MockReader::new(three_units));

    let expanded = index
        .expand_matching_symbols(&LookupName::new("three"), Domain::Var, true, None)
        .unwrap();
    assert_eq!(expanded, 1);
    assert_eq!(*counters.expanded.borrow(), vec!["three.c".to_string()]);

    let again = index
        .expand_matching_symbols(&LookupName::new("three"), Domain::Var, true, None)
        .unwrap();
    assert_eq!(again, 0);
}

#[test]
fn test_map_symbol_filenames_visits_unexpanded_primary_units()
{
    let (mut index, _) = index(MockReader::new(|store| {
        let main = code_unit(store, "main.c", 0x1000, 0x2000, &[("main", 0x1000)])?;
        let header = code_unit(store, "main.h", 0x1000, 0x2000, &[])?;
        store.set_user(header, main)?;
        code_unit(store, "done.c", 0x3000, 0x4000, &[("done", 0x3000)])?;
        store.create_anonymous_unit("<artificial>");
        Ok(())
    }));
    index.require_partial_symbols().unwrap();
    let done = unit_named(&index, "done.c");
    index.expand(done).unwrap();

    let mut visited = Vec::new();
    index
        .map_symbol_filenames(
            |name, fullname| visited.push((name.to_string(), fullname.map(|path| path.display().to_string()))),
            true,
        )
        .unwrap();
    assert_eq!(visited, vec![("main.c".to_string(), Some("/work/main.c".to_string()))]);
}

#[test]
fn test_last_source_symtab_skips_headers()
{
    let (mut index, _) = index(MockReader::new(|store| {
        code_unit(store, "main.c", 0x1000, 0x2000, &[("main", 0x1000)])?;
        code_unit(store, "second.c", 0x2000, 0x3000, &[("second", 0x2000)])?;
        code_unit(store, "types.h", 0x0, 0x0, &[])?;
        code_unit(store, "<<C++-namespaces>>", 0x0, 0x0, &[])?;
        Ok(())
    }));

    let table = index.find_last_source_symtab().unwrap().unwrap();
    assert_eq!(index.table(table).unwrap().filename, "main.c");
}
