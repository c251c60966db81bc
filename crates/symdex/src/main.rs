use std::ops::ControlFlow;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use regex::Regex;
use symdex_core::dwarf::open_index;
use symdex_core::paths::{basename, compare_filenames_for_search};
use symdex_core::prelude::*;
use symdex_core::types::SectionIndex;
use symdex_utils::{LogLevel, LogSettings, debug, init_logging, warn};

/// Inspect the lazy partial symbol index of a binary.
#[derive(Parser, Debug)]
#[command(name = "symdex")]
#[command(version)]
#[command(about = "Inspect the lazy partial symbol index of a binary", long_about = None)]
struct Cli
{
    /// ELF or Mach-O binary with DWARF debug information
    binary: PathBuf,

    /// Address the text segment was loaded at (hex 0x... or decimal)
    #[arg(long, value_parser = parse_address)]
    load_address: Option<u64>,

    /// Expand every unit while loading instead of on demand
    #[arg(long, default_value_t = false)]
    readnow: bool,

    /// Log level (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Compare symbol names case-insensitively
    #[arg(long, default_value_t = false)]
    case_insensitive: bool,

    /// Check address map hits against the section of the covering linker symbol
    #[arg(long, default_value_t = false)]
    overlay: bool,

    /// Resolve full paths even when a file's basename does not match
    #[arg(long, default_value_t = false)]
    basenames_may_differ: bool,

    /// Report reading and expansion progress
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// List units, optionally only those whose file name matches REGEX
    Units
    {
        /// Regular expression over unit file names
        regex: Option<String>,
    },
    /// Dump partial symbols (all units, the unit covering an address, or the units of a source file)
    Dump
    {
        /// Only the unit covering this address
        #[arg(long, value_parser = parse_address, conflicts_with = "source")]
        pc: Option<u64>,
        /// Only units for this source file
        #[arg(long)]
        source: Option<String>,
    },
    /// Find the unit covering an address and expand it
    Pc
    {
        /// Address (hex 0x... or decimal)
        #[arg(value_parser = parse_address)]
        address: u64,
        /// Restrict the search to this section index
        #[arg(long)]
        section: Option<u16>,
    },
    /// Find the units defining a global name
    Lookup
    {
        /// Symbol name
        name: String,
        /// Domain (undef, var, struct, module, label, common-block)
        #[arg(long, default_value = "var")]
        domain: Domain,
        /// Also match any `::`-qualified suffix
        #[arg(long, default_value_t = false)]
        wild: bool,
    },
    /// Search units by file and symbol name and expand the matches
    Search
    {
        /// Source file name (a trailing path suffix is enough)
        #[arg(long)]
        file: Option<String>,
        /// Regular expression over symbol search names
        #[arg(long)]
        name: Option<String>,
        /// Symbol category (all, variables, functions, types, modules)
        #[arg(long, default_value = "all")]
        kind: SearchKind,
        /// Stop after this many units
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Compare read-in units against their full tables
    Check
    {
        /// Expand every unit first
        #[arg(long, default_value_t = false)]
        expand: bool,
    },
    /// Print index statistics
    Stats,
    /// Expand every unit, then print statistics
    ExpandAll,
}

fn main()
{
    let cli = Cli::parse();

    let settings = LogSettings::from_env().with_level(cli.log_level);
    let _guard = match init_logging(&settings) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> SymdexResult<()>
{
    let config = IndexConfig::from_env()
        .with_case_sensitive(!cli.case_insensitive)
        .with_overlay_debugging(cli.overlay)
        .with_basenames_may_differ(cli.basenames_may_differ)
        .with_verbose(cli.verbose);

    let token = CancellationToken::new();
    let handler_token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!("could not install Ctrl-C handler: {e}");
    }

    debug!(binary = %cli.binary.display(), readnow = cli.readnow, "opening image");
    let partial = open_index(&cli.binary, cli.load_address, config)?.with_cancellation(token);
    let mut index = IndexBackend::select(partial, cli.readnow)?;

    match cli.command {
        Commands::Units { regex } => {
            let regex = regex.as_deref().map(compile_regex).transpose()?;
            print!("{}", index.partial_mut().info_units(regex.as_ref())?);
        }
        Commands::Dump { pc: Some(pc), .. } => match index.find_unit_for_pc(Address::new(pc), None)? {
            Some(unit) => print!("{}", index.partial().dump_unit(unit)?),
            None => println!("No unit covers 0x{pc:x}."),
        },
        Commands::Dump { source: Some(source), .. } => {
            let units = index.partial_mut().units_for_source(&source)?;
            if units.is_empty() {
                println!("No unit for source file {source}.");
            }
            for unit in units {
                println!("{}", index.partial().dump_unit(unit)?);
            }
        }
        Commands::Dump { .. } => print!("{}", index.dump()?),
        Commands::Pc { address, section } => print_pc(&mut index, Address::new(address), section.map(SectionIndex))?,
        Commands::Lookup { name, domain, wild } => print_lookup(&mut index, &name, domain, wild)?,
        Commands::Search {
            file,
            name,
            kind,
            limit,
        } => print_search(&mut index, file.as_deref(), name.as_deref(), kind, limit)?,
        Commands::Check { expand } => {
            if expand {
                index.expand_all()?;
            }
            let findings = index.partial().check_consistency();
            if findings.is_empty() {
                println!("No inconsistencies found.");
            }
            for finding in &findings {
                println!("{finding}");
            }
        }
        Commands::Stats => {
            index.partial_mut().require_partial_symbols()?;
            print!("{}", index.stats()?);
        }
        Commands::ExpandAll => {
            index.expand_all()?;
            print!("{}", index.stats()?);
        }
    }

    Ok(())
}

fn print_pc(index: &mut IndexBackend, pc: Address, section: Option<SectionIndex>) -> SymdexResult<()>
{
    let Some(unit) = index.find_unit_for_pc(pc, section)? else {
        println!("No unit covers {pc}.");
        return Ok(());
    };
    let partial = index.partial();
    println!("{pc} is in {unit} ({})", partial.store().get(unit)?.filename());
    if let Some(id) = partial.find_pc_sect_symbol(unit, pc, section) {
        if let Some(symbol) = partial.store().symbol(id) {
            let offset = partial.image().text_section_offset();
            println!(
                "  function {} at {}",
                partial.store().symbol_name(id),
                symbol.address.relocate(offset)
            );
        }
    }

    if let Some(table) = index.find_compunit_symtab(pc, section)? {
        if let Some(symtab) = index.table(table) {
            println!(
                "  expanded as {table}: {} global, {} static symbols",
                symtab.global_block.symbols.len(),
                symtab.static_block.symbols.len()
            );
        }
    }
    Ok(())
}

fn print_lookup(index: &mut IndexBackend, name: &str, domain: Domain, wild: bool) -> SymdexResult<()>
{
    match index.lookup_global_symbol_language(name, domain)? {
        Some(language) => println!("{name}: {language}"),
        None => println!("{name}: no unexpanded unit defines it globally"),
    }

    let match_type = if wild { MatchType::Wild } else { MatchType::Full };
    let lookup = LookupName::new(name).with_match_type(match_type);
    let request = MatchRequest::new().lookup_name(&lookup).domain(domain);
    let mut found = 0usize;
    index.expand_symtabs_matching(request, &mut |table, symtab| {
        found += 1;
        let symbol = symtab
            .global_block
            .symbols
            .iter()
            .chain(&symtab.static_block.symbols)
            .find(|symbol| lookup.matches(&symbol.name));
        match symbol {
            Some(symbol) => println!(
                "  {} ({table}): {} {}, {} at {}",
                symtab.filename, symbol.name, symbol.domain, symbol.class, symbol.address
            ),
            None => println!("  {} ({table})", symtab.filename),
        }
        ControlFlow::Continue(())
    })?;
    if found == 0 {
        println!("  no unit to expand");
    }
    Ok(())
}

fn print_search(
    index: &mut IndexBackend,
    file: Option<&str>,
    name: Option<&str>,
    kind: SearchKind,
    limit: Option<usize>,
) -> SymdexResult<()>
{
    let name_regex = name.map(compile_regex).transpose()?;
    let mut file_filter = |filename: &str, basenames: bool| match file {
        Some(wanted) if basenames => basename(wanted) == filename,
        Some(wanted) => compare_filenames_for_search(filename, wanted),
        None => true,
    };
    let mut symbol_filter = |search_name: &str| name_regex.as_ref().is_none_or(|regex| regex.is_match(search_name));

    let mut request = MatchRequest::new().block_flags(BlockSearchFlags::ALL).kind(kind);
    if file.is_some() {
        request = request.file_filter(&mut file_filter);
    }
    if name.is_some() || kind != SearchKind::All {
        request = request.symbol_filter(&mut symbol_filter);
    }

    let mut expanded = 0usize;
    let outcome = index.expand_symtabs_matching(request, &mut |table, symtab| {
        expanded += 1;
        println!("{table}: {}", symtab.filename);
        if limit.is_some_and(|limit| expanded >= limit) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;
    match outcome {
        MatchOutcome::Completed => println!("{expanded} unit(s) expanded."),
        MatchOutcome::Stopped => println!("{expanded} unit(s) expanded (limit reached)."),
    }
    Ok(())
}

fn compile_regex(pattern: &str) -> SymdexResult<Regex>
{
    Regex::new(pattern).map_err(|e| SymdexError::InvalidArgument(format!("invalid regex {pattern:?}: {e}")))
}

fn parse_address(text: &str) -> Result<u64, SymdexError>
{
    let trimmed = text.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse::<u64>(),
    };
    parsed.map_err(|e| SymdexError::InvalidArgument(format!("invalid address {text:?}: {e}")))
}

#[cfg(test)]
mod tests
{
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid()
    {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_address()
    {
        assert_eq!(parse_address("0x401000").unwrap(), 0x40_1000);
        assert_eq!(parse_address("0XfF").unwrap(), 0xff);
        assert_eq!(parse_address("4096").unwrap(), 4096);
        assert!(parse_address("0xzz").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_search_arguments()
    {
        let cli = Cli::try_parse_from([
            "symdex", "app", "search", "--file", "main.c", "--kind", "functions", "--limit", "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Search { file, kind, limit, .. } => {
                assert_eq!(file.as_deref(), Some("main.c"));
                assert_eq!(kind, SearchKind::Functions);
                assert_eq!(limit, Some(2));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_dump_pc_conflicts_with_source()
    {
        assert!(Cli::try_parse_from(["symdex", "app", "dump", "--pc", "0x10", "--source", "a.c"]).is_err());
    }
}
