//! # DWARF reader
//!
//! Loads an ELF or Mach-O image with `object`, hands its DWARF sections to
//! `gimli`, and implements the reader traits on top of them:
//! - [`ObjectImage`] answers [`ImageServices`] queries from the object file
//!   (architecture, text offset, linker symbols)
//! - [`DwarfReader`] scans compilation units into the store and builds full
//!   tables on demand
//!
//! The rest of the crate never touches `gimli` or `object`.

mod scan;

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use gimli::{constants, DwLang, Dwarf, EndianArcSlice, RunTimeEndian, SectionId};
use object::{Object, ObjectSection, ObjectSegment, ObjectSymbol, SymbolKind};
use tracing::debug;

pub use scan::DwarfReader;

use crate::config::IndexConfig;
use crate::error::{SymdexError, SymdexResult};
use crate::partial::PartialIndex;
use crate::reader::{FsSourceLocator, ImageServices, MinimalSymbol};
use crate::types::{Address, Architecture, SectionIndex, SymbolLanguage};

type OwnedReader = EndianArcSlice<RunTimeEndian>;
type OwnedDwarf = Dwarf<OwnedReader>;

const DWARF_SECTIONS: &[(&str, &[&str])] = &[
    (".debug_abbrev", &[".debug_abbrev", "__debug_abbrev"]),
    (".debug_addr", &[".debug_addr", "__debug_addr"]),
    (".debug_info", &[".debug_info", "__debug_info"]),
    (".debug_line", &[".debug_line", "__debug_line"]),
    (".debug_line_str", &[".debug_line_str", "__debug_line_str"]),
    (".debug_ranges", &[".debug_ranges", "__debug_ranges"]),
    (".debug_rnglists", &[".debug_rnglists", "__debug_rnglists"]),
    (".debug_str", &[".debug_str", "__debug_str"]),
    (".debug_str_offsets", &[".debug_str_offsets", "__debug_str_offsets"]),
    (".debug_types", &[".debug_types", "__debug_types"]),
    (".debug_loc", &[".debug_loc", "__debug_loc"]),
    (".debug_loclists", &[".debug_loclists", "__debug_loclists"]),
];

/// Open `path` and build a lazy index over its debug information
///
/// `load_address` is where the image's text segment was loaded; without it
/// the index works with link-time addresses.
///
/// ## Errors
///
/// `Io` if the file cannot be read, `Image` if it is not an object file the
/// `object` crate understands. DWARF problems only show up once the index
/// scans the image.
///
/// ## Example
///
/// ```rust,no_run
/// use std::path::Path;
///
/// use symdex_core::dwarf::open_index;
/// use symdex_core::IndexConfig;
///
/// let mut index = open_index(Path::new("target/debug/app"), None, IndexConfig::default())?;
/// println!("has symbols: {}", index.has_symbols()?);
/// # Ok::<(), symdex_core::SymdexError>(())
/// ```
pub fn open_index(path: &Path, load_address: Option<u64>, config: IndexConfig) -> SymdexResult<PartialIndex>
{
    let (image, reader) = load_image(path, load_address)?;
    Ok(PartialIndex::new(
        Box::new(image),
        Box::new(reader),
        Box::new(FsSourceLocator::new()),
        config,
    ))
}

/// Parse the image at `path` into its image services and its DWARF reader
///
/// ## Errors
///
/// `Io` or `Image`, as for [`open_index`].
pub fn load_image(path: &Path, load_address: Option<u64>) -> SymdexResult<(ObjectImage, DwarfReader)>
{
    let bytes = fs::read(path)?;
    let data = Arc::<[u8]>::from(bytes);
    let file = object::File::parse(&*data)
        .map_err(|err| SymdexError::Image(format!("failed to parse {}: {err}", path.display())))?;

    let endian = if file.is_little_endian() {
        RunTimeEndian::Little
    } else {
        RunTimeEndian::Big
    };

    let architecture = match file.architecture() {
        object::Architecture::Aarch64 => Architecture::Arm64,
        object::Architecture::Arm => Architecture::Arm,
        object::Architecture::X86_64 => Architecture::X86_64,
        object::Architecture::I386 => Architecture::X86,
        _ => Architecture::Unknown("unknown"),
    };

    let text_vmaddr = file
        .segments()
        .find(|segment| matches!(segment.name(), Ok(Some("__TEXT"))))
        .map(|segment| segment.address())
        .or_else(|| file.segments().map(|segment| segment.address()).min())
        .unwrap_or(0);
    let text_offset = load_address.map_or(0, |load| load.wrapping_sub(text_vmaddr));

    let text_section = file
        .section_by_name(".text")
        .or_else(|| file.section_by_name("__text"))
        .and_then(|section| section_index(section.index()));

    let mut symbols: Vec<MinimalSymbol> = file
        .symbols()
        .filter(|symbol| symbol.kind() == SymbolKind::Text && symbol.is_definition())
        .filter_map(|symbol| {
            let name = symbol.name().ok().filter(|name| !name.is_empty())?;
            Some(MinimalSymbol {
                name: name.to_string(),
                address: Address::new(symbol.address()),
                size: symbol.size(),
                section: symbol.section_index().and_then(section_index),
            })
        })
        .collect();
    symbols.sort_by_key(|symbol| symbol.address);

    let mut sections = HashMap::new();
    for (canonical, aliases) in DWARF_SECTIONS {
        sections.insert(*canonical, load_section_bytes(&file, aliases)?);
    }
    let dwarf = Dwarf::load(|section| Ok::<_, gimli::Error>(section_reader(&sections, endian, section)))
        .map_err(|err| map_dwarf_error("loading DWARF sections", err))?;

    debug!(
        path = %path.display(),
        %architecture,
        text_offset = format_args!("0x{text_offset:x}"),
        linker_symbols = symbols.len(),
        "loaded image"
    );

    let image = ObjectImage {
        name: path.display().to_string(),
        architecture,
        text_offset,
        symbols,
    };
    Ok((image, DwarfReader::new(dwarf, text_section)))
}

fn section_index(index: object::SectionIndex) -> Option<SectionIndex>
{
    u16::try_from(index.0).ok().map(SectionIndex)
}

fn load_section_bytes(file: &object::File<'_>, names: &[&str]) -> SymdexResult<Arc<[u8]>>
{
    for name in names {
        if let Some(section) = file.section_by_name(name) {
            let data = section
                .uncompressed_data()
                .map_err(|err| SymdexError::Image(format!("failed to read {name}: {err}")))?;
            return Ok(match data {
                Cow::Borrowed(bytes) => Arc::<[u8]>::from(bytes.to_vec()),
                Cow::Owned(vec) => vec.into(),
            });
        }
    }

    Ok(Arc::<[u8]>::from(Vec::new()))
}

fn section_reader(sections: &HashMap<&'static str, Arc<[u8]>>, endian: RunTimeEndian, id: SectionId) -> OwnedReader
{
    let data = sections
        .get(id.name())
        .cloned()
        .unwrap_or_else(|| Arc::<[u8]>::from(Vec::new()));
    EndianArcSlice::new(data, endian)
}

pub(crate) fn map_dwarf_error(context: &str, source: gimli::Error) -> SymdexError
{
    SymdexError::Dwarf {
        context: context.to_string(),
        source,
    }
}

pub(crate) fn language_from_dwarf(language: DwLang) -> SymbolLanguage
{
    match language {
        constants::DW_LANG_C89 | constants::DW_LANG_C | constants::DW_LANG_C99 | constants::DW_LANG_C11 => {
            SymbolLanguage::C
        }
        constants::DW_LANG_C_plus_plus
        | constants::DW_LANG_C_plus_plus_03
        | constants::DW_LANG_C_plus_plus_11
        | constants::DW_LANG_C_plus_plus_14 => SymbolLanguage::Cpp,
        constants::DW_LANG_Rust => SymbolLanguage::Rust,
        constants::DW_LANG_D => SymbolLanguage::D,
        constants::DW_LANG_Fortran77
        | constants::DW_LANG_Fortran90
        | constants::DW_LANG_Fortran95
        | constants::DW_LANG_Fortran03
        | constants::DW_LANG_Fortran08 => SymbolLanguage::Fortran,
        constants::DW_LANG_Ada83 | constants::DW_LANG_Ada95 => SymbolLanguage::Ada,
        constants::DW_LANG_Mips_Assembler => SymbolLanguage::Asm,
        _ => SymbolLanguage::Unknown,
    }
}

/// Image services backed by a parsed object file
#[derive(Debug, Clone)]
pub struct ObjectImage
{
    name: String,
    architecture: Architecture,
    text_offset: u64,
    /// Text symbols at link-time addresses, sorted by address
    symbols: Vec<MinimalSymbol>,
}

impl ObjectImage
{
    /// Number of linker text symbols
    #[must_use]
    pub fn linker_symbol_count(&self) -> usize
    {
        self.symbols.len()
    }
}

impl ImageServices for ObjectImage
{
    fn name(&self) -> &str
    {
        &self.name
    }

    fn architecture(&self) -> Architecture
    {
        self.architecture
    }

    fn text_section_offset(&self) -> u64
    {
        self.text_offset
    }

    fn lookup_minimal_symbol_by_pc(&self, pc: Address) -> Option<MinimalSymbol>
    {
        let address = pc.unrelocate(self.text_offset);
        let index = self.symbols.partition_point(|symbol| symbol.address <= address);
        let symbol = self.symbols.get(index.checked_sub(1)?)?;
        if symbol.size != 0 && address.value() >= symbol.address.value().saturating_add(symbol.size) {
            return None;
        }
        Some(MinimalSymbol {
            address: symbol.address.relocate(self.text_offset),
            ..symbol.clone()
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn image(symbols: Vec<MinimalSymbol>) -> ObjectImage
    {
        ObjectImage {
            name: "test".to_string(),
            architecture: Architecture::X86_64,
            text_offset: 0x1000,
            symbols,
        }
    }

    fn text(name: &str, address: u64, size: u64) -> MinimalSymbol
    {
        MinimalSymbol {
            name: name.to_string(),
            address: Address::new(address),
            size,
            section: Some(SectionIndex(1)),
        }
    }

    #[test]
    fn test_minimal_symbol_lookup_relocates()
    {
        let image = image(vec![text("a", 0x100, 0x10), text("b", 0x200, 0)]);
        let found = image.lookup_minimal_symbol_by_pc(Address::new(0x1108)).unwrap();
        assert_eq!(found.name, "a");
        assert_eq!(found.address, Address::new(0x1100));
    }

    #[test]
    fn test_minimal_symbol_lookup_respects_size()
    {
        let image = image(vec![text("a", 0x100, 0x10), text("b", 0x200, 0)]);
        assert!(image.lookup_minimal_symbol_by_pc(Address::new(0x1150)).is_none());
        assert!(image.lookup_minimal_symbol_by_pc(Address::new(0x1050)).is_none());
        // Unknown size extends to the next symbol.
        assert_eq!(image.lookup_minimal_symbol_by_pc(Address::new(0x1300)).unwrap().name, "b");
    }

    #[test]
    fn test_language_mapping()
    {
        assert_eq!(language_from_dwarf(constants::DW_LANG_C99), SymbolLanguage::C);
        assert_eq!(language_from_dwarf(constants::DW_LANG_Rust), SymbolLanguage::Rust);
        assert_eq!(language_from_dwarf(constants::DW_LANG_C_plus_plus_11), SymbolLanguage::Cpp);
        assert_eq!(language_from_dwarf(constants::DW_LANG_Cobol74), SymbolLanguage::Unknown);
    }
}
