//! Symbol classification types.
//!
//! A partial symbol carries just enough to answer "is this the thing being
//! looked up": a name, a [`Domain`] (which namespace the name lives in), an
//! [`AddressClass`] (what kind of storage or entity it denotes), and the
//! [`SymbolLanguage`] that decides how names compare.

use std::fmt;
use std::str::FromStr;

use crate::error::SymdexError;

/// Programming language associated with a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum SymbolLanguage
{
    /// Unknown or mixed language.
    #[default]
    Unknown,
    /// C symbol or unmangled global.
    C,
    /// C++ symbol (Itanium mangling without Rust extensions).
    Cpp,
    /// Rust symbol (detected via mangling or namespace patterns).
    Rust,
    /// D symbol.
    D,
    /// Ada symbol.
    Ada,
    /// Fortran symbol.
    Fortran,
    /// Hand-written assembly.
    Asm,
}

impl SymbolLanguage
{
    /// Whether a lookup in the variable domain also finds tags in the struct domain
    ///
    /// In C++-like languages and Ada `struct S` is usable as plain `S`, so
    /// the two namespaces are merged for matching.
    #[must_use]
    pub const fn merges_struct_domain(self) -> bool
    {
        matches!(self, Self::Cpp | Self::D | Self::Rust | Self::Ada)
    }

    /// Whether nested declarations are named with their enclosing scopes joined by `::`
    #[must_use]
    pub const fn qualifies_names(self) -> bool
    {
        matches!(self, Self::Cpp | Self::D | Self::Rust)
    }
}

impl fmt::Display for SymbolLanguage
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            SymbolLanguage::Unknown => "unknown",
            SymbolLanguage::C => "c",
            SymbolLanguage::Cpp => "c++",
            SymbolLanguage::Rust => "rust",
            SymbolLanguage::D => "d",
            SymbolLanguage::Ada => "ada",
            SymbolLanguage::Fortran => "fortran",
            SymbolLanguage::Asm => "asm",
        };
        write!(f, "{label}")
    }
}

/// A linkage name with demangling metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolName
{
    raw: String,
    demangled: Option<String>,
    language: SymbolLanguage,
}

impl SymbolName
{
    /// Construct from a raw linkage name.
    #[must_use]
    pub fn new(raw: String, demangled: Option<String>, language: SymbolLanguage) -> Self
    {
        Self {
            raw,
            demangled,
            language,
        }
    }

    /// Raw (mangled) name emitted in the object file.
    #[must_use]
    pub fn raw(&self) -> &str
    {
        &self.raw
    }

    /// Demangled human-friendly name if available.
    #[must_use]
    pub fn demangled(&self) -> Option<&str>
    {
        self.demangled.as_deref()
    }

    /// Name used for ordering and matching (demangled fallback to raw).
    #[must_use]
    pub fn search_name(&self) -> &str
    {
        self.demangled.as_deref().unwrap_or(&self.raw)
    }

    /// Language classification for the symbol.
    #[must_use]
    pub fn language(&self) -> SymbolLanguage
    {
        self.language
    }
}

impl fmt::Display for SymbolName
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.search_name())
    }
}

/// Namespace a symbol name lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Domain
{
    /// Unspecified; as a lookup domain it matches every symbol.
    #[default]
    Undef,
    /// Variables, functions, typedefs, and enumerators.
    Var,
    /// Struct, union, and enum tags.
    Struct,
    /// Modules (Fortran, Rust) and namespaces used as scopes.
    Module,
    /// Goto labels.
    Label,
    /// Fortran common blocks.
    CommonBlock,
}

impl Domain
{
    /// Whether a symbol in domain `self` written in `language` satisfies a lookup in `requested`
    ///
    /// ## Example
    ///
    /// ```rust
    /// use symdex_core::types::{Domain, SymbolLanguage};
    ///
    /// assert!(Domain::Struct.matches(SymbolLanguage::Cpp, Domain::Var));
    /// assert!(!Domain::Struct.matches(SymbolLanguage::C, Domain::Var));
    /// ```
    #[must_use]
    pub fn matches(self, language: SymbolLanguage, requested: Domain) -> bool
    {
        if language.merges_struct_domain()
            && matches!(requested, Domain::Var | Domain::Struct)
            && self == Domain::Struct
        {
            return true;
        }
        self == requested
    }
}

impl fmt::Display for Domain
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            Domain::Undef => "undefined domain",
            Domain::Var => "var domain",
            Domain::Struct => "struct domain",
            Domain::Module => "module domain",
            Domain::Label => "label domain",
            Domain::CommonBlock => "common block domain",
        };
        write!(f, "{label}")
    }
}

impl FromStr for Domain
{
    type Err = SymdexError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "undef" | "any" => Ok(Domain::Undef),
            "var" | "variable" => Ok(Domain::Var),
            "struct" | "tag" => Ok(Domain::Struct),
            "module" => Ok(Domain::Module),
            "label" => Ok(Domain::Label),
            "common-block" | "common_block" => Ok(Domain::CommonBlock),
            other => Err(SymdexError::InvalidArgument(format!("unknown domain `{other}`"))),
        }
    }
}

/// How a symbol's value is located, or what kind of entity it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum AddressClass
{
    /// Not yet classified.
    #[default]
    Undef,
    /// Integer constant.
    Const,
    /// Static storage at a fixed address.
    Static,
    /// Lives in a register.
    Register,
    /// Argument passed by value.
    Arg,
    /// Argument passed by reference.
    RefArg,
    /// Register holding the address of an argument.
    RegparmAddr,
    /// Stack-allocated local.
    Local,
    /// A type name.
    Typedef,
    /// A code label.
    Label,
    /// A function; the address is its entry point.
    Block,
    /// Constant stored as raw bytes.
    ConstBytes,
    /// Resolved later through the minimal symbols.
    Unresolved,
    /// Optimized out by the compiler.
    OptimizedOut,
    /// Computed at runtime by a location expression.
    Computed,
}

impl AddressClass
{
    /// Human-readable label used by the dumps
    #[must_use]
    pub const fn describe(self) -> &'static str
    {
        match self {
            AddressClass::Undef => "undefined",
            AddressClass::Const => "constant int",
            AddressClass::Static => "static",
            AddressClass::Register => "register",
            AddressClass::Arg => "pass by value",
            AddressClass::RefArg => "pass by reference",
            AddressClass::RegparmAddr => "register address parameter",
            AddressClass::Local => "stack parameter",
            AddressClass::Typedef => "type",
            AddressClass::Label => "label",
            AddressClass::Block => "function",
            AddressClass::ConstBytes => "constant bytes",
            AddressClass::Unresolved => "unresolved",
            AddressClass::OptimizedOut => "optimized out",
            AddressClass::Computed => "computed at runtime",
        }
    }
}

impl fmt::Display for AddressClass
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.describe())
    }
}

/// Category filter for symbol searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchKind
{
    /// Every symbol.
    #[default]
    All,
    /// Data symbols: anything that is neither a function nor a type.
    Variables,
    /// Functions (block class).
    Functions,
    /// Type names (typedef class).
    Types,
    /// Symbols in the module domain.
    Modules,
}

impl SearchKind
{
    /// Whether a symbol with this domain and class belongs to the category
    #[must_use]
    pub fn accepts(self, domain: Domain, class: AddressClass) -> bool
    {
        match self {
            SearchKind::All => true,
            SearchKind::Modules => domain == Domain::Module,
            SearchKind::Variables => class != AddressClass::Typedef && class != AddressClass::Block,
            SearchKind::Functions => class == AddressClass::Block,
            SearchKind::Types => class == AddressClass::Typedef,
        }
    }
}

impl FromStr for SearchKind
{
    type Err = SymdexError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "all" => Ok(SearchKind::All),
            "variables" | "vars" => Ok(SearchKind::Variables),
            "functions" | "fns" => Ok(SearchKind::Functions),
            "types" => Ok(SearchKind::Types),
            "modules" => Ok(SearchKind::Modules),
            other => Err(SymdexError::InvalidArgument(format!("unknown search kind `{other}`"))),
        }
    }
}

/// Which of a unit's symbol lists a search looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSearchFlags
{
    /// Search the global (externally visible) list.
    pub global: bool,
    /// Search the static (file-local) list.
    pub statics: bool,
}

impl BlockSearchFlags
{
    /// Only the global list.
    pub const GLOBAL: Self = Self {
        global: true,
        statics: false,
    };
    /// Only the static list.
    pub const STATIC: Self = Self {
        global: false,
        statics: true,
    };
    /// Both lists.
    pub const ALL: Self = Self {
        global: true,
        statics: true,
    };
}

impl Default for BlockSearchFlags
{
    fn default() -> Self
    {
        Self::ALL
    }
}

/// Which list of a unit a new symbol goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement
{
    /// Externally visible; deduplicated and sorted at finalization.
    Global,
    /// File-local; kept in insertion order.
    Static,
}

/// Index of the object-file section a symbol lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionIndex(pub u16);

impl fmt::Display for SectionIndex
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "section {}", self.0)
    }
}
