//! Symbol demangling utilities.
//!
//! Linkage names are demangled once, when the name table interns them, and
//! the demangled form becomes the *search name* that ordering and matching
//! run on.
//!
//! ## Language Detection
//!
//! When the reader does not know a symbol's language, it is guessed from the
//! mangling pattern:
//!
//! - Rust symbols: Start with `_R` or `_ZN` and demangle as Rust, or contain `::`
//! - C++ symbols: Start with `_Z` (Itanium mangling)
//! - Everything else stays `Unknown`

use rustc_demangle::try_demangle;

use crate::types::{SymbolLanguage, SymbolName};

/// Create a `SymbolName` from a raw linkage name.
///
/// `hint` is the language the reader attributed to the symbol. Rust names are
/// demangled with `rustc_demangle` in its alternate form, which drops the
/// trailing hash so that `krate::module::func` is what lookups compare
/// against.
pub(crate) fn make_symbol_name(raw: &str, hint: SymbolLanguage) -> SymbolName
{
    let language = match hint {
        SymbolLanguage::Unknown => detect_language(raw),
        known => known,
    };
    let demangled = match language {
        SymbolLanguage::Rust | SymbolLanguage::Unknown => {
            try_demangle(raw).ok().map(|d| format!("{d:#}")).filter(|d| d != raw)
        }
        _ => None,
    };

    SymbolName::new(raw.to_string(), demangled, language)
}

/// Guess the language of a linkage name from its mangling.
fn detect_language(raw: &str) -> SymbolLanguage
{
    if raw.starts_with("_R") || (raw.starts_with("_ZN") && try_demangle(raw).is_ok()) || raw.contains("::") {
        SymbolLanguage::Rust
    } else if raw.starts_with("_Z") {
        SymbolLanguage::Cpp
    } else {
        SymbolLanguage::Unknown
    }
}
