//! Tests for the value types shared across the index

use std::str::FromStr;

use symdex_core::types::{
    Address, AddressClass, Architecture, BlockSearchFlags, Domain, SearchKind, SectionIndex, SymbolLanguage,
};

#[test]
fn test_address_relocation_wraps()
{
    let linked = Address::new(0x1000);
    assert_eq!(linked.relocate(0x10000), Address::new(0x11000));
    assert_eq!(Address::new(0x11000).unrelocate(0x10000), linked);

    // An image loaded below its link address has a "negative" offset.
    let offset = 0u64.wrapping_sub(0x800);
    assert_eq!(linked.relocate(offset), Address::new(0x800));
    assert_eq!(Address::new(0x800).unrelocate(offset), linked);
}

#[test]
fn test_address_display_and_ordering()
{
    assert_eq!(Address::new(0x401000).to_string(), "0x0000000000401000");
    assert!(Address::ZERO < Address::new(1));
    assert_eq!(u64::from(Address::from(42)), 42);
}

#[test]
fn test_domain_from_str()
{
    assert_eq!(Domain::from_str("var").unwrap(), Domain::Var);
    assert_eq!(Domain::from_str("STRUCT").unwrap(), Domain::Struct);
    assert_eq!(Domain::from_str("any").unwrap(), Domain::Undef);
    assert_eq!(Domain::from_str("common-block").unwrap(), Domain::CommonBlock);
    assert!(Domain::from_str("register").is_err());
    assert_eq!(Domain::Var.to_string(), "var domain");
}

#[test]
fn test_struct_domain_merges_for_some_languages()
{
    for language in [SymbolLanguage::Cpp, SymbolLanguage::D, SymbolLanguage::Rust, SymbolLanguage::Ada] {
        assert!(Domain::Struct.matches(language, Domain::Var));
        assert!(Domain::Struct.matches(language, Domain::Struct));
    }
    assert!(!Domain::Struct.matches(SymbolLanguage::C, Domain::Var));
    assert!(!Domain::Var.matches(SymbolLanguage::Cpp, Domain::Struct));
    assert!(!SymbolLanguage::Ada.qualifies_names());
    assert!(SymbolLanguage::Cpp.qualifies_names());
    assert!(Domain::Label.matches(SymbolLanguage::C, Domain::Label));
}

#[test]
fn test_search_kind_accepts()
{
    assert!(SearchKind::All.accepts(Domain::Var, AddressClass::Typedef));
    assert!(SearchKind::Functions.accepts(Domain::Var, AddressClass::Block));
    assert!(!SearchKind::Functions.accepts(Domain::Var, AddressClass::Static));
    assert!(SearchKind::Variables.accepts(Domain::Var, AddressClass::Static));
    assert!(!SearchKind::Variables.accepts(Domain::Var, AddressClass::Block));
    assert!(SearchKind::Types.accepts(Domain::Struct, AddressClass::Typedef));
    assert!(SearchKind::Modules.accepts(Domain::Module, AddressClass::Undef));
    assert!(!SearchKind::Modules.accepts(Domain::Var, AddressClass::Undef));

    assert_eq!(SearchKind::from_str("fns").unwrap(), SearchKind::Functions);
    assert!(SearchKind::from_str("everything").is_err());
}

#[test]
fn test_block_search_flags_default_to_both_lists()
{
    let flags = BlockSearchFlags::default();
    assert_eq!(flags, BlockSearchFlags::ALL);
    assert!(flags.global && flags.statics);
    assert!(!BlockSearchFlags::GLOBAL.statics);
    assert!(!BlockSearchFlags::STATIC.global);
}

#[test]
fn test_small_displays()
{
    assert_eq!(SectionIndex(3).to_string(), "section 3");
    assert_eq!(SymbolLanguage::Cpp.to_string(), "c++");
    assert_eq!(AddressClass::Block.to_string(), "function");
    assert_eq!(Architecture::X86_64.to_string(), "x86_64");
    assert_eq!(Architecture::Arm.pointer_size_bytes(), 4);
}
