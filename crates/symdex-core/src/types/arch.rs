//! Target architecture of an indexed image.

use std::fmt;

/// CPU architecture an image was built for
///
/// The index itself is architecture-neutral; this is only carried so the
/// reader can report it and the diagnostics can print it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture
{
    /// 64-bit ARM (AArch64)
    Arm64,
    /// 32-bit ARM
    Arm,
    /// 64-bit x86 (Intel/AMD)
    X86_64,
    /// 32-bit x86
    X86,
    /// Any other architecture (or unknown)
    ///
    /// The `&'static str` contains the architecture name (e.g., "riscv64", "powerpc64").
    Unknown(&'static str),
}

impl Architecture
{
    /// Size of a pointer in bytes for this architecture.
    #[must_use]
    pub const fn pointer_size_bytes(self) -> u8
    {
        match self {
            Architecture::Arm | Architecture::X86 => 4,
            Architecture::Arm64 | Architecture::X86_64 | Architecture::Unknown(_) => 8,
        }
    }
}

impl fmt::Display for Architecture
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Architecture::Arm64 => write!(f, "arm64"),
            Architecture::Arm => write!(f, "arm"),
            Architecture::X86_64 => write!(f, "x86_64"),
            Architecture::X86 => write!(f, "x86"),
            Architecture::Unknown(name) => write!(f, "{name}"),
        }
    }
}
