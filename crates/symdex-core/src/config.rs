//! # Index configuration
//!
//! Knobs that change how queries behave. Defaults match what a C or Rust
//! program on a Unix system expects; each field can be overridden from the
//! environment or set explicitly with the `with_*` builders.
//!
//! ## Environment Variables
//!
//! - `SYMDEX_CASE_SENSITIVE`: compare names case-sensitively (default `true`)
//! - `SYMDEX_OVERLAY_DEBUGGING`: verify address-map hits against sections (default `false`)
//! - `SYMDEX_BASENAMES_MAY_DIFFER`: resolve full paths even when the basename was rejected (default `false`)
//! - `SYMDEX_VERBOSE`: announce every expansion at `info` level (default `false`)
//!
//! Booleans accept `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`.

use std::env;

use tracing::warn;

/// Behavior switches of a [`PartialIndex`](crate::PartialIndex)
///
/// ## Example
///
/// ```rust
/// use symdex_core::IndexConfig;
///
/// let config = IndexConfig::default().with_case_sensitive(false).with_verbose(true);
/// assert!(!config.case_sensitive);
/// assert!(config.verbose);
/// assert!(!config.overlay_debugging);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct IndexConfig
{
    /// Name lookups distinguish case
    pub case_sensitive: bool,
    /// Address-map hits are checked against the requested section
    pub overlay_debugging: bool,
    /// File filters see full paths even when the basename did not match
    pub basenames_may_differ: bool,
    /// Expansions are logged at `info` instead of `debug`
    pub verbose: bool,
}

impl Default for IndexConfig
{
    fn default() -> Self
    {
        Self {
            case_sensitive: true,
            overlay_debugging: false,
            basenames_may_differ: false,
            verbose: false,
        }
    }
}

impl IndexConfig
{
    /// Defaults overridden by the `SYMDEX_*` environment variables
    ///
    /// Unparsable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self
    {
        let defaults = Self::default();
        Self {
            case_sensitive: env_flag("SYMDEX_CASE_SENSITIVE").unwrap_or(defaults.case_sensitive),
            overlay_debugging: env_flag("SYMDEX_OVERLAY_DEBUGGING").unwrap_or(defaults.overlay_debugging),
            basenames_may_differ: env_flag("SYMDEX_BASENAMES_MAY_DIFFER").unwrap_or(defaults.basenames_may_differ),
            verbose: env_flag("SYMDEX_VERBOSE").unwrap_or(defaults.verbose),
        }
    }

    /// Set case sensitivity of name lookups
    #[must_use]
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self
    {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Enable or disable section verification of address-map hits
    #[must_use]
    pub fn with_overlay_debugging(mut self, overlay_debugging: bool) -> Self
    {
        self.overlay_debugging = overlay_debugging;
        self
    }

    /// Let file filters see full paths even after a basename mismatch
    #[must_use]
    pub fn with_basenames_may_differ(mut self, basenames_may_differ: bool) -> Self
    {
        self.basenames_may_differ = basenames_may_differ;
        self
    }

    /// Log expansions at `info`
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self
    {
        self.verbose = verbose;
        self
    }
}

fn env_flag(name: &str) -> Option<bool>
{
    let value = env::var(name).ok()?;
    let parsed = parse_flag(&value);
    if parsed.is_none() {
        warn!("ignoring {name}={value}: expected a boolean");
    }
    parsed
}

fn parse_flag(value: &str) -> Option<bool>
{
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_flag()
    {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" Yes "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("FALSE"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_defaults()
    {
        let config = IndexConfig::default();
        assert!(config.case_sensitive);
        assert!(!config.overlay_debugging);
        assert!(!config.basenames_may_differ);
        assert!(!config.verbose);
    }
}
