//! Names as the caller asked for them.

use std::fmt;

use super::ordering::{matches_iw, matches_wild};

/// How a lookup name is compared against symbol search names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchType
{
    /// The whole search name must match.
    #[default]
    Full,
    /// Any `::`-qualified suffix of the search name may match.
    Wild,
}

/// A name being looked up, with its matching rules
///
/// ## Example
///
/// ```rust
/// use symdex_core::names::{LookupName, MatchType};
///
/// let name = LookupName::new("run").with_match_type(MatchType::Wild);
/// assert!(name.matches("app::worker::run"));
/// assert!(!name.supports_ordered_search());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupName
{
    name: String,
    match_type: MatchType,
    ignore_params: bool,
    case_sensitive: bool,
}

impl LookupName
{
    /// A full, case-sensitive lookup of `name`
    pub fn new(name: impl Into<String>) -> Self
    {
        Self {
            name: name.into(),
            match_type: MatchType::Full,
            ignore_params: false,
            case_sensitive: true,
        }
    }

    /// Set how the name is matched
    #[must_use]
    pub fn with_match_type(mut self, match_type: MatchType) -> Self
    {
        self.match_type = match_type;
        self
    }

    /// Let `foo` match `foo(int)`
    #[must_use]
    pub fn ignoring_params(mut self, ignore: bool) -> Self
    {
        self.ignore_params = ignore;
        self
    }

    /// Compare case-sensitively (the default) or not
    #[must_use]
    pub fn with_case_sensitivity(mut self, case_sensitive: bool) -> Self
    {
        self.case_sensitive = case_sensitive;
        self
    }

    /// The name as given
    #[must_use]
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// How the name is matched
    #[must_use]
    pub fn match_type(&self) -> MatchType
    {
        self.match_type
    }

    /// Whether names are compared case-sensitively
    #[must_use]
    pub fn is_case_sensitive(&self) -> bool
    {
        self.case_sensitive
    }

    /// Whether a binary search over a sorted global list can find every match
    ///
    /// Wild matches can sit anywhere in the sorted order, so they force a
    /// linear scan.
    #[must_use]
    pub fn supports_ordered_search(&self) -> bool
    {
        self.match_type == MatchType::Full
    }

    /// Whether `search_name` is a match for this lookup
    #[must_use]
    pub fn matches(&self, search_name: &str) -> bool
    {
        match self.match_type {
            MatchType::Full => matches_iw(search_name, &self.name, self.case_sensitive, self.ignore_params),
            MatchType::Wild => matches_wild(search_name, &self.name, self.case_sensitive, self.ignore_params),
        }
    }
}

impl fmt::Display for LookupName
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.name)
    }
}
