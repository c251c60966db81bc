//! File name helpers shared by the matcher and the diagnostics.

/// Final component of `path`, accepting both `/` and `\` separators
///
/// ## Example
///
/// ```rust
/// use symdex_core::paths::basename;
///
/// assert_eq!(basename("src/lib/util.c"), "util.c");
/// assert_eq!(basename("C:\\work\\main.c"), "main.c");
/// assert_eq!(basename("main.c"), "main.c");
/// ```
#[must_use]
pub fn basename(path: &str) -> &str
{
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Whether `filename` names the file the user asked for with `search`
///
/// `search` matches when it equals `filename` or is a trailing run of whole
/// path components of it, so `util.c` and `lib/util.c` both match
/// `src/lib/util.c` but `til.c` does not.
#[must_use]
pub fn compare_filenames_for_search(filename: &str, search: &str) -> bool
{
    if search.is_empty() || search.len() > filename.len() {
        return false;
    }
    if !filename.ends_with(search) {
        return false;
    }
    let split = filename.len() - search.len();
    split == 0
        || search.starts_with(['/', '\\'])
        || filename[..split].ends_with(['/', '\\'])
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_search_matches_whole_components()
    {
        assert!(compare_filenames_for_search("src/lib/util.c", "util.c"));
        assert!(compare_filenames_for_search("src/lib/util.c", "lib/util.c"));
        assert!(compare_filenames_for_search("src/lib/util.c", "src/lib/util.c"));
        assert!(!compare_filenames_for_search("src/lib/util.c", "til.c"));
        assert!(!compare_filenames_for_search("util.c", "lib/util.c"));
        assert!(!compare_filenames_for_search("util.c", ""));
    }
}
