//! Shell-style glob to SQL `LIKE` pattern translation.
//!
//! Searches accept file-glob syntax (`*` for any run, `?` for a single
//! character, backslash to escape either), while the store matches with
//! `LIKE ... ESCAPE '\'`. The translation is total: every input string has a
//! pattern, and characters that mean nothing special pass through untouched.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    // Any number of escaped backslashes (group 1) followed by one token (group 2):
    //   "\*" -> "*"    "*" -> "%"
    //   "\?" -> "?"    "?" -> "_"
    //   "%"  -> "\%"   "_" -> "\_"
    static ref GLOB_TOKEN: Regex = Regex::new(r"((?:\\\\)*)(\\\*|\*|\\\?|\?|%|_)").unwrap();
}

/// Translates the glob `glob` into the corresponding SQL pattern.
///
/// ```
/// use olog::glob::translate;
/// assert_eq!(translate("*.log"), "%.log");
/// assert_eq!(translate("a?b"), "a_b");
/// assert_eq!(translate("100%"), "100\\%");
/// ```
pub fn translate(glob: &str) -> String {
    GLOB_TOKEN
        .replace_all(glob, |caps: &Captures| {
            let mut replacement = String::from(&caps[1]);
            replacement.push_str(match &caps[2] {
                r"\*" => "*",
                "*" => "%",
                r"\?" => "?",
                "?" => "_",
                "%" => r"\%",
                "_" => r"\_",
                other => other,
            });
            replacement
        })
        .into_owned()
}

/// True when the value carries a wildcard and must be matched as a pattern
/// rather than as an exact name.
pub fn is_pattern(value: &str) -> bool {
    value.contains('*') || value.contains('?')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards_become_sql_wildcards() {
        assert_eq!(translate("*.log"), "%.log");
        assert_eq!(translate("a?b"), "a_b");
        assert_eq!(translate("*"), "%");
        assert_eq!(translate("??"), "__");
    }

    #[test]
    fn sql_wildcards_are_escaped() {
        assert_eq!(translate("100%"), r"100\%");
        assert_eq!(translate("snake_case"), r"snake\_case");
        assert_eq!(translate("%_%"), r"\%\_\%");
    }

    #[test]
    fn escaped_wildcards_become_literals() {
        assert_eq!(translate(r"what\?"), "what?");
        assert_eq!(translate(r"\*star\*"), "*star*");
    }

    #[test]
    fn escaped_backslashes_are_preserved() {
        // an escaped backslash does not escape the following star
        assert_eq!(translate(r"a\\*"), r"a\\%");
        // three backslashes: one escaped pair plus an escaped star
        assert_eq!(translate(r"a\\\*"), r"a\\*");
        assert_eq!(translate(r"dir\\name"), r"dir\\name");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(translate(""), "");
        assert_eq!(translate("Beam dump at 12:00"), "Beam dump at 12:00");
        assert_eq!(translate("ünïcödé"), "ünïcödé");
    }

    #[test]
    fn pattern_detection() {
        assert!(is_pattern("ops*"));
        assert!(is_pattern("op?"));
        assert!(!is_pattern("ops"));
        assert!(!is_pattern("100%"));
    }
}
