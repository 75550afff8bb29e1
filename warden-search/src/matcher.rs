//! Filename and content matchers

use glob::{MatchOptions, Pattern};
use regex::{Regex, RegexBuilder};
use warden_core::{FsError, FsResult};

/// Filename test: glob when the pattern carries metacharacters, plain
/// substring otherwise (bare words like `report` should match
/// `report-2024.txt`).
#[derive(Debug, Clone)]
pub enum NamePattern {
    Glob {
        pattern: Pattern,
        case_sensitive: bool,
    },
    Substring {
        needle: String,
        case_sensitive: bool,
    },
}

impl NamePattern {
    pub fn new(pattern: &str, case_sensitive: bool) -> FsResult<Self> {
        if pattern.contains(['*', '?', '[']) {
            let compiled = Pattern::new(pattern)
                .map_err(|e| FsError::InvalidPattern(format!("{pattern}: {e}")))?;
            Ok(NamePattern::Glob {
                pattern: compiled,
                case_sensitive,
            })
        } else {
            let needle = if case_sensitive {
                pattern.to_string()
            } else {
                pattern.to_lowercase()
            };
            Ok(NamePattern::Substring {
                needle,
                case_sensitive,
            })
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Glob {
                pattern,
                case_sensitive,
            } => pattern.matches_with(
                name,
                MatchOptions {
                    case_sensitive: *case_sensitive,
                    require_literal_separator: false,
                    require_literal_leading_dot: false,
                },
            ),
            NamePattern::Substring {
                needle,
                case_sensitive,
            } => {
                if *case_sensitive {
                    name.contains(needle.as_str())
                } else {
                    name.to_lowercase().contains(needle.as_str())
                }
            }
        }
    }
}

/// Content test over decoded text, short-circuiting at the first matching
/// line.
#[derive(Debug, Clone)]
pub struct ContentMatcher {
    regex: Regex,
}

impl ContentMatcher {
    /// `literal` patterns are escaped; otherwise the pattern is compiled as
    /// a regex verbatim.
    pub fn new(pattern: &str, case_sensitive: bool, is_regex: bool) -> FsResult<Self> {
        let source = if is_regex {
            pattern.to_string()
        } else {
            regex::escape(pattern)
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| FsError::InvalidPattern(format!("{pattern}: {e}")))?;
        Ok(Self { regex })
    }

    /// First matching line (1-based) and its text, if any.
    pub fn first_match(&self, text: &str) -> Option<(usize, String)> {
        for (idx, line) in text.lines().enumerate() {
            if self.regex.is_match(line) {
                return Some((idx + 1, line.to_string()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_case_insensitive_by_default_arg() {
        let p = NamePattern::new("todo", false).unwrap();
        assert!(p.matches("TODO.txt"));
        assert!(p.matches("my_todo_list.md"));
        assert!(!p.matches("done.txt"));
    }

    #[test]
    fn test_substring_case_sensitive() {
        let p = NamePattern::new("TODO", true).unwrap();
        assert!(p.matches("TODO.txt"));
        assert!(!p.matches("todo.txt"));
    }

    #[test]
    fn test_glob_patterns() {
        let p = NamePattern::new("*.rs", true).unwrap();
        assert!(p.matches("main.rs"));
        assert!(!p.matches("main.rs.bak"));

        let p = NamePattern::new("data-?.csv", true).unwrap();
        assert!(p.matches("data-1.csv"));
        assert!(!p.matches("data-10.csv"));
    }

    #[test]
    fn test_glob_case_insensitive() {
        let p = NamePattern::new("*.TXT", false).unwrap();
        assert!(p.matches("notes.txt"));
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let err = NamePattern::new("[unclosed", true).unwrap_err();
        assert!(matches!(err, FsError::InvalidPattern(_)));
    }

    #[test]
    fn test_content_literal_first_match() {
        let m = ContentMatcher::new("TODO", false, false).unwrap();
        let text = "fn main() {\n    // todo: fix\n    // TODO again\n}";
        let (line, body) = m.first_match(text).unwrap();
        assert_eq!(line, 2);
        assert!(body.contains("todo"));
    }

    #[test]
    fn test_content_literal_escapes_metachars() {
        let m = ContentMatcher::new("a.b(c)", true, false).unwrap();
        assert!(m.first_match("call a.b(c) here").is_some());
        assert!(m.first_match("call aXb(c) here").is_none());
    }

    #[test]
    fn test_content_regex_mode() {
        let m = ContentMatcher::new(r"fn \w+\(", true, true).unwrap();
        assert!(m.first_match("fn resolve(path: &str)").is_some());

        let err = ContentMatcher::new(r"(unclosed", true, true).unwrap_err();
        assert!(matches!(err, FsError::InvalidPattern(_)));
    }
}
