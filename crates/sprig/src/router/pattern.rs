//! Path pattern tokens: `*`, `:name` and `:name{regex}`.

use crate::error::RouterError;
use regex::Regex;

pub(crate) const WILDCARD: &str = "*";

#[derive(Debug, Clone)]
pub(crate) enum Matcher {
    Any,
    Regex(Regex),
}

impl Matcher {
    pub(crate) fn matches(&self, segment: &str) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Regex(regex) => regex.is_match(segment),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Pattern {
    Wildcard,
    Named { token: String, name: String, matcher: Matcher },
}

impl Pattern {
    /// Parses a routing segment. Returns `None` for literal segments.
    pub(crate) fn parse(token: &str) -> Result<Option<Pattern>, RouterError> {
        if token == WILDCARD {
            return Ok(Some(Pattern::Wildcard));
        }
        let Some(rest) = token.strip_prefix(':') else {
            return Ok(None);
        };

        let (name, constraint) = match rest.find('{') {
            Some(open) if rest.ends_with('}') => (&rest[..open], Some(&rest[open + 1..rest.len() - 1])),
            _ => (rest, None),
        };
        if name.is_empty() || name.contains(['{', '}']) || constraint.is_some_and(str::is_empty) {
            return Ok(None);
        }

        let matcher = match constraint {
            Some(constraint) => Regex::new(&format!("^(?:{constraint})$"))
                .map(Matcher::Regex)
                .map_err(|e| RouterError::invalid_pattern(token, e))?,
            None => Matcher::Any,
        };
        Ok(Some(Pattern::Named { token: token.to_string(), name: name.to_string(), matcher }))
    }

    /// The segment text this pattern was registered with, also its child key in the trie.
    pub(crate) fn token(&self) -> &str {
        match self {
            Pattern::Wildcard => WILDCARD,
            Pattern::Named { token, .. } => token,
        }
    }
}

/// Splits a route path into segments. Slashes inside `{...}` belong to the regex, not to the path.
pub(crate) fn split_routing_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in path.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Splits a request path into its non-empty segments.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::{split_path, split_routing_path, Matcher, Pattern};

    #[test]
    fn literal_segments_are_not_patterns() {
        assert!(Pattern::parse("users").unwrap().is_none());
        assert!(Pattern::parse(":").unwrap().is_none());
        assert!(Pattern::parse(":id{}").unwrap().is_none());
    }

    #[test]
    fn named_and_constrained() {
        match Pattern::parse(":id").unwrap() {
            Some(Pattern::Named { name, matcher: Matcher::Any, .. }) => assert_eq!(name, "id"),
            other => panic!("unexpected {other:?}"),
        }

        let Some(Pattern::Named { name, matcher, .. }) = Pattern::parse(r":id{\d+}").unwrap() else {
            panic!("expected a named pattern");
        };
        assert_eq!(name, "id");
        assert!(matcher.matches("42"));
        assert!(!matcher.matches("42a"));
    }

    #[test]
    fn invalid_regex_is_an_error() {
        assert!(Pattern::parse(":id{(}").is_err());
    }

    #[test]
    fn regex_groups_keep_slashes() {
        assert_eq!(split_routing_path("/files/:path{.+/.+}/raw"), vec!["files", ":path{.+/.+}", "raw"]);
        assert_eq!(split_routing_path("//a///b/"), vec!["a", "b"]);
        assert!(split_routing_path("/").is_empty());
    }

    #[test]
    fn request_path_segments() {
        assert_eq!(split_path("/book/"), vec!["book"]);
        assert!(split_path("/").is_empty());
    }
}
