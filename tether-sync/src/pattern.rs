//! `--match` patterns: a small glob/segment matcher.
//!
//! Segments are separated by `#`. With a leading `#` the segments are
//! matched positionally against a type's match fields, so `#GET#/api/*`
//! checks method then path. Missing or empty segments match anything.
//! Without a leading `#` the whole pattern is one glob matched against the
//! last match field only (`/api/*`, `util.*`).

use glob::{MatchOptions, Pattern};

use crate::error::SyncError;

/// Compiled match pattern.
#[derive(Debug, Clone)]
pub struct MatchPattern {
    raw: String,
    segments: Vec<Option<Pattern>>,
    positional: bool,
}

impl MatchPattern {
    pub fn parse(raw: &str) -> Result<Self, SyncError> {
        let (positional, body) = match raw.strip_prefix('#') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let parts: Vec<&str> = if positional {
            body.split('#').collect()
        } else {
            vec![body]
        };

        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            if part.is_empty() {
                segments.push(None);
                continue;
            }
            let compiled = Pattern::new(part).map_err(|e| SyncError::Pattern {
                pattern: raw.to_string(),
                message: e.to_string(),
            })?;
            segments.push(Some(compiled));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            positional,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether an item with these match fields is inside the pattern.
    ///
    /// With `fold_first` the first positional segment ignores case.
    pub fn matches<S: AsRef<str>>(&self, fields: &[S], fold_first: bool) -> bool {
        if !self.positional {
            let Some(last) = fields.last() else {
                return false;
            };
            return match &self.segments[0] {
                Some(p) => p.matches_with(last.as_ref(), options(false)),
                None => true,
            };
        }

        for (idx, segment) in self.segments.iter().enumerate() {
            let Some(pattern) = segment else {
                continue;
            };
            let Some(value) = fields.get(idx) else {
                return false;
            };
            if !pattern.matches_with(value.as_ref(), options(fold_first && idx == 0)) {
                return false;
            }
        }
        true
    }
}

fn options(case_insensitive: bool) -> MatchOptions {
    MatchOptions {
        case_sensitive: !case_insensitive,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::method_and_path("#GET#/api/*", &["GET", "/api/users"], true, true)]
    #[case::method_case_insensitive("#get#/api/*", &["GET", "/api/users"], true, true)]
    #[case::wrong_method("#POST#/api/*", &["GET", "/api/users"], true, false)]
    #[case::any_method("##/api/*", &["PUT", "/api/users"], true, true)]
    #[case::method_only("#DELETE", &["DELETE", "/x"], true, true)]
    #[case::bare_matches_last_field("/api/*", &["GET", "/api/users"], true, true)]
    #[case::bare_misses("/admin/*", &["GET", "/api/users"], true, false)]
    #[case::event_handler("#device2#*", &["device2", "event"], false, true)]
    #[case::service_is_case_sensitive("#DEVICE2#*", &["device2", "event"], false, false)]
    #[case::module_name("util.*", &["util.strings"], false, true)]
    #[case::too_many_segments("#a#b#c", &["a", "b"], false, false)]
    fn pattern_matching(
        #[case] raw: &str,
        #[case] fields: &[&str],
        #[case] fold_first: bool,
        #[case] expected: bool,
    ) {
        let pattern = MatchPattern::parse(raw).expect("parse");
        assert_eq!(pattern.matches(fields, fold_first), expected, "{raw} vs {fields:?}");
    }

    #[test]
    fn invalid_glob_is_reported() {
        let err = MatchPattern::parse("#GET#/api/[").unwrap_err();
        assert!(matches!(err, SyncError::Pattern { .. }));
    }

    #[test]
    fn bare_pattern_needs_a_field() {
        let pattern = MatchPattern::parse("*").unwrap();
        let empty: [&str; 0] = [];
        assert!(!pattern.matches(&empty, false));
    }
}
