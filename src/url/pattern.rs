//! Delimited filter expressions
//!
//! Filter expressions are written with their own delimiters and trailing
//! modifiers, e.g. `#date\=#i` or `{/agenda}i`, so each expression carries its
//! own case sensitivity.

use crate::ConfigError;
use regex::{Regex, RegexBuilder};
use std::fmt;

/// A compiled, delimited regular expression used to exclude URLs
#[derive(Debug, Clone)]
pub struct FilterPattern {
    source: String,
    regex: Regex,
}

impl FilterPattern {
    /// Parses and compiles a delimited expression
    ///
    /// The first character is the delimiter. Bracket delimiters close with
    /// their counterpart (`()`, `{}`, `[]`, `<>`); any other delimiter closes
    /// with itself. Characters after the closing delimiter are modifiers:
    ///
    /// | Modifier | Effect |
    /// |----------|--------|
    /// | `i` | case-insensitive |
    /// | `m` | `^`/`$` match at line boundaries |
    /// | `s` | `.` matches newlines |
    /// | `x` | ignore whitespace and `#` comments |
    /// | `U` | swap greediness |
    /// | `u` | unicode (always on) |
    ///
    /// # Examples
    ///
    /// ```
    /// use sitesearch::url::FilterPattern;
    ///
    /// let pattern = FilterPattern::parse(r"#date\=#i").unwrap();
    /// assert!(pattern.is_match("https://example.com/agenda?DATE=1"));
    /// assert!(!pattern.is_match("https://example.com/agenda"));
    /// ```
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let trimmed = source.trim();
        let mut chars = trimmed.chars();

        let open = chars.next().ok_or_else(|| {
            ConfigError::InvalidPattern("Filter expression cannot be empty".to_string())
        })?;

        if open.is_alphanumeric() || open == '\\' || open.is_whitespace() {
            return Err(ConfigError::InvalidPattern(format!(
                "'{}': delimiter must not be alphanumeric, backslash or whitespace",
                source
            )));
        }

        let close = closing_delimiter(open);
        let rest = &trimmed[open.len_utf8()..];
        let end = rest.rfind(close).ok_or_else(|| {
            ConfigError::InvalidPattern(format!(
                "'{}': no ending delimiter '{}' found",
                source, close
            ))
        })?;

        let body = &rest[..end];
        let modifiers = &rest[end + close.len_utf8()..];

        let mut builder = RegexBuilder::new(body);
        for modifier in modifiers.chars() {
            match modifier {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                'U' => builder.swap_greed(true),
                'u' => builder.unicode(true),
                other => {
                    return Err(ConfigError::InvalidPattern(format!(
                        "'{}': unknown modifier '{}'",
                        source, other
                    )))
                }
            };
        }

        let regex = builder
            .build()
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", source, e)))?;

        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// Returns true if the expression matches anywhere in `url`
    pub fn is_match(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// The expression as written in the configuration
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for FilterPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn closing_delimiter(open: char) -> char {
    match open {
        '(' => ')',
        '{' => '}',
        '[' => ']',
        '<' => '>',
        other => other,
    }
}
