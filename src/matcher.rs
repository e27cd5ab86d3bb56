//! Path matching for routes and middleware guards.
//!
//! A pattern is one of three things, selected by [`MatchOptions`]:
//!
//! - **literal**: exact string equality with the requested path;
//! - **regex**: the pattern is a regular expression tested for containment
//!   (unanchored) against the requested path;
//! - **param**: every `:name` token (ASCII letters only) becomes a `(.+)`
//!   capture, the rest of the pattern is matched literally, and each capture
//!   is bound to its name in left-to-right order.
//!
//! The tests fall through in that order: a regex miss tries the param form
//! (if enabled), and a param miss tries exact equality.
//!
//! ```rust
//! use junction::{MatchOptions, PathPattern};
//!
//! let pattern = PathPattern::compile("/index/:id/:style", MatchOptions::params()).unwrap();
//! let result = pattern.execute("/index/123/321");
//! assert!(result.matched);
//! assert_eq!(result.param("id"), Some("123"));
//!
//! // An empty segment cannot satisfy a one-or-more capture.
//! let pattern = PathPattern::compile("/index/:id/:style/:d", MatchOptions::params()).unwrap();
//! assert!(!pattern.execute("/index/123//1").matched);
//! ```
//!
//! Patterns are compiled once at registration; matching never allocates a
//! regex on the request path.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;

/// Named parameters extracted from a path.
pub type Params = HashMap<String, String>;

/// `:name` placeholder inside a param pattern.
static PARAM_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([a-zA-Z]+)").expect("static regex"));

/// Capture substituted for every `:name` token.
const PARAM_CAPTURE: &str = "(.+)";

/// Flags controlling how a pattern is interpreted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MatchOptions {
    pub parse_params: bool,
    pub is_regexp: bool,
}

impl MatchOptions {
    /// Exact string equality only.
    pub fn literal() -> Self {
        Self::default()
    }

    /// `:name` placeholders are captured.
    pub fn params() -> Self {
        Self { parse_params: true, is_regexp: false }
    }

    /// The pattern is a regular expression.
    pub fn regex() -> Self {
        Self { parse_params: false, is_regexp: true }
    }

    /// The dominant interpretation: regex beats params beats literal.
    pub fn mode(self) -> MatchMode {
        if self.is_regexp {
            MatchMode::Regex
        } else if self.parse_params {
            MatchMode::Param
        } else {
            MatchMode::Literal
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchMode {
    Literal,
    Regex,
    Param,
}

/// Outcome of matching one pattern against one path.
///
/// `params` is `Some` only when the param form produced the match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub matched: bool,
    pub params: Option<Params>,
}

impl MatchResult {
    fn miss() -> Self {
        Self::default()
    }

    fn hit() -> Self {
        Self { matched: true, params: None }
    }

    fn with_params(params: Params) -> Self {
        Self { matched: true, params: Some(params) }
    }

    /// Looks up one extracted parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.as_ref()?.get(name).map(String::as_str)
    }

    /// Consumes the result, yielding the parameters (empty when none were extracted).
    pub fn into_params(self) -> Params {
        self.params.unwrap_or_default()
    }
}

/// Compiled `:name` pattern.
#[derive(Debug)]
struct ParamPattern {
    regex: Regex,
    names: Vec<String>,
}

/// A pattern compiled for repeated matching.
#[derive(Debug)]
pub struct PathPattern {
    source: String,
    options: MatchOptions,
    regex: Option<Regex>,
    param: Option<ParamPattern>,
}

impl PathPattern {
    /// Compiles `pattern` under `options`.
    ///
    /// # Errors
    ///
    /// [`Error::Pattern`] when a regex pattern does not compile, and
    /// [`Error::DuplicateParam`] when a param pattern declares the same name twice.
    pub fn compile(pattern: &str, options: MatchOptions) -> Result<Self, Error> {
        let regex = if options.is_regexp {
            Some(Regex::new(pattern).map_err(|source| Error::Pattern {
                pattern: pattern.to_owned(),
                source,
            })?)
        } else {
            None
        };

        let param = if options.parse_params { compile_params(pattern)? } else { None };

        Ok(Self { source: pattern.to_owned(), options, regex, param })
    }

    /// The pattern exactly as registered.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    pub fn mode(&self) -> MatchMode {
        self.options.mode()
    }

    /// Matches `requested` against this pattern.
    pub fn execute(&self, requested: &str) -> MatchResult {
        if let Some(regex) = &self.regex {
            if regex.is_match(requested) {
                return MatchResult::hit();
            }
        }

        if let Some(param) = &self.param {
            if let Some(params) = param.extract(requested) {
                return MatchResult::with_params(params);
            }
        }

        if self.source == requested {
            return MatchResult::hit();
        }

        MatchResult::miss()
    }
}

impl ParamPattern {
    fn extract(&self, requested: &str) -> Option<Params> {
        let captures = self.regex.captures(requested)?;
        let params = self
            .names
            .iter()
            .zip(captures.iter().skip(1))
            .filter_map(|(name, value)| Some((name.clone(), value?.as_str().to_owned())))
            .collect();
        Some(params)
    }
}

/// Rewrites every `:name` token into a capture. `None` when the pattern has no tokens.
fn compile_params(pattern: &str) -> Result<Option<ParamPattern>, Error> {
    let mut rewritten = String::with_capacity(pattern.len() + 16);
    let mut names: Vec<String> = Vec::new();
    let mut last = 0;

    for token in PARAM_TOKEN.captures_iter(pattern) {
        let (Some(whole), Some(name)) = (token.get(0), token.get(1)) else {
            continue;
        };
        let name = name.as_str();
        if names.iter().any(|n| n == name) {
            return Err(Error::DuplicateParam {
                pattern: pattern.to_owned(),
                name: name.to_owned(),
            });
        }
        rewritten.push_str(&regex::escape(&pattern[last..whole.start()]));
        rewritten.push_str(PARAM_CAPTURE);
        names.push(name.to_owned());
        last = whole.end();
    }

    if names.is_empty() {
        return Ok(None);
    }
    rewritten.push_str(&regex::escape(&pattern[last..]));

    let regex = Regex::new(&rewritten).map_err(|source| Error::Pattern {
        pattern: pattern.to_owned(),
        source,
    })?;
    Ok(Some(ParamPattern { regex, names }))
}

/// One-shot match: compiles `pattern` and tests `requested` against it.
///
/// Prefer [`PathPattern::compile`] when the same pattern is matched repeatedly.
pub fn execute(requested: &str, pattern: &str, options: MatchOptions) -> Result<MatchResult, Error> {
    Ok(PathPattern::compile(pattern, options)?.execute(requested))
}
