//! Path pattern compilation and matching.
//!
//! # Responsibilities
//! - Compile path templates (`/users/:id`, `/static/*`) and raw regular
//!   expressions into immutable matchers
//! - Test a mount-relative request path and extract named parameters
//!
//! # Design Decisions
//! - Closed set of pattern kinds; every kind has exactly one match routine
//! - All syntax errors surface at compile time, never while matching
//! - Captures borrow from the pattern and the request path; only
//!   percent-escaped values allocate
//! - A single trailing `/` on the request path is ignored for
//!   static and templated patterns; request paths with empty
//!   segments (`//`) never match them
//! - Case-insensitive matching folds Unicode lowercase for every
//!   pattern kind, the same rule the regex engine applies

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Parameter name the trailing wildcard binds under.
pub const WILDCARD_PARAM: &str = "*";

/// Errors raised while compiling a pattern.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatternError {
    /// Templates are absolute paths.
    #[error("path template {0:?} must start with '/'")]
    MissingLeadingSlash(String),

    /// `/a//b` style templates.
    #[error("path template {0:?} contains an empty segment")]
    EmptySegment(String),

    /// A `:` sigil with nothing after it.
    #[error("empty parameter name in path template {0:?}")]
    EmptyParamName(String),

    /// Parameter names are limited to ASCII alphanumerics and `_`.
    #[error("invalid parameter name {name:?} in path template {template:?}")]
    InvalidParamName { template: String, name: String },

    /// The same name bound twice by one template.
    #[error("parameter {name:?} bound more than once in path template {template:?}")]
    DuplicateParam { template: String, name: String },

    /// `*` is only allowed as the final segment.
    #[error("wildcard must be the final segment of path template {0:?}")]
    MisplacedWildcard(String),

    /// The regex crate rejected the expression.
    #[error("invalid regular expression {expr:?}: {reason}")]
    Regex { expr: String, reason: String },

    /// Group 0 is the whole match and is never exposed.
    #[error("capture group 0 cannot be bound to parameter {0:?}")]
    WholeMatchGroup(String),

    /// The group table points past the expression's groups.
    #[error("capture group {index} for parameter {name:?} does not exist in {expr:?}")]
    GroupOutOfRange {
        expr: String,
        name: String,
        index: usize,
    },

    /// Mount points are literal prefixes.
    #[error("mount point {0:?} must be a literal path prefix")]
    InvalidMountPoint(String),
}

/// Knobs applied when a pattern is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Compare literal segments case-sensitively.
    pub case_sensitive: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
        }
    }
}

/// Discriminant of [`Pattern`], handy for logging and tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Static,
    Templated,
    Regex,
}

impl PatternKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PatternKind::Static => "static",
            PatternKind::Templated => "templated",
            PatternKind::Regex => "regex",
        }
    }
}

/// One segment of a templated path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(Box<str>),
    Param(Box<str>),
    Wildcard,
}

/// A compiled, immutable path matcher.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Plain path without parameters.
    Static {
        path: Box<str>,
        case_sensitive: bool,
    },
    /// Path with `:name` segments and/or a trailing `*`.
    Templated {
        template: Box<str>,
        segments: Box<[Segment]>,
        case_sensitive: bool,
    },
    /// Anchored regular expression with a parameter name per group.
    Regex {
        regex: Regex,
        source: Box<str>,
        groups: Box<[(Box<str>, usize)]>,
    },
}

impl Pattern {
    /// Compile a path template with default options.
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        Self::compile_with(template, MatchOptions::default())
    }

    /// Compile a path template.
    pub fn compile_with(template: &str, options: MatchOptions) -> Result<Self, PatternError> {
        if !template.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(template.to_string()));
        }

        let body = trim_trailing_slash(template);
        if body == "/" {
            return Ok(Pattern::Static {
                path: "/".into(),
                case_sensitive: options.case_sensitive,
            });
        }

        let raw: Vec<&str> = body[1..].split('/').collect();
        let mut segments = Vec::with_capacity(raw.len());
        let mut names: Vec<&str> = Vec::new();

        for (i, part) in raw.iter().enumerate() {
            if part.is_empty() {
                return Err(PatternError::EmptySegment(template.to_string()));
            }
            if *part == WILDCARD_PARAM {
                if i + 1 != raw.len() {
                    return Err(PatternError::MisplacedWildcard(template.to_string()));
                }
                segments.push(Segment::Wildcard);
                continue;
            }
            if let Some(name) = part.strip_prefix(':') {
                validate_param_name(template, name)?;
                if names.contains(&name) {
                    return Err(PatternError::DuplicateParam {
                        template: template.to_string(),
                        name: name.to_string(),
                    });
                }
                names.push(name);
                segments.push(Segment::Param(name.into()));
                continue;
            }
            segments.push(Segment::Literal((*part).into()));
        }

        let dynamic = segments
            .iter()
            .any(|s| !matches!(s, Segment::Literal(_)));
        if !dynamic {
            return Ok(Pattern::Static {
                path: body.into(),
                case_sensitive: options.case_sensitive,
            });
        }

        Ok(Pattern::Templated {
            template: template.into(),
            segments: segments.into_boxed_slice(),
            case_sensitive: options.case_sensitive,
        })
    }

    /// Compile a regular expression, binding named groups by name and
    /// unnamed groups as `param0`, `param1`, ...
    pub fn regex(expr: &str) -> Result<Self, PatternError> {
        Self::regex_with(expr, None, MatchOptions::default())
    }

    /// Compile a regular expression with an explicit name → group table.
    pub fn regex_with_groups(expr: &str, groups: &[(&str, usize)]) -> Result<Self, PatternError> {
        Self::regex_with(expr, Some(groups), MatchOptions::default())
    }

    /// Compile a regular expression.
    ///
    /// The expression is anchored at both ends, so it must match the
    /// whole mount-relative path.
    pub fn regex_with(
        expr: &str,
        groups: Option<&[(&str, usize)]>,
        options: MatchOptions,
    ) -> Result<Self, PatternError> {
        let invalid = |e: regex::Error| PatternError::Regex {
            expr: expr.to_string(),
            reason: e.to_string(),
        };
        // The bare expression must parse on its own; a stray `)` could
        // otherwise escape the anchoring group below.
        Regex::new(expr).map_err(invalid)?;
        let regex = RegexBuilder::new(&format!("^(?:{expr})$"))
            .case_insensitive(!options.case_sensitive)
            .build()
            .map_err(invalid)?;

        let table: Vec<(Box<str>, usize)> = match groups {
            Some(groups) => {
                let available = regex.captures_len();
                let mut table = Vec::with_capacity(groups.len());
                for (name, index) in groups {
                    if *index == 0 {
                        return Err(PatternError::WholeMatchGroup(name.to_string()));
                    }
                    if *index >= available {
                        return Err(PatternError::GroupOutOfRange {
                            expr: expr.to_string(),
                            name: name.to_string(),
                            index: *index,
                        });
                    }
                    table.push(((*name).into(), *index));
                }
                table
            }
            None => {
                let mut unnamed = 0usize;
                regex
                    .capture_names()
                    .enumerate()
                    .skip(1)
                    .map(|(index, name)| match name {
                        Some(name) => (name.into(), index),
                        None => {
                            let generated = format!("param{unnamed}");
                            unnamed += 1;
                            (generated.into_boxed_str(), index)
                        }
                    })
                    .collect()
            }
        };

        Ok(Pattern::Regex {
            regex,
            source: expr.into(),
            groups: table.into_boxed_slice(),
        })
    }

    pub fn kind(&self) -> PatternKind {
        match self {
            Pattern::Static { .. } => PatternKind::Static,
            Pattern::Templated { .. } => PatternKind::Templated,
            Pattern::Regex { .. } => PatternKind::Regex,
        }
    }

    /// The template or expression this pattern was compiled from.
    pub fn source(&self) -> &str {
        match self {
            Pattern::Static { path, .. } => path,
            Pattern::Templated { template, .. } => template,
            Pattern::Regex { source, .. } => source,
        }
    }

    /// Names this pattern can bind, in declaration order.
    pub fn param_names(&self) -> Vec<&str> {
        match self {
            Pattern::Static { .. } => Vec::new(),
            Pattern::Templated { segments, .. } => segments
                .iter()
                .filter_map(|s| match s {
                    Segment::Literal(_) => None,
                    Segment::Param(name) => Some(&**name),
                    Segment::Wildcard => Some(WILDCARD_PARAM),
                })
                .collect(),
            Pattern::Regex { groups, .. } => groups.iter().map(|(name, _)| &**name).collect(),
        }
    }

    /// Match a mount-relative path.
    pub fn matches<'a>(&'a self, path: &'a str) -> Option<Captures<'a>> {
        match self {
            Pattern::Static {
                path: expected,
                case_sensitive,
            } => {
                let candidate = normalize_request_path(path)?;
                literal_eq(expected, candidate, *case_sensitive).then(Captures::default)
            }
            Pattern::Templated {
                segments,
                case_sensitive,
                ..
            } => match_segments(segments, path, *case_sensitive),
            Pattern::Regex { regex, groups, .. } => {
                if groups.is_empty() {
                    return regex.is_match(path).then(Captures::default);
                }
                let found = regex.captures(path)?;
                let mut captures = Captures::with_capacity(groups.len());
                for (name, index) in groups.iter() {
                    if let Some(m) = found.get(*index) {
                        captures.push(name, decode(m.as_str()));
                    }
                }
                Some(captures)
            }
        }
    }
}

/// Parameters captured by a single successful match.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Captures<'a> {
    entries: Vec<(&'a str, Cow<'a, str>)>,
}

impl<'a> Captures<'a> {
    fn with_capacity(n: usize) -> Self {
        Self {
            entries: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, name: &'a str, value: Cow<'a, str>) {
        self.entries.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (*n, v.as_ref()))
    }

    pub(crate) fn into_entries(self) -> Vec<(&'a str, Cow<'a, str>)> {
        self.entries
    }
}

fn match_segments<'a>(
    segments: &'a [Segment],
    path: &'a str,
    case_sensitive: bool,
) -> Option<Captures<'a>> {
    let trimmed = normalize_request_path(path)?;
    let mut rest = Some(trimmed.strip_prefix('/')?);
    let mut captures = Captures::default();

    for segment in segments {
        match segment {
            Segment::Literal(literal) => {
                let part = next_segment(&mut rest)?;
                if !literal_eq(literal, part, case_sensitive) {
                    return None;
                }
            }
            Segment::Param(name) => {
                let part = next_segment(&mut rest)?;
                if part.is_empty() {
                    return None;
                }
                captures.push(name, decode(part));
            }
            Segment::Wildcard => {
                let remainder = rest.take().unwrap_or("");
                captures.push(WILDCARD_PARAM, decode(remainder));
                return Some(captures);
            }
        }
    }

    rest.is_none().then_some(captures)
}

fn next_segment<'a>(rest: &mut Option<&'a str>) -> Option<&'a str> {
    let current = rest.take()?;
    match current.find('/') {
        Some(idx) => {
            *rest = Some(&current[idx + 1..]);
            Some(&current[..idx])
        }
        None => Some(current),
    }
}

fn trim_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Drop one trailing `/`; `None` if the path has an empty segment.
fn normalize_request_path(path: &str) -> Option<&str> {
    if path.contains("//") {
        return None;
    }
    Some(trim_trailing_slash(path))
}

fn literal_eq(expected: &str, actual: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        expected == actual
    } else {
        expected
            .chars()
            .flat_map(char::to_lowercase)
            .eq(actual.chars().flat_map(char::to_lowercase))
    }
}

fn decode(raw: &str) -> Cow<'_, str> {
    if raw.contains('%') {
        percent_decode_str(raw).decode_utf8_lossy()
    } else {
        Cow::Borrowed(raw)
    }
}

fn validate_param_name(template: &str, name: &str) -> Result<(), PatternError> {
    if name.is_empty() {
        return Err(PatternError::EmptyParamName(template.to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PatternError::InvalidParamName {
            template: template.to_string(),
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Check that `prefix` can serve as a mount point.
pub(crate) fn validate_mount_point(prefix: &str) -> Result<(), PatternError> {
    if !prefix.starts_with('/') {
        return Err(PatternError::MissingLeadingSlash(prefix.to_string()));
    }
    let dynamic = prefix
        .split('/')
        .any(|s| s.starts_with(':') || s.contains('*'));
    if dynamic {
        return Err(PatternError::InvalidMountPoint(prefix.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_param() {
        let pattern = Pattern::compile("/foo/:bar").unwrap();
        assert_eq!(pattern.kind(), PatternKind::Templated);

        let caps = pattern.matches("/foo/123").unwrap();
        assert_eq!(caps.get("bar"), Some("123"));
        assert_eq!(caps.len(), 1);

        assert!(pattern.matches("/foo").is_none());
        assert!(pattern.matches("/foo/").is_none());
        assert!(pattern.matches("/foo/1/2").is_none());
        assert!(pattern.matches("/foo123").is_none());
    }

    #[test]
    fn test_trailing_wildcard() {
        let pattern = Pattern::compile("/foo/*").unwrap();

        let caps = pattern.matches("/foo/a/b/c").unwrap();
        assert_eq!(caps.get(WILDCARD_PARAM), Some("a/b/c"));

        assert_eq!(pattern.matches("/foo").unwrap().get("*"), Some(""));
        assert_eq!(pattern.matches("/foo/").unwrap().get("*"), Some(""));
        assert!(pattern.matches("/foobar").is_none());
    }

    #[test]
    fn test_static_ignores_trailing_slash() {
        let pattern = Pattern::compile("/health").unwrap();
        assert_eq!(pattern.kind(), PatternKind::Static);
        assert!(pattern.matches("/health").is_some());
        assert!(pattern.matches("/health/").is_some());
        assert!(pattern.matches("/Health").is_none());
        assert!(pattern.matches("/health/x").is_none());

        let root = Pattern::compile("/").unwrap();
        assert!(root.matches("/").is_some());
        assert!(root.matches("/a").is_none());
    }

    #[test]
    fn test_case_insensitive_literals() {
        let options = MatchOptions {
            case_sensitive: false,
        };
        let pattern = Pattern::compile_with("/Users/:id", options).unwrap();
        let caps = pattern.matches("/users/Ab").unwrap();
        // Values keep their original case.
        assert_eq!(caps.get("id"), Some("Ab"));
    }

    #[test]
    fn test_percent_decoding() {
        let pattern = Pattern::compile("/files/:name/*").unwrap();
        let caps = pattern.matches("/files/hello%20world/a%2Fb/c").unwrap();
        assert_eq!(caps.get("name"), Some("hello world"));
        assert_eq!(caps.get("*"), Some("a/b/c"));
    }

    #[test]
    fn test_template_errors() {
        assert_eq!(
            Pattern::compile("foo").unwrap_err(),
            PatternError::MissingLeadingSlash("foo".into())
        );
        assert!(matches!(
            Pattern::compile("/a//b"),
            Err(PatternError::EmptySegment(_))
        ));
        assert!(matches!(
            Pattern::compile("/a/:"),
            Err(PatternError::EmptyParamName(_))
        ));
        assert!(matches!(
            Pattern::compile("/a/:na-me"),
            Err(PatternError::InvalidParamName { .. })
        ));
        assert!(matches!(
            Pattern::compile("/:id/:id"),
            Err(PatternError::DuplicateParam { .. })
        ));
        assert!(matches!(
            Pattern::compile("/a/*/b"),
            Err(PatternError::MisplacedWildcard(_))
        ));
    }

    #[test]
    fn test_regex_catch_all() {
        let pattern = Pattern::regex(".*").unwrap();
        assert_eq!(pattern.kind(), PatternKind::Regex);
        for path in ["/", "/foo123", "/a/b/c", ""] {
            assert!(pattern.matches(path).is_some(), "{path} should match");
        }
    }

    #[test]
    fn test_regex_is_anchored() {
        let pattern = Pattern::regex("/api/v[0-9]+").unwrap();
        assert!(pattern.matches("/api/v2").is_some());
        assert!(pattern.matches("/api/v2/users").is_none());
        assert!(pattern.matches("/x/api/v2").is_none());
    }

    #[test]
    fn test_unbalanced_regex_is_rejected() {
        assert!(matches!(
            Pattern::regex("/a)|(?:.*"),
            Err(PatternError::Regex { .. })
        ));
        assert!(matches!(
            Pattern::regex("/x)(/y"),
            Err(PatternError::Regex { .. })
        ));
    }

    #[test]
    fn test_empty_request_segments_never_match() {
        let root = Pattern::compile("/").unwrap();
        assert!(root.matches("//").is_none());

        let health = Pattern::compile("/health").unwrap();
        assert!(health.matches("//health").is_none());
        assert!(health.matches("/health//").is_none());

        let files = Pattern::compile("/files/*").unwrap();
        assert!(files.matches("/files//a").is_none());
        assert!(files.matches("/files/a/b").is_some());
    }

    #[test]
    fn test_case_folding_agrees_across_kinds() {
        let options = MatchOptions {
            case_sensitive: false,
        };
        let templated = Pattern::compile_with("/Ärger/:id", options).unwrap();
        let regex = Pattern::regex_with("/Ärger/[0-9]+", None, options).unwrap();

        for path in ["/ärger/1", "/ÄRGER/1"] {
            assert!(templated.matches(path).is_some(), "{path}");
            assert!(regex.matches(path).is_some(), "{path}");
        }
    }

    #[test]
    fn test_regex_group_naming() {
        let pattern = Pattern::regex(r"/(?P<kind>[a-z]+)/(\d+)/(\d+)").unwrap();
        assert_eq!(pattern.param_names(), vec!["kind", "param0", "param1"]);

        let caps = pattern.matches("/order/12/7").unwrap();
        assert_eq!(caps.get("kind"), Some("order"));
        assert_eq!(caps.get("param0"), Some("12"));
        assert_eq!(caps.get("param1"), Some("7"));
    }

    #[test]
    fn test_regex_explicit_groups() {
        let pattern = Pattern::regex_with_groups(r"/(\w+)/(\w+)", &[("second", 2)]).unwrap();
        let caps = pattern.matches("/one/two").unwrap();
        assert_eq!(caps.get("second"), Some("two"));
        assert_eq!(caps.len(), 1);

        assert!(matches!(
            Pattern::regex_with_groups(r"/(\w+)", &[("all", 0)]),
            Err(PatternError::WholeMatchGroup(_))
        ));
        assert!(matches!(
            Pattern::regex_with_groups(r"/(\w+)", &[("missing", 2)]),
            Err(PatternError::GroupOutOfRange { index: 2, .. })
        ));
        assert!(matches!(
            Pattern::regex("/(unclosed"),
            Err(PatternError::Regex { .. })
        ));
    }

    #[test]
    fn test_mount_point_validation() {
        assert!(validate_mount_point("/api").is_ok());
        assert!(validate_mount_point("/api/v1/").is_ok());
        assert!(validate_mount_point("api").is_err());
        assert!(validate_mount_point("/api/:tenant").is_err());
        assert!(validate_mount_point("/api/*").is_err());
    }
}
