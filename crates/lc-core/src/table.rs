//! Target table
//!
//! A target describes one kind of wrapper URL: which pages it applies on, how
//! to recognize the wrapper, and which delimiter occurrences bound the payload.
//! Targets are compiled once from [`TargetSpec`] strings and never mutated.

use regex::{Regex, RegexBuilder};

/// Sentinel domain entry meaning "every page".
pub const ANY_DOMAIN: &str = "*";

// =============================================================================
// Errors
// =============================================================================

/// Error type for target table compilation.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Target {index}: invalid {field} regex: {source}")]
    InvalidRegex {
        index: usize,
        field: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("Target {0}: domain list is empty")]
    EmptyDomains(usize),
    #[cfg(feature = "serde")]
    #[error("Invalid target table JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Domain Scope
// =============================================================================

/// Pages a target applies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainScope {
    /// Applies on every page.
    Any,
    /// Applies only when the page host equals one of these (lower-cased) names.
    Hosts(Vec<String>),
}

impl DomainScope {
    /// Build a scope from a domain list. A leading `"*"` makes the scope global.
    pub fn from_domains<S: AsRef<str>>(domains: &[S]) -> Self {
        match domains.first() {
            Some(first) if first.as_ref() == ANY_DOMAIN => Self::Any,
            _ => Self::Hosts(
                domains
                    .iter()
                    .map(|d| d.as_ref().to_ascii_lowercase())
                    .collect(),
            ),
        }
    }

    /// Exact host comparison: no subdomain matching, no port stripping.
    #[inline]
    pub fn applies_to(&self, host: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Hosts(hosts) => hosts.iter().any(|h| h == host),
        }
    }
}

// =============================================================================
// Target Spec / Pattern
// =============================================================================

/// Uncompiled target, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetSpec {
    /// Page hosts this target applies on; `["*"]` for all pages
    pub domains: Vec<String>,
    /// Regex recognizing the wrapper, anchored at the start of the address
    pub wrapper: String,
    /// Regex for the marker right before the payload
    pub start: String,
    /// Which start marker occurrence to use; negative counts from the end
    #[cfg_attr(feature = "serde", serde(default))]
    pub start_index: isize,
    /// Regex for the marker right after the payload
    pub end: String,
    /// Which end marker occurrence to use; negative counts from the end
    #[cfg_attr(feature = "serde", serde(default))]
    pub end_index: isize,
    /// Percent-decode the payload before writing it back
    #[cfg_attr(feature = "serde", serde(default))]
    pub decode: bool,
}

/// Compiled, immutable target.
#[derive(Debug, Clone)]
pub struct TargetPattern {
    scope: DomainScope,
    wrapper: Regex,
    start: Regex,
    start_index: isize,
    end: Regex,
    end_index: isize,
    decode: bool,
}

impl TargetPattern {
    /// Compile a single spec.
    pub fn from_spec(spec: &TargetSpec) -> Result<Self, TableError> {
        compile_target(0, spec)
    }

    #[inline]
    pub fn scope(&self) -> &DomainScope {
        &self.scope
    }

    #[inline]
    pub fn wrapper(&self) -> &Regex {
        &self.wrapper
    }

    #[inline]
    pub fn start_delimiter(&self) -> &Regex {
        &self.start
    }

    #[inline]
    pub fn start_index(&self) -> isize {
        self.start_index
    }

    #[inline]
    pub fn end_delimiter(&self) -> &Regex {
        &self.end
    }

    #[inline]
    pub fn end_index(&self) -> isize {
        self.end_index
    }

    #[inline]
    pub fn requires_decoding(&self) -> bool {
        self.decode
    }

    /// Check whether `href` starts with this target's wrapper.
    #[inline]
    pub fn is_wrapped(&self, href: &str) -> bool {
        self.wrapper.is_match(href)
    }
}

fn compile_target(index: usize, spec: &TargetSpec) -> Result<TargetPattern, TableError> {
    if spec.domains.is_empty() {
        return Err(TableError::EmptyDomains(index));
    }

    let build = |field: &'static str, pattern: &str| {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| TableError::InvalidRegex { index, field, source })
    };

    Ok(TargetPattern {
        scope: DomainScope::from_domains(&spec.domains),
        wrapper: build("wrapper", &format!("^(?:{})", spec.wrapper))?,
        start: build("start", &spec.start)?,
        start_index: spec.start_index,
        end: build("end", &spec.end)?,
        end_index: spec.end_index,
        decode: spec.decode,
    })
}

// =============================================================================
// Target Table
// =============================================================================

/// Ordered, immutable list of targets.
#[derive(Debug, Clone, Default)]
pub struct TargetTable {
    targets: Vec<TargetPattern>,
}

impl TargetTable {
    /// Compile a table from specs, in order.
    pub fn from_specs(specs: &[TargetSpec]) -> Result<Self, TableError> {
        let targets = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| compile_target(index, spec))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { targets })
    }

    /// Compile a table from a JSON array of specs.
    #[cfg(feature = "serde")]
    pub fn from_json(text: &str) -> Result<Self, TableError> {
        let specs: Vec<TargetSpec> = serde_json::from_str(text)?;
        Self::from_specs(&specs)
    }

    /// The targets shipped with LinkCleaner.
    pub fn builtin() -> Self {
        Self::from_specs(&builtin_specs()).expect("built-in targets are valid")
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&TargetPattern> {
        self.targets.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TargetPattern> {
        self.targets.iter()
    }
}

impl<'a> IntoIterator for &'a TargetTable {
    type Item = &'a TargetPattern;
    type IntoIter = std::slice::Iter<'a, TargetPattern>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

// =============================================================================
// Built-in Targets
// =============================================================================

/// Query value up to the next parameter, or to the end.
const PARAM_END: &str = "(&|$)";

/// Specs for the built-in table. Global targets keep `"*"` as their first domain.
pub fn builtin_specs() -> Vec<TargetSpec> {
    fn spec(
        domains: &[&str],
        wrapper: &str,
        start: &str,
        end: &str,
        end_index: isize,
    ) -> TargetSpec {
        TargetSpec {
            domains: domains.iter().map(|d| d.to_string()).collect(),
            wrapper: wrapper.to_string(),
            start: start.to_string(),
            start_index: 0,
            end: end.to_string(),
            end_index,
            decode: true,
        }
    }

    vec![
        // YouTube description/comment links
        spec(&["www.youtube.com"], r"https?://www\.youtube\.com/redirect\?", "q=", PARAM_END, 0),
        // Steam "you are leaving Steam" page
        spec(&["steamcommunity.com"], r"https?://steamcommunity\.com/linkfilter/\?", "u=", PARAM_END, 0),
        // DuckDuckGo image proxy
        spec(&[ANY_DOMAIN], r"https?://external-content\.duckduckgo\.com/iu/", "u=", PARAM_END, 0),
        // Google image results
        spec(&[ANY_DOMAIN], r"https?://google\.com/imgres\?", "imgurl=", PARAM_END, 0),
        // Disqus appends ":<hash>" after the encoded destination
        spec(&[ANY_DOMAIN], r"https?://disq\.us/url\?", "url=", "%3A", -1),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_compiles() {
        let table = TargetTable::builtin();
        assert_eq!(table.len(), 5);
        assert!(table.iter().all(|t| t.requires_decoding()));
    }

    #[test]
    fn test_scope_from_domains() {
        assert_eq!(DomainScope::from_domains(&["*"]), DomainScope::Any);
        assert_eq!(DomainScope::from_domains(&["*", "example.com"]), DomainScope::Any);
        assert_eq!(
            DomainScope::from_domains(&["WWW.Example.com"]),
            DomainScope::Hosts(vec!["www.example.com".to_string()])
        );
        // Wildcard only counts in first position
        assert!(!DomainScope::from_domains(&["example.com", "*"]).applies_to("other.com"));
    }

    #[test]
    fn test_scope_exact_host() {
        let scope = DomainScope::from_domains(&["steamcommunity.com"]);
        assert!(scope.applies_to("steamcommunity.com"));
        assert!(!scope.applies_to("example.com"));
        assert!(!scope.applies_to("www.steamcommunity.com"));
        assert!(!scope.applies_to("steamcommunity.com:443"));
        assert!(DomainScope::Any.applies_to("example.com"));
    }

    #[test]
    fn test_wrapper_anchored_and_case_insensitive() {
        let table = TargetTable::builtin();
        let youtube = table.get(0).unwrap();
        assert!(youtube.is_wrapped("https://www.youtube.com/redirect?q=x"));
        assert!(youtube.is_wrapped("HTTP://WWW.YOUTUBE.COM/REDIRECT?q=x"));
        assert!(!youtube.is_wrapped("see https://www.youtube.com/redirect?q=x"));
        assert!(!youtube.is_wrapped("https://wwwxyoutube.com/redirect?q=x"));
    }

    #[test]
    fn test_empty_domains_rejected() {
        let mut specs = builtin_specs();
        specs[2].domains.clear();
        assert!(matches!(TargetTable::from_specs(&specs), Err(TableError::EmptyDomains(2))));
    }

    #[test]
    fn test_invalid_regex_reports_field() {
        let mut specs = builtin_specs();
        specs[1].end = "(&|$".to_string();
        match TargetTable::from_specs(&specs) {
            Err(TableError::InvalidRegex { index, field, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(field, "end");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json() {
        let json = r#"[
            {
                "domains": ["*"],
                "wrapper": "https?://out\\.example\\.net/\\?",
                "start": "to=",
                "end": "(&|$)",
                "decode": true
            }
        ]"#;
        let table = TargetTable::from_json(json).unwrap();
        assert_eq!(table.len(), 1);
        let target = table.get(0).unwrap();
        assert_eq!(target.scope(), &DomainScope::Any);
        assert_eq!(target.start_index(), 0);
        assert_eq!(target.end_index(), 0);
        assert!(target.is_wrapped("https://out.example.net/?to=x"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_shipped_json_matches_builtin() {
        let json = include_str!("../../../data/targets.json");
        let specs: Vec<TargetSpec> = serde_json::from_str(json).unwrap();
        assert_eq!(specs, builtin_specs());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(TargetTable::from_json("{"), Err(TableError::Json(_))));
    }
}
