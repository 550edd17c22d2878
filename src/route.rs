//! Route descriptors and path patterns.
//!
//! Patterns compile once at mount time into a tagged matcher, so matching a
//! request is a scan over prebuilt structures with no per-request parsing.
//!
//! # Usage - route patterns
//! * `/widgets`: matches exactly /widgets
//! * `/widgets/:id`: matches /widgets/42, adds id="42" to request params
//! * [`RouteOptions::regex`]: matches a full path against a regex, named
//!   capture groups become params
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use semver::Version;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    HEAD,
    POST,
    PUT,
    PATCH,
    DELETE,
    OPTIONS,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::GET => "GET",
            Self::HEAD => "HEAD",
            Self::POST => "POST",
            Self::PUT => "PUT",
            Self::PATCH => "PATCH",
            Self::DELETE => "DELETE",
            Self::OPTIONS => "OPTIONS",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct UnknownMethod(pub String);

impl fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown HTTP method '{}'", self.0)
    }
}

impl FromStr for Method {
    type Err = UnknownMethod;
    fn from_str(s: &str) -> Result<Self, UnknownMethod> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Self::GET),
            "HEAD" => Ok(Self::HEAD),
            "POST" => Ok(Self::POST),
            "PUT" => Ok(Self::PUT),
            "PATCH" => Ok(Self::PATCH),
            "DELETE" => Ok(Self::DELETE),
            "OPTIONS" => Ok(Self::OPTIONS),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

enum Segment {
    Literal(String),
    Param(String),
}

impl Segment {
    fn from_str(s: &str) -> Self {
        if let Some(name) = s.strip_prefix(':') {
            Self::Param(name.to_string())
        } else {
            Self::Literal(s.to_string())
        }
    }
}

/// A path pattern, compiled at mount time.
pub(crate) enum PathPattern {
    Literal(String),
    Templated(Vec<Segment>),
    Regex(Regex),
}

impl PathPattern {
    pub(crate) fn compile(path: &str, regex: Option<Regex>) -> Self {
        if let Some(re) = regex {
            return Self::Regex(re);
        }
        if path.split('/').any(|part| part.starts_with(':')) {
            Self::Templated(path.split('/').map(Segment::from_str).collect())
        } else {
            Self::Literal(path.to_string())
        }
    }

    /// Match a request path, extracting params from named segments or
    /// named regex capture groups. Regex patterns must cover the whole
    /// path, so overlapping prefixes stay deterministic.
    pub(crate) fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        match self {
            Self::Literal(p) => {
                if p == path {
                    Some(HashMap::new())
                } else {
                    None
                }
            }
            Self::Templated(segments) => {
                let parts: Vec<&str> = path.split('/').collect();
                if parts.len() != segments.len() {
                    return None;
                }
                let mut params = HashMap::new();
                for (segment, part) in segments.iter().zip(parts.iter()) {
                    match segment {
                        Segment::Literal(s) => {
                            if s != part {
                                return None;
                            }
                        }
                        Segment::Param(name) => {
                            params.insert(name.clone(), part.to_string());
                        }
                    }
                }
                Some(params)
            }
            Self::Regex(re) => {
                let caps = re.captures(path)?;
                let whole = caps.get(0)?;
                if whole.start() != 0 || whole.end() != path.len() {
                    return None;
                }
                let mut params = HashMap::new();
                for name in re.capture_names().flatten() {
                    if let Some(m) = caps.name(name) {
                        params.insert(name.to_string(), m.as_str().to_string());
                    }
                }
                Some(params)
            }
        }
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(p) => write!(f, "Literal({})", p),
            Self::Templated(_) => write!(f, "Templated"),
            Self::Regex(re) => write!(f, "Regex({})", re.as_str()),
        }
    }
}

/// What a mount call needs: a path, optionally a regex matcher, an explicit
/// name and a version set. Plain `&str` paths convert directly.
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    pub(crate) path: String,
    pub(crate) regex: Option<Regex>,
    pub(crate) name: Option<String>,
    pub(crate) versions: Vec<Version>,
}

impl RouteOptions {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Self::default()
        }
    }

    /// Route matched by a regex over the full request path.
    pub fn regex(re: Regex) -> Self {
        Self {
            path: re.as_str().to_string(),
            regex: Some(re),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.versions.push(version);
        self
    }

    pub fn versions(mut self, versions: Vec<Version>) -> Self {
        self.versions = versions;
        self
    }
}

impl From<&str> for RouteOptions {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Immutable descriptor of a mounted route. Created at mount time, removed
/// only by an explicit unmount.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub name: String,
    pub method: Method,
    pub path: String,
    pub versions: Vec<Version>,
}

/// Normalize a route name: strip non-word characters and lowercase, the
/// same shape whether the name was given or derived.
pub(crate) fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_lowercase()
}

/// Derive a route name from method, path and versions.
pub(crate) fn derive_name(method: Method, path: &str, versions: &[Version]) -> String {
    let mut name = format!("{}-{}", method, path);
    if !versions.is_empty() {
        let joined = versions
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("--");
        name.push('-');
        name.push_str(&joined);
    }
    sanitize_name(&name)
}

/// Short random suffix used to disambiguate auto-named collisions.
pub(crate) fn name_suffix() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..7].to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_literal_pattern() {
        let pattern = PathPattern::compile("/widgets", None);
        assert!(pattern.captures("/widgets").is_some());
        assert!(pattern.captures("/widgets/42").is_none());
        assert!(pattern.captures("/widget").is_none());
    }

    #[test]
    fn test_templated_pattern() {
        let pattern = PathPattern::compile("/widgets/:id/parts/:part", None);
        let params = pattern.captures("/widgets/42/parts/7").unwrap();
        assert_eq!(params.get("id"), Some(&"42".to_string()));
        assert_eq!(params.get("part"), Some(&"7".to_string()));
        assert!(pattern.captures("/widgets/42").is_none());
        assert!(pattern.captures("/gadgets/42/parts/7").is_none());
    }

    #[test]
    fn test_regex_pattern_full_match_only() {
        let pattern = PathPattern::compile("", Some(Regex::new(r"/files/(?P<name>\w+)").unwrap()));
        let params = pattern.captures("/files/report").unwrap();
        assert_eq!(params.get("name"), Some(&"report".to_string()));
        // partial matches do not count
        assert!(pattern.captures("/files/report.txt").is_none());
    }

    #[test]
    fn test_derive_name() {
        let name = derive_name(Method::GET, "/widgets/:id", &[]);
        assert_eq!(name, "getwidgetsid");
        let versioned = derive_name(
            Method::GET,
            "/widgets",
            &[Version::new(1, 2, 3), Version::new(2, 0, 0)],
        );
        assert_eq!(versioned, "getwidgets123200");
    }

    #[test]
    fn test_method_parse_normalizes_case() {
        assert_eq!("delete".parse::<Method>().unwrap(), Method::DELETE);
        assert!("brew".parse::<Method>().is_err());
    }
}
