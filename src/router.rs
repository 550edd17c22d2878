//! Route table and request matching.
//!
//! `find` is a pure function of the table and the request descriptor: the
//! table is written only during setup, so matching needs no locks and no
//! per-call state.
use std::collections::HashMap;

use log::debug;
use semver::{Version, VersionReq};

use crate::errors::{HttpError, MountError};
use crate::request::Request;
use crate::route::{derive_name, name_suffix, sanitize_name, Method, PathPattern, RouteOptions, RouteSpec};

struct Route {
    spec: RouteSpec,
    pattern: PathPattern,
}

/// A successful match: the route, params extracted from the path, and the
/// declared version chosen for the request (None for unversioned routes).
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub spec: &'a RouteSpec,
    pub params: HashMap<String, String>,
    pub version: Option<Version>,
}

#[derive(Debug)]
pub enum Found<'a> {
    Match(RouteMatch<'a>),
    /// `OPTIONS *` preflight, answered without touching any chain.
    Preflight,
}

/// The version constraint a client sent: a wildcard, one exact version,
/// or one or more ranges (whitespace-separated ranges match any-of).
enum VersionSpec {
    Any,
    Exact(Version),
    Ranges(Vec<VersionReq>),
}

impl VersionSpec {
    fn parse(header: &str) -> Result<Self, HttpError> {
        let header = header.trim();
        if header.is_empty() || header == "*" {
            return Ok(Self::Any);
        }
        if let Ok(v) = Version::parse(header) {
            return Ok(Self::Exact(v));
        }
        if let Ok(req) = VersionReq::parse(header) {
            return Ok(Self::Ranges(vec![req]));
        }
        let mut ranges = vec![];
        for part in header.split_whitespace() {
            match VersionReq::parse(part) {
                Ok(req) => ranges.push(req),
                Err(_) => {
                    return Err(HttpError::InvalidVersion(format!(
                        "'{}' is not a valid version range",
                        header
                    )))
                }
            }
        }
        Ok(Self::Ranges(ranges))
    }

    fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(v) => v == version,
            Self::Ranges(ranges) => ranges.iter().any(|r| r.matches(version)),
        }
    }
}

/// The route table. Routes are mounted during setup and immutable
/// afterwards; lookups scan in registration order so the first-registered
/// route wins on overlapping patterns.
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: vec![] }
    }

    /// Register a route. Explicit names are normalized and must be unique;
    /// derived names disambiguate collisions with a random suffix.
    pub fn mount(&mut self, method: Method, opts: RouteOptions) -> Result<RouteSpec, MountError> {
        let RouteOptions {
            path,
            regex,
            name,
            versions,
        } = opts;
        let name = match name {
            Some(name) => {
                let name = sanitize_name(&name);
                if self.contains(&name) {
                    return Err(MountError::DuplicateRouteName(name));
                }
                name
            }
            None => {
                let mut name = derive_name(method, &path, &versions);
                if self.contains(&name) {
                    name.push_str(&name_suffix());
                }
                name
            }
        };
        let pattern = PathPattern::compile(&path, regex);
        let spec = RouteSpec {
            name: name.clone(),
            method,
            path,
            versions,
        };
        debug!("mounted {} {} as '{}'", spec.method, spec.path, name);
        self.routes.push(Route {
            spec: spec.clone(),
            pattern,
        });
        Ok(spec)
    }

    /// Remove a route by name. Returns whether anything was removed.
    pub fn unmount(&mut self, name: &str) -> bool {
        let before = self.routes.len();
        self.routes.retain(|r| r.spec.name != name);
        self.routes.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routes.iter().any(|r| r.spec.name == name)
    }

    /// Match a request against the table.
    ///
    /// 1. Scan for routes whose pattern matches the path; of those with
    ///    the right method, keep the ones satisfying the requested version
    ///    range and pick the highest satisfying declared version (ties go
    ///    to the first-registered route).
    /// 2. Path matched but never with this method: BadMethod, carrying the
    ///    allowed methods. Path and method matched but no version did:
    ///    InvalidVersion. Nothing matched the path: ResourceNotFound.
    /// 3. `OPTIONS *` short-circuits to a preflight success.
    pub fn find<'a>(&'a self, req: &Request) -> Result<Found<'a>, HttpError> {
        if req.method == Method::OPTIONS && req.path == "*" {
            return Ok(Found::Preflight);
        }
        let requested = VersionSpec::parse(req.version_header())?;
        let mut allowed: Vec<Method> = vec![];
        let mut path_matched = false;
        let mut version_mismatch = false;
        let mut best: Option<(usize, HashMap<String, String>, Option<Version>)> = None;
        for (idx, route) in self.routes.iter().enumerate() {
            let params = match route.pattern.captures(&req.path) {
                Some(params) => params,
                None => continue,
            };
            path_matched = true;
            if route.spec.method != req.method {
                if !allowed.contains(&route.spec.method) {
                    allowed.push(route.spec.method);
                }
                continue;
            }
            let chosen = if requested.is_any() {
                route.spec.versions.iter().max().cloned()
            } else {
                match route
                    .spec
                    .versions
                    .iter()
                    .filter(|v| requested.matches(v))
                    .max()
                    .cloned()
                {
                    Some(v) => Some(v),
                    None if route.spec.versions.is_empty() => None,
                    None => {
                        version_mismatch = true;
                        continue;
                    }
                }
            };
            let replace = match &best {
                None => true,
                Some((_, _, best_version)) => match (&chosen, best_version) {
                    (Some(candidate), Some(current)) => candidate > current,
                    (Some(_), None) => true,
                    _ => false,
                },
            };
            if replace {
                best = Some((idx, params, chosen));
            }
        }
        if let Some((idx, params, version)) = best {
            return Ok(Found::Match(RouteMatch {
                spec: &self.routes[idx].spec,
                params,
                version,
            }));
        }
        if version_mismatch {
            return Err(HttpError::InvalidVersion(format!(
                "{} is not supported by {} {}",
                req.version_header(),
                req.method,
                req.path
            )));
        }
        if path_matched {
            return Err(HttpError::BadMethod {
                method: req.method,
                path: req.path.clone(),
                allowed,
            });
        }
        Err(HttpError::ResourceNotFound(req.path.clone()))
    }

    /// Resolve a chain redirect target by route name. Params come from
    /// re-matching the route's pattern against the current path, and the
    /// request's version constraint still applies.
    pub fn find_by_name<'a>(
        &'a self,
        name: &str,
        req: &Request,
    ) -> Result<RouteMatch<'a>, HttpError> {
        let route = self
            .routes
            .iter()
            .find(|r| r.spec.name == name)
            .ok_or_else(|| HttpError::ResourceNotFound(name.to_string()))?;
        let requested = VersionSpec::parse(req.version_header())?;
        let version = if requested.is_any() {
            route.spec.versions.iter().max().cloned()
        } else {
            match route
                .spec
                .versions
                .iter()
                .filter(|v| requested.matches(v))
                .max()
                .cloned()
            {
                Some(v) => Some(v),
                None if route.spec.versions.is_empty() => None,
                None => {
                    return Err(HttpError::InvalidVersion(format!(
                        "{} is not supported by route '{}'",
                        req.version_header(),
                        name
                    )))
                }
            }
        };
        let params = route.pattern.captures(&req.path).unwrap_or_default();
        Ok(RouteMatch {
            spec: &route.spec,
            params,
            version,
        })
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Highest of `versions` satisfying a version header, None when nothing
/// does or the header does not parse.
pub(crate) fn max_satisfying(versions: &[Version], header: &str) -> Option<Version> {
    let requested = VersionSpec::parse(header).ok()?;
    versions
        .iter()
        .filter(|v| requested.matches(v))
        .max()
        .cloned()
}

#[cfg(test)]
mod test {
    use super::*;

    fn req(method: Method, path: &str) -> Request {
        Request::new(method, path)
    }

    fn mount(router: &mut Router, method: Method, opts: RouteOptions) -> RouteSpec {
        router.mount(method, opts).unwrap()
    }

    #[test]
    fn test_first_registered_wins_on_overlap() {
        let mut router = Router::new();
        let first = mount(&mut router, Method::GET, RouteOptions::new("/widgets/:id"));
        mount(
            &mut router,
            Method::GET,
            RouteOptions::new("/widgets/:anything"),
        );
        match router.find(&req(Method::GET, "/widgets/42")).unwrap() {
            Found::Match(m) => assert_eq!(m.spec.name, first.name),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn test_find_is_idempotent() {
        let mut router = Router::new();
        mount(&mut router, Method::GET, RouteOptions::new("/widgets/:id"));
        let request = req(Method::GET, "/widgets/42");
        for _ in 0..3 {
            match router.find(&request).unwrap() {
                Found::Match(m) => {
                    assert_eq!(m.params.get("id"), Some(&"42".to_string()));
                }
                _ => panic!("expected a match"),
            }
        }
    }

    #[test]
    fn test_no_path_match_is_not_found() {
        let mut router = Router::new();
        mount(&mut router, Method::GET, RouteOptions::new("/widgets"));
        let err = router.find(&req(Method::GET, "/nope")).unwrap_err();
        assert!(matches!(err, HttpError::ResourceNotFound(_)));
    }

    #[test]
    fn test_wrong_method_reports_allowed() {
        let mut router = Router::new();
        mount(&mut router, Method::GET, RouteOptions::new("/widgets/:id"));
        mount(&mut router, Method::PUT, RouteOptions::new("/widgets/:id"));
        let err = router.find(&req(Method::DELETE, "/widgets/42")).unwrap_err();
        match err {
            HttpError::BadMethod { allowed, .. } => {
                assert_eq!(allowed, vec![Method::GET, Method::PUT]);
            }
            other => panic!("expected BadMethod, got {:?}", other),
        }
    }

    #[test]
    fn test_version_picks_highest_satisfying() {
        let mut router = Router::new();
        mount(
            &mut router,
            Method::GET,
            RouteOptions::new("/widgets").versions(vec![
                Version::new(1, 1, 0),
                Version::new(1, 4, 2),
                Version::new(2, 0, 0),
            ]),
        );
        let request = req(Method::GET, "/widgets").with_header("accept-version", "^1.0");
        match router.find(&request).unwrap() {
            Found::Match(m) => assert_eq!(m.version, Some(Version::new(1, 4, 2))),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn test_wildcard_takes_highest_declared() {
        let mut router = Router::new();
        mount(
            &mut router,
            Method::GET,
            RouteOptions::new("/widgets")
                .versions(vec![Version::new(1, 0, 0), Version::new(3, 1, 0)]),
        );
        match router.find(&req(Method::GET, "/widgets")).unwrap() {
            Found::Match(m) => assert_eq!(m.version, Some(Version::new(3, 1, 0))),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn test_unsatisfied_version_is_invalid_version() {
        let mut router = Router::new();
        mount(
            &mut router,
            Method::GET,
            RouteOptions::new("/widgets").version(Version::new(1, 0, 0)),
        );
        let request = req(Method::GET, "/widgets").with_header("accept-version", "^2.0");
        let err = router.find(&request).unwrap_err();
        assert!(matches!(err, HttpError::InvalidVersion(_)));
    }

    #[test]
    fn test_unversioned_route_matches_any_version() {
        let mut router = Router::new();
        mount(&mut router, Method::GET, RouteOptions::new("/widgets"));
        let request = req(Method::GET, "/widgets").with_header("accept-version", "^9.9");
        assert!(router.find(&request).is_ok());
    }

    #[test]
    fn test_preflight_bypasses_table() {
        let router = Router::new();
        match router.find(&req(Method::OPTIONS, "*")).unwrap() {
            Found::Preflight => (),
            _ => panic!("expected preflight"),
        }
    }

    #[test]
    fn test_duplicate_explicit_name_rejected() {
        let mut router = Router::new();
        mount(
            &mut router,
            Method::GET,
            RouteOptions::new("/a").name("thing"),
        );
        let err = router
            .mount(Method::GET, RouteOptions::new("/b").name("thing"))
            .unwrap_err();
        assert!(matches!(err, MountError::DuplicateRouteName(_)));
    }

    #[test]
    fn test_derived_name_collision_gets_suffix() {
        let mut router = Router::new();
        let first = mount(&mut router, Method::GET, RouteOptions::new("/widgets"));
        let second = mount(&mut router, Method::GET, RouteOptions::new("/widgets"));
        assert_ne!(first.name, second.name);
        assert!(second.name.starts_with(&first.name));
    }

    #[test]
    fn test_unmount() {
        let mut router = Router::new();
        let spec = mount(&mut router, Method::GET, RouteOptions::new("/widgets"));
        assert!(router.unmount(&spec.name));
        assert!(!router.unmount(&spec.name));
        let err = router.find(&req(Method::GET, "/widgets")).unwrap_err();
        assert!(matches!(err, HttpError::ResourceNotFound(_)));
    }
}
