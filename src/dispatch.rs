//! Resolves a method and path to a route.
//!
//! Resolution always tries the static map first and only then the method's
//! combined pattern:
//!
//! ```ignore
//!  GET  /posts          static
//!  GET  /posts/{id}     dynamic
//!
//!  GET  /posts          Static(/posts)
//!  GET  /posts/42       Dynamic(/posts/{id}, id="42")
//!  GET  /posts/42/      Dynamic(/posts/{id}, id="42")
//!  POST /posts/42       MethodNotAllowed(GET, OPTIONS)
//!  GET  /unknown        NotFound
//! ```
//!
//! Dynamic routes tolerate a trailing slash the same way static routes do.
use crate::config::RouteConfig;
use crate::error::RouteError;
use crate::mark::Mark;
use crate::params::Params;
use crate::route::Route;

use std::collections::HashMap;
use std::ops::Range;

use hyper::Method;
use regex::{Regex, RegexBuilder};

/// Default compiled size limit of one combined pattern.
pub const DEFAULT_REGEX_SIZE_LIMIT: usize = 10 * (1 << 20);

/// The outcome of resolving a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'r> {
    /// An exact static route matched.
    Static(&'r Route),
    /// A dynamic route matched, with its parameters bound in declaration order.
    Dynamic(&'r Route, Params),
    /// The path is routed, but only for other methods. Lists them, with `OPTIONS`.
    MethodNotAllowed(Vec<&'r str>),
    NotFound,
}

impl<'r> Resolution<'r> {
    /// The matched route, if any.
    pub fn route(&self) -> Option<&'r Route> {
        match *self {
            Resolution::Static(route) | Resolution::Dynamic(route, _) => Some(route),
            _ => None,
        }
    }
}

/// A [`RouteConfig`] with its combined patterns compiled.
///
/// The table is immutable; share it between threads behind an `Arc`.
/// ```rust
/// use routemark::{Resolution, Route, RouteConfig, RouteTable};
/// use hyper::Method;
///
/// let mut config = RouteConfig::new();
/// config.add_route(Route::new(Method::GET, "/posts/{id}", "posts.show").unwrap()).unwrap();
///
/// let table = RouteTable::new(config).unwrap();
/// match table.resolve(&Method::GET, "/posts/42") {
///     Resolution::Dynamic(route, params) => {
///         assert_eq!(route.handler().as_str(), "posts.show");
///         assert_eq!(params.get("id"), Some("42"));
///     }
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
#[derive(Debug)]
pub struct RouteTable {
    config: RouteConfig,
    matchers: HashMap<String, MethodMatcher>,
}

#[derive(Debug)]
struct MethodMatcher {
    regex: Regex,
    slots: Vec<MarkSlot>,
}

/// Where one marked alternative lives inside the compiled regex.
#[derive(Debug)]
struct MarkSlot {
    group: usize,
    mark: Mark,
    params: Range<usize>,
}

impl RouteTable {
    pub fn new(config: RouteConfig) -> Result<Self, RouteError> {
        Self::compile(config, DEFAULT_REGEX_SIZE_LIMIT)
    }

    /// Compiles the combined pattern of every method, failing if one exceeds
    /// `size_limit` bytes once compiled.
    pub fn compile(config: RouteConfig, size_limit: usize) -> Result<Self, RouteError> {
        let mut matchers = HashMap::new();

        for (method, pattern) in config.matching_regexes() {
            let routes = config.dynamic_routes_by_name(method).ok_or_else(|| {
                RouteError::Inconsistent(format!("no dynamic routes for {}", method))
            })?;

            let regex = RegexBuilder::new(pattern)
                .size_limit(size_limit)
                .build()
                .map_err(|source| match source {
                    regex::Error::CompiledTooBig(_) => RouteError::PatternTooLarge {
                        method: method.clone(),
                        routes: routes.len(),
                        size_limit,
                    },
                    source => RouteError::InvalidPattern {
                        method: method.clone(),
                        source,
                    },
                })?;

            let named: Vec<(usize, Mark)> = regex
                .capture_names()
                .enumerate()
                .filter_map(|(group, name)| Some((group, Mark::parse(name?)?)))
                .collect();

            if named.len() != routes.len() {
                return Err(RouteError::Inconsistent(format!(
                    "combined pattern for {} has {} marks for {} routes",
                    method,
                    named.len(),
                    routes.len()
                )));
            }

            let mut slots = Vec::with_capacity(named.len());
            for (i, (group, mark)) in named.iter().enumerate() {
                let end = named
                    .get(i + 1)
                    .map_or(regex.captures_len(), |(next, _)| *next);

                let route = routes.get(mark).ok_or_else(|| {
                    RouteError::Inconsistent(format!("mark '{}' has no route", mark))
                })?;

                if end - group - 1 != route.parameter_names().len() {
                    return Err(RouteError::Inconsistent(format!(
                        "{} {} captures {} values for {} parameters",
                        method,
                        route.uri(),
                        end - group - 1,
                        route.parameter_names().len()
                    )));
                }

                slots.push(MarkSlot {
                    group: *group,
                    mark: mark.clone(),
                    params: group + 1..end,
                });
            }

            matchers.insert(method.clone(), MethodMatcher { regex, slots });
        }

        tracing::info!(
            routes = config.len(),
            dynamic = config.tree().len(),
            methods = config.methods().len(),
            "compiled route table"
        );

        Ok(RouteTable { config, matchers })
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    pub fn into_config(self) -> RouteConfig {
        self.config
    }

    /// Resolves `path` for `method`.
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution<'_> {
        if let Some(route) = self.config.static_route(method, path) {
            tracing::trace!(%method, path, "static route hit");
            return Resolution::Static(route);
        }

        if let Some((route, params)) = self.match_dynamic(method, path) {
            tracing::trace!(%method, path, uri = route.uri(), "dynamic route hit");
            return Resolution::Dynamic(route, params);
        }

        let allowed = self.allowed(path);
        if allowed.is_empty() {
            tracing::trace!(%method, path, "no route");
            Resolution::NotFound
        } else {
            tracing::trace!(%method, path, ?allowed, "method not allowed");
            Resolution::MethodNotAllowed(allowed)
        }
    }

    /// Returns a list of the allowed methods for a specific path.
    ///
    /// `*` lists every method with a route. `OPTIONS` is appended whenever
    /// the list is not empty.
    pub fn allowed(&self, path: &str) -> Vec<&str> {
        let methods = self
            .config
            .methods()
            .into_iter()
            .filter(|&method| method != "OPTIONS");

        let mut allowed: Vec<&str> = match path {
            "*" => methods.collect(),
            _ => methods
                .filter(|&method| self.routes_path(method, path))
                .collect(),
        };

        if !allowed.is_empty() {
            allowed.push("OPTIONS");
        }

        allowed
    }

    fn routes_path(&self, method: &str, path: &str) -> bool {
        self.config.static_route_by_name(method, path).is_some()
            || self
                .matchers
                .get(method)
                .map_or(false, |matcher| matcher.regex.is_match(path))
    }

    fn match_dynamic(&self, method: &Method, path: &str) -> Option<(&Route, Params)> {
        let matcher = self.matchers.get(method.as_str())?;
        let captures = matcher.regex.captures(path)?;

        // linear in the method's routes, like walking the capture groups
        let slot = matcher
            .slots
            .iter()
            .find(|slot| captures.get(slot.group).is_some())?;
        let route = self.config.dynamic_route(method, &slot.mark)?;

        debug_assert_eq!(slot.params.len(), route.parameter_names().len());

        let params = route
            .parameter_names()
            .iter()
            .zip(slot.params.clone())
            .map(|(name, group)| {
                let value = captures.get(group).map_or("", |m| m.as_str());
                (name.as_str(), value)
            })
            .collect();

        Some((route, params))
    }
}
