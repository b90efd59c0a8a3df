//! Combines the dynamic routes of each method into one pattern.
//!
//! Every route's fragment becomes one alternative of the method's combined
//! pattern, wrapped in a group named after the route's mark:
//!
//! ```ignore
//!  /posts/{id}                  -> (?P<a>/posts/([^/]+))
//!  /posts/{id}/comments/{c}     -> (?P<b>/posts/([^/]+)/comments/([^/]+))
//!
//!  GET: ^(?:(?P<a>/posts/([^/]+))|(?P<b>/posts/([^/]+)/comments/([^/]+)))/?$
//! ```
//!
//! After a single match, the named group that participated tells which
//! route fired, standing in for PCRE's `(*MARK:name)`.
use crate::error::RouteError;
use crate::mark::Mark;
use crate::route::Route;

use std::collections::{BTreeMap, HashSet};

use hyper::Method;

/// A pattern that matches nothing, returned for methods without dynamic routes.
pub const NEVER_MATCHES: &str = r"[^\s\S]";

/// Default maximum number of dynamic routes per method.
pub const DEFAULT_MARK_LIMIT: usize = 1024;

const PREFIX: &str = "^(?:";
const SUFFIX: &str = ")/?$";

/// A dynamic route and the mark of its alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedRoute {
    pub mark: Mark,
    pub route: Route,
}

#[derive(Debug, Clone)]
pub struct RoutingTree {
    routes: BTreeMap<String, Vec<MarkedRoute>>,
    patterns: BTreeMap<String, String>,
    next_mark: Mark,
    limit: usize,
}

impl RoutingTree {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MARK_LIMIT)
    }

    /// A tree accepting at most `limit` dynamic routes per method.
    pub fn with_limit(limit: usize) -> Self {
        RoutingTree {
            routes: BTreeMap::new(),
            patterns: BTreeMap::new(),
            next_mark: Mark::first(),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub(crate) fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Marks `route` and appends it to its method's combined pattern.
    ///
    /// A route for a method and URI that is already marked replaces the
    /// earlier route under the same mark.
    pub fn add(&mut self, route: Route) -> Result<&MarkedRoute, RouteError> {
        let method = route.method().as_str().to_owned();
        let alternative = alternative_for(&self.next_mark, &route)?;

        let uri = route.uri().trim_end_matches('/');
        let existing = self.routes.get(&method).and_then(|routes| {
            routes
                .iter()
                .position(|marked| marked.route.uri().trim_end_matches('/') == uri)
        });

        if let Some(i) = existing {
            let routes = self.routes.entry(method).or_default();
            tracing::trace!(mark = %routes[i].mark, uri = route.uri(), "replaced marked route");
            routes[i].route = route;
            return Ok(&routes[i]);
        }

        let count = self.routes.get(&method).map_or(0, Vec::len);
        if count >= self.limit {
            return Err(RouteError::CapacityExceeded {
                method,
                routes: count + 1,
                limit: self.limit,
            });
        }

        let mark = self.next_mark.clone();
        self.next_mark = mark.next();

        match self.patterns.get_mut(&method) {
            Some(pattern) => {
                // new alternatives go into the outer group, in front of the suffix
                let at = pattern.len() - SUFFIX.len();
                pattern.insert_str(at, &format!("|{}", alternative));
            }
            None => {
                self.patterns
                    .insert(method.clone(), format!("{}{}{}", PREFIX, alternative, SUFFIX));
            }
        }

        tracing::trace!(method = %method, mark = %mark, uri = route.uri(), "marked route");

        let routes = self.routes.entry(method).or_default();
        routes.push(MarkedRoute { mark, route });
        Ok(&routes[routes.len() - 1])
    }

    /// The combined pattern for `method`, or [`NEVER_MATCHES`].
    pub fn regex_for_method(&self, method: &Method) -> &str {
        self.patterns
            .get(method.as_str())
            .map_or(NEVER_MATCHES, String::as_str)
    }

    /// The marked routes of `method` in registration order.
    pub fn routes_for_method(&self, method: &Method) -> &[MarkedRoute] {
        self.routes
            .get(method.as_str())
            .map_or(&[][..], Vec::as_slice)
    }

    pub fn patterns(&self) -> &BTreeMap<String, String> {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Rebuilds a tree from persisted dynamic routes and combined patterns.
    ///
    /// Routes are replayed in mark order and the resulting patterns must
    /// equal the persisted ones byte for byte.
    pub fn restore(
        dynamic_routes: &BTreeMap<String, BTreeMap<Mark, Route>>,
        patterns: &BTreeMap<String, String>,
    ) -> Result<Self, RouteError> {
        let mut tree = RoutingTree::new();
        let mut seen = HashSet::new();

        for (method, routes) in dynamic_routes {
            let mut marked = Vec::with_capacity(routes.len());
            let mut pattern = String::from(PREFIX);

            for (i, (mark, route)) in routes.iter().enumerate() {
                if route.method().as_str() != method.as_str() {
                    return Err(RouteError::Inconsistent(format!(
                        "route {} {} is filed under {}",
                        route.method(),
                        route.uri(),
                        method
                    )));
                }

                if !seen.insert(mark.clone()) {
                    return Err(RouteError::Inconsistent(format!(
                        "mark '{}' is used more than once",
                        mark
                    )));
                }

                if i > 0 {
                    pattern.push('|');
                }
                pattern.push_str(&alternative_for(mark, route)?);
                marked.push(MarkedRoute {
                    mark: mark.clone(),
                    route: route.clone(),
                });
            }
            pattern.push_str(SUFFIX);

            if marked.is_empty() {
                continue;
            }

            match patterns.get(method) {
                Some(persisted) if *persisted == pattern => {}
                Some(_) => {
                    return Err(RouteError::Inconsistent(format!(
                        "combined pattern for {} does not match its routes",
                        method
                    )))
                }
                None => {
                    return Err(RouteError::Inconsistent(format!(
                        "no combined pattern for {}",
                        method
                    )))
                }
            }

            tree.patterns.insert(method.clone(), pattern);
            tree.routes.insert(method.clone(), marked);
        }

        if let Some(method) = patterns.keys().find(|m| !tree.patterns.contains_key(*m)) {
            return Err(RouteError::Inconsistent(format!(
                "combined pattern for {} has no routes",
                method
            )));
        }

        if let Some(last) = seen.iter().max() {
            tree.next_mark = last.next();
        }

        Ok(tree)
    }
}

impl Default for RoutingTree {
    fn default() -> Self {
        RoutingTree::new()
    }
}

fn alternative_for(mark: &Mark, route: &Route) -> Result<String, RouteError> {
    let fragment = route.matching_pattern().ok_or_else(|| {
        RouteError::Inconsistent(format!(
            "static route {} {} cannot be marked",
            route.method(),
            route.uri()
        ))
    })?;

    Ok(format!("(?P<{}>{})", mark, fragment))
}
