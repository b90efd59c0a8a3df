use crate::error::RouteError;
use crate::mark::Mark;
use crate::route::Route;
use crate::tree::{MarkedRoute, RoutingTree};

use std::collections::{BTreeMap, BTreeSet};
use std::convert::TryFrom;

use hyper::Method;
use serde::{Deserialize, Serialize, Serializer};

/// The canonical set of registered routes.
///
/// Static routes are kept in a `method -> uri -> route` map under both the
/// trailing-slash and the bare form of their URI. Dynamic routes are marked
/// by the [`RoutingTree`] and indexed by their mark.
///
/// A `RouteConfig` serializes to exactly three maps (static routes, dynamic
/// routes and the combined pattern of every method); deserializing rebuilds
/// the tree and rejects maps that do not agree with each other.
/// ```rust
/// use routemark::{Route, RouteConfig};
/// use hyper::Method;
///
/// let mut config = RouteConfig::new();
/// config.add_route(Route::new(Method::GET, "/posts", "posts.index").unwrap()).unwrap();
/// config.add_route(Route::new(Method::GET, "/posts/{id}", "posts.show").unwrap()).unwrap();
///
/// assert!(config.static_route(&Method::GET, "/posts/").is_some());
/// assert_eq!(
///     config.regex_for_method(&Method::GET),
///     "^(?:(?P<a>/posts/([^/]+)))/?$"
/// );
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "PersistedRoutes")]
pub struct RouteConfig {
    static_routes: BTreeMap<String, BTreeMap<String, Route>>,
    dynamic_routes: BTreeMap<String, BTreeMap<Mark, Route>>,
    tree: RoutingTree,
}

impl RouteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A config accepting at most `limit` dynamic routes per method.
    pub fn with_mark_limit(limit: usize) -> Self {
        RouteConfig {
            tree: RoutingTree::with_limit(limit),
            ..Self::default()
        }
    }

    pub(crate) fn set_mark_limit(&mut self, limit: usize) {
        self.tree.set_limit(limit);
    }

    /// Registers a route. A static route replaces an earlier one for the same
    /// method and URI.
    pub fn add_route(&mut self, route: Route) -> Result<&mut Self, RouteError> {
        if route.is_dynamic() {
            let MarkedRoute { mark, route } = self.tree.add(route)?.clone();

            tracing::debug!(
                method = %route.method(),
                uri = route.uri(),
                mark = %mark,
                "registered dynamic route"
            );

            self.dynamic_routes
                .entry(route.method().as_str().to_owned())
                .or_default()
                .insert(mark, route);
        } else {
            let uri = route.uri().trim_end_matches('/').to_owned();

            tracing::debug!(method = %route.method(), uri = route.uri(), "registered static route");

            let routes = self
                .static_routes
                .entry(route.method().as_str().to_owned())
                .or_default();
            routes.insert(format!("{}/", uri), route.clone());
            routes.insert(uri, route);
        }

        Ok(self)
    }

    /// Exact lookup of a static route.
    pub fn static_route(&self, method: &Method, uri: &str) -> Option<&Route> {
        self.static_routes.get(method.as_str())?.get(uri)
    }

    pub fn dynamic_route(&self, method: &Method, mark: &Mark) -> Option<&Route> {
        self.dynamic_routes.get(method.as_str())?.get(mark)
    }

    /// The dynamic routes of `method` keyed by mark, in registration order.
    pub fn dynamic_routes(&self, method: &Method) -> Option<&BTreeMap<Mark, Route>> {
        self.dynamic_routes.get(method.as_str())
    }

    pub(crate) fn static_route_by_name(&self, method: &str, uri: &str) -> Option<&Route> {
        self.static_routes.get(method)?.get(uri)
    }

    pub(crate) fn dynamic_routes_by_name(&self, method: &str) -> Option<&BTreeMap<Mark, Route>> {
        self.dynamic_routes.get(method)
    }

    pub fn regex_for_method(&self, method: &Method) -> &str {
        self.tree.regex_for_method(method)
    }

    /// The combined pattern of every method with dynamic routes.
    pub fn matching_regexes(&self) -> &BTreeMap<String, String> {
        self.tree.patterns()
    }

    pub fn tree(&self) -> &RoutingTree {
        &self.tree
    }

    /// Names of all methods with at least one route.
    pub fn methods(&self) -> BTreeSet<&str> {
        self.static_routes
            .keys()
            .chain(self.dynamic_routes.keys())
            .map(String::as_str)
            .collect()
    }

    /// Every stored route. Static routes appear once per stored URI form.
    pub fn routes(&self) -> impl Iterator<Item = &Route> + '_ {
        self.static_routes
            .values()
            .flat_map(BTreeMap::values)
            .chain(self.dynamic_routes.values().flat_map(BTreeMap::values))
    }

    /// Number of registered (method, uri) endpoints.
    pub fn len(&self) -> usize {
        let statics: usize = self.static_routes.values().map(BTreeMap::len).sum();
        statics / 2 + self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.static_routes.is_empty() && self.dynamic_routes.is_empty()
    }
}

#[derive(Serialize)]
struct PersistedRoutesRef<'a> {
    static_routes: &'a BTreeMap<String, BTreeMap<String, Route>>,
    dynamic_routes: &'a BTreeMap<String, BTreeMap<Mark, Route>>,
    matching_regexes: &'a BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct PersistedRoutes {
    static_routes: BTreeMap<String, BTreeMap<String, Route>>,
    dynamic_routes: BTreeMap<String, BTreeMap<Mark, Route>>,
    matching_regexes: BTreeMap<String, String>,
}

impl Serialize for RouteConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PersistedRoutesRef {
            static_routes: &self.static_routes,
            dynamic_routes: &self.dynamic_routes,
            matching_regexes: self.tree.patterns(),
        }
        .serialize(serializer)
    }
}

impl TryFrom<PersistedRoutes> for RouteConfig {
    type Error = RouteError;

    fn try_from(persisted: PersistedRoutes) -> Result<Self, Self::Error> {
        for (method, routes) in &persisted.static_routes {
            for (uri, route) in routes {
                if route.is_dynamic() || route.method().as_str() != method.as_str() {
                    return Err(RouteError::Inconsistent(format!(
                        "{} {} is not a static {} route",
                        route.method(),
                        route.uri(),
                        method
                    )));
                }

                let bare = route.uri().trim_end_matches('/');
                let twin = if uri.as_str() == bare {
                    format!("{}/", bare)
                } else if *uri == format!("{}/", bare) {
                    bare.to_owned()
                } else {
                    return Err(RouteError::Inconsistent(format!(
                        "static route {} is stored under '{}'",
                        route.uri(),
                        uri
                    )));
                };

                if routes.get(&twin) != Some(route) {
                    return Err(RouteError::Inconsistent(format!(
                        "static route {} {} is missing its '{}' form",
                        method,
                        route.uri(),
                        twin
                    )));
                }
            }
        }

        let tree = RoutingTree::restore(&persisted.dynamic_routes, &persisted.matching_regexes)?;

        Ok(RouteConfig {
            static_routes: persisted.static_routes,
            dynamic_routes: persisted.dynamic_routes,
            tree,
        })
    }
}
