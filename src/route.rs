use crate::error::CompileError;
use crate::pattern;

use std::fmt;

use hyper::Method;
use serde::{Deserialize, Serialize};

/// Identifies the handler a route dispatches to.
///
/// The id is opaque to the routing core: it is stored with the route,
/// persisted with the route cache and handed back unchanged on a match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerId(String);

impl HandlerId {
    pub fn new(id: impl Into<String>) -> Self {
        HandlerId(id.into())
    }

    /// The id the router's builder shortcuts give a route, e.g. `GET /posts/{id}`.
    pub fn for_route(method: &Method, uri: &str) -> Self {
        HandlerId(format!("{} {}", method, uri))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HandlerId {
    fn from(id: &str) -> Self {
        HandlerId::new(id)
    }
}

impl From<String> for HandlerId {
    fn from(id: String) -> Self {
        HandlerId(id)
    }
}

/// One registered endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    #[serde(with = "method")]
    method: Method,
    uri: String,
    is_dynamic: bool,
    matching_pattern: Option<String>,
    parameter_names: Vec<String>,
    handler: HandlerId,
}

impl Route {
    /// Compiles `uri` and builds a route dispatching to `handler`.
    /// ```rust
    /// use routemark::Route;
    /// use hyper::Method;
    ///
    /// let route = Route::new(Method::GET, "/posts/{id}", "posts.show").unwrap();
    /// assert!(route.is_dynamic());
    /// assert_eq!(route.parameter_names(), ["id"]);
    /// ```
    pub fn new(
        method: Method,
        uri: impl Into<String>,
        handler: impl Into<HandlerId>,
    ) -> Result<Self, CompileError> {
        let uri = uri.into();
        let compiled = pattern::compile(&uri)?;
        let is_dynamic = compiled.is_dynamic();

        Ok(Route {
            method,
            uri,
            is_dynamic,
            matching_pattern: if is_dynamic {
                Some(compiled.pattern)
            } else {
                None
            },
            parameter_names: compiled.parameter_names,
            handler: handler.into(),
        })
    }

    /// Rebinds the route to another handler. Only meaningful before the
    /// route is registered.
    pub fn with_handler(mut self, handler: impl Into<HandlerId>) -> Self {
        self.handler = handler.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    /// The regex fragment matching this route, present iff the route is dynamic.
    pub fn matching_pattern(&self) -> Option<&str> {
        self.matching_pattern.as_deref()
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    pub fn handler(&self) -> &HandlerId {
        &self.handler
    }
}

/// The attribute set of [`Route`] as it is persisted; part of the route
/// cache fingerprint.
pub(crate) const ROUTE_ATTRIBUTES: &[&str] = &[
    "method",
    "uri",
    "is_dynamic",
    "matching_pattern",
    "parameter_names",
    "handler",
];

/// Serializes a `Method` by its name.
pub(crate) mod method {
    use hyper::Method;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(method: &Method, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Method, D::Error> {
        let name = String::deserialize(d)?;
        Method::from_bytes(name.as_bytes()).map_err(D::Error::custom)
    }
}
