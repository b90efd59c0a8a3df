//! [`Router`](crate::Router) dispatches hyper requests to handlers through a
//! compiled [`RouteTable`](crate::RouteTable).
//!
//! Routes are declared on a [`RouterBuilder`] during startup. Building the
//! router compiles every method's combined pattern once; after that the
//! router is immutable and can serve any number of concurrent requests.
//!
//! ```rust,no_run
//! use routemark::{Router, Params};
//! use hyper::{Request, Response, Body, Error};
//!
//! async fn index(_: Request<Body>) -> Result<Response<Body>, Error> {
//!     Ok(Response::new("Hello, World!".into()))
//! }
//!
//! async fn hello(req: Request<Body>) -> Result<Response<Body>, Error> {
//!     let params = req.extensions().get::<Params>().unwrap();
//!     Ok(Response::new(format!("Hello, {}", params.get("user").unwrap()).into()))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::builder()
//!         .get("/", index)
//!         .get("/hello/{user}", hello)
//!         .build()
//!         .unwrap();
//!
//!     hyper::Server::bind(&([127, 0, 0, 1], 3000).into())
//!         .serve(router.into_service())
//!         .await;
//! }
//!```
//!
//! Named parameters match anything until the next '/' or the path end. A
//! trailing slash on the request is ignored:
//! ```ignore
//!  Path: /blog/{category}/{post}
//!
//!  Requests:
//!   /blog/rust/request-routers            match: category="rust", post="request-routers"
//!   /blog/rust/request-routers/           match: category="rust", post="request-routers"
//!   /blog/rust/                           no match
//!   /blog/rust/request-routers/comments   no match
//! ```
//!
//! A parameter can carry its own pattern:
//! ```ignore
//!  Path: /posts/{id:\d+}
//!
//!  Requests:
//!   /posts/42                             match: id="42"
//!   /posts/latest                         no match
//! ```
//!
//! Static paths take precedence over parameters, so `/user/new` and
//! `/user/{user}` may be registered side by side. Among dynamic routes of
//! one method, the first registered route that matches wins. Registering
//! the same method and path again replaces the earlier route.
//!
//! The value of parameters is saved as [`Params`], a list of key/value pairs.
//! There are two ways to retrieve the value of a parameter:
//!  1) by the name of the parameter
//! ```ignore
//!  let user = params.get("user") // defined by {user}
//! ```
//!  2) by the index of the parameter. This way you can also get the name (key)
//! ```rust
//!  # use routemark::Params;
//!  # let params: Params = vec![("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
//!  let third_key = &params[2].key;   // the name of the 3rd parameter
//!  let third_value = &params[2].value; // the value of the 3rd parameter
//! ```
use crate::config::RouteConfig;
use crate::dispatch::{Resolution, RouteTable, DEFAULT_REGEX_SIZE_LIMIT};
use crate::error::RouteError;
use crate::params::Params;
use crate::path::clean;
use crate::route::{HandlerId, Route};
use crate::tree::DEFAULT_MARK_LIMIT;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{future, ready};
use hyper::header::{self, HeaderName, HeaderValue};
use hyper::service::Service;
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Deserialize;

/// Router behavior that is not expressed by the routes themselves.
///
/// Deserializes from any serde format; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouterOptions {
    /// Redirect to the cleaned path (`/../a//b` to `/a/b`) when only that resolves.
    pub redirect_fixed_path: bool,
    /// Answer 405 with an `Allow` header when another method routes the path.
    pub handle_method_not_allowed: bool,
    /// Answer `OPTIONS` requests automatically.
    pub handle_options: bool,
    /// Maximum number of dynamic routes per method.
    pub max_dynamic_routes: usize,
    /// Compiled size limit of one method's combined pattern, in bytes.
    pub regex_size_limit: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        RouterOptions {
            redirect_fixed_path: true,
            handle_method_not_allowed: true,
            handle_options: true,
            max_dynamic_routes: DEFAULT_MARK_LIMIT,
            regex_size_limit: DEFAULT_REGEX_SIZE_LIMIT,
        }
    }
}

/// Declares routes and handlers, then builds a [`Router`].
pub struct RouterBuilder {
    config: RouteConfig,
    handlers: HashMap<HandlerId, Box<dyn Handler>>,
    options: RouterOptions,
    global_options: Option<Box<dyn Handler>>,
    not_found: Option<Box<dyn Handler>>,
    method_not_allowed: Option<Box<dyn Handler>>,
}

impl RouterBuilder {
    /// Insert a handler into the router for a specific path at the specified method.
    /// The handler is registered under the id `"<METHOD> <path>"`.
    /// ```rust
    /// use routemark::Router;
    /// use hyper::{Response, Body, Method};
    ///
    /// let router = Router::builder()
    ///     .handle("/teapot", Method::GET, |_| async {
    ///         Ok(Response::new(Body::from("I am a teapot!")))
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route template or the method already
    /// holds the maximum number of dynamic routes. Use
    /// [`try_handle`](RouterBuilder::try_handle) to get the error instead.
    pub fn handle(self, path: &str, method: Method, handler: impl Handler + 'static) -> Self {
        match self.try_handle(path, method, handler) {
            Ok(builder) => builder,
            Err(err) => panic!("cannot register route: {}", err),
        }
    }

    /// Like [`handle`](RouterBuilder::handle), returning registration errors.
    pub fn try_handle(
        self,
        path: &str,
        method: Method,
        handler: impl Handler + 'static,
    ) -> Result<Self, RouteError> {
        let id = HandlerId::for_route(&method, path);
        let route = Route::new(method, path, id)?;
        self.route(route, handler)
    }

    /// Registers a compiled route together with the handler for its id.
    pub fn route(mut self, route: Route, handler: impl Handler + 'static) -> Result<Self, RouteError> {
        let id = route.handler().clone();
        self.config.add_route(route)?;
        self.handlers.insert(id, Box::new(handler));
        Ok(self)
    }

    /// Binds a handler to an id used by routes of a supplied [`RouteConfig`].
    pub fn bind(mut self, id: impl Into<HandlerId>, handler: impl Handler + 'static) -> Self {
        self.handlers.insert(id.into(), Box::new(handler));
        self
    }

    /// Replaces the declared routes with `config`, typically one loaded from a
    /// [`RouteCache`](crate::RouteCache). Handlers are bound with
    /// [`bind`](RouterBuilder::bind).
    pub fn with_config(mut self, config: RouteConfig) -> Self {
        self.config = config;
        self.config.set_mark_limit(self.options.max_dynamic_routes);
        self
    }

    /// Register a handler for `GET` requests
    pub fn get(self, path: &str, handler: impl Handler + 'static) -> Self {
        self.handle(path, Method::GET, handler)
    }

    /// Register a handler for `HEAD` requests
    pub fn head(self, path: &str, handler: impl Handler + 'static) -> Self {
        self.handle(path, Method::HEAD, handler)
    }

    /// Register a handler for `OPTIONS` requests
    pub fn options(self, path: &str, handler: impl Handler + 'static) -> Self {
        self.handle(path, Method::OPTIONS, handler)
    }

    /// Register a handler for `POST` requests
    pub fn post(self, path: &str, handler: impl Handler + 'static) -> Self {
        self.handle(path, Method::POST, handler)
    }

    /// Register a handler for `PUT` requests
    pub fn put(self, path: &str, handler: impl Handler + 'static) -> Self {
        self.handle(path, Method::PUT, handler)
    }

    /// Register a handler for `PATCH` requests
    pub fn patch(self, path: &str, handler: impl Handler + 'static) -> Self {
        self.handle(path, Method::PATCH, handler)
    }

    /// Register a handler for `DELETE` requests
    pub fn delete(self, path: &str, handler: impl Handler + 'static) -> Self {
        self.handle(path, Method::DELETE, handler)
    }

    /// Replaces all options at once. Set options before declaring routes:
    /// the dynamic route limit applies to routes added afterwards.
    pub fn with_options(mut self, options: RouterOptions) -> Self {
        self.config.set_mark_limit(options.max_dynamic_routes);
        self.options = options;
        self
    }

    /// If enabled, the router tries to fix the current request path, if no
    /// handle is registered for it.
    /// Superfluous path elements like `../` or `//` are removed.
    /// If a handle can be found for the cleaned path, the router makes a
    /// redirection to it with status code 301 for `GET` requests and 308 for
    /// all other request methods.
    /// For example `/..//foo` could be redirected to `/foo`.
    pub fn redirect_fixed_path(mut self, enabled: bool) -> Self {
        self.options.redirect_fixed_path = enabled;
        self
    }

    /// If enabled, the router checks if another method is allowed for the
    /// current route, if the current request can not be routed.
    /// If this is the case, the request is answered with `MethodNotAllowed`
    /// and HTTP status code 405.
    /// If no other Method is allowed, the request is delegated to the `NotFound`
    /// handler.
    pub fn handle_method_not_allowed(mut self, enabled: bool) -> Self {
        self.options.handle_method_not_allowed = enabled;
        self
    }

    /// If enabled, the router automatically replies to `OPTIONS` requests.
    /// Custom `OPTIONS` handlers take priority over automatic replies.
    pub fn handle_options(mut self, enabled: bool) -> Self {
        self.options.handle_options = enabled;
        self
    }

    /// Limits the number of dynamic routes per method. Routes registered past
    /// the limit fail with [`RouteError::CapacityExceeded`].
    pub fn max_dynamic_routes(mut self, limit: usize) -> Self {
        self.options.max_dynamic_routes = limit;
        self.config.set_mark_limit(limit);
        self
    }

    /// Limits the compiled size of one method's combined pattern.
    pub fn regex_size_limit(mut self, bytes: usize) -> Self {
        self.options.regex_size_limit = bytes;
        self
    }

    /// An optional handler that is called on automatic `OPTIONS` requests.
    /// The handler is only called if `handle_options` is true and no `OPTIONS`
    /// handler for the specific path was set.
    pub fn global_options(mut self, handler: impl Handler + 'static) -> Self {
        self.global_options = Some(Box::new(handler));
        self
    }

    /// Configurable handler which is called when no matching route is
    /// found.
    pub fn not_found(mut self, handler: impl Handler + 'static) -> Self {
        self.not_found = Some(Box::new(handler));
        self
    }

    /// A configurable handler which is called when a request
    /// cannot be routed and `handle_method_not_allowed` is true.
    pub fn method_not_allowed(mut self, handler: impl Handler + 'static) -> Self {
        self.method_not_allowed = Some(Box::new(handler));
        self
    }

    /// The routes declared so far.
    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    /// Compiles the route table. Fails if a route's handler id is unbound or
    /// a combined pattern cannot be compiled.
    pub fn build(self) -> Result<Router, RouteError> {
        if let Some(route) = self
            .config
            .routes()
            .find(|route| !self.handlers.contains_key(route.handler()))
        {
            return Err(RouteError::UnboundHandler(route.handler().to_string()));
        }

        let table = RouteTable::compile(self.config, self.options.regex_size_limit)?;

        Ok(Router {
            table,
            handlers: self.handlers,
            options: self.options,
            global_options: self.global_options,
            not_found: self.not_found,
            method_not_allowed: self.method_not_allowed,
        })
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        RouterBuilder {
            config: RouteConfig::new(),
            handlers: HashMap::new(),
            options: RouterOptions::default(),
            global_options: None,
            not_found: None,
            method_not_allowed: None,
        }
    }
}

/// Router dispatches requests to different handlers via configurable routes.
pub struct Router {
    table: RouteTable,
    handlers: HashMap<HandlerId, Box<dyn Handler>>,
    options: RouterOptions,
    global_options: Option<Box<dyn Handler>>,
    not_found: Option<Box<dyn Handler>>,
    method_not_allowed: Option<Box<dyn Handler>>,
}

/// A route matched by [`Router::lookup`].
pub struct Match<'r> {
    pub route: &'r Route,
    pub handler: &'r dyn Handler,
    pub params: Params,
}

/// The outcome of [`Router::lookup`].
pub enum Lookup<'r> {
    Found(Match<'r>),
    /// Other methods route the path; lists them with `OPTIONS`.
    MethodNotAllowed(Vec<&'r str>),
    NotFound,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    /// Lookup allows the manual lookup of the handler for a specific method and path.
    /// ```rust
    /// use routemark::{Lookup, Router};
    /// use hyper::{Response, Body, Method};
    ///
    /// let router = Router::builder()
    ///     .get("/home", |_| async {
    ///         Ok(Response::new(Body::from("Welcome!")))
    ///     })
    ///     .build()
    ///     .unwrap();
    ///
    /// match router.lookup(&Method::GET, "/home") {
    ///     Lookup::Found(m) => assert!(m.params.is_empty()),
    ///     _ => unreachable!(),
    /// }
    /// ```
    pub fn lookup(&self, method: &Method, path: &str) -> Lookup<'_> {
        let (route, params) = match self.table.resolve(method, path) {
            Resolution::Static(route) => (route, Params::default()),
            Resolution::Dynamic(route, params) => (route, params),
            Resolution::MethodNotAllowed(allowed) => return Lookup::MethodNotAllowed(allowed),
            Resolution::NotFound => return Lookup::NotFound,
        };

        match self.handlers.get(route.handler()) {
            Some(handler) => Lookup::Found(Match {
                route,
                handler: handler.as_ref(),
                params,
            }),
            None => {
                tracing::error!(handler = %route.handler(), "route has no bound handler");
                Lookup::NotFound
            }
        }
    }

    /// Returns a list of the allowed methods for a specific path
    /// ```rust
    /// use routemark::Router;
    /// use hyper::{Response, Body};
    ///
    /// let router = Router::builder()
    ///     .get("/home", |_| async {
    ///         Ok(Response::new(Body::from("Welcome!")))
    ///     })
    ///     .post("/home", |_| async {
    ///         Ok(Response::new(Body::from("Welcome!")))
    ///     })
    ///     .build()
    ///     .unwrap();
    ///
    /// let allowed = router.allowed("/home");
    /// assert!(allowed.contains(&"GET"));
    /// assert!(allowed.contains(&"POST"));
    /// assert!(allowed.contains(&"OPTIONS"));
    /// # assert_eq!(allowed.len(), 3);
    /// ```
    pub fn allowed(&self, path: &str) -> Vec<&str> {
        self.table.allowed(path)
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }
}

/// Represents a HTTP handler function.
/// This trait is implemented for asynchronous functions that take a `Request` and return a
/// `Result<Response<Body>, hyper::Error>`
/// ```rust
/// # use routemark::Handler;
/// # use hyper::{Request, Response, Body};
/// async fn hello(_: Request<Body>) -> Result<Response<Body>, hyper::Error> {
///     Ok(Response::new(Body::empty()))
/// }
///
/// let handler: Box<dyn Handler> = Box::new(hello);
/// ```
pub trait Handler: Send + Sync {
    fn handle(
        &self,
        req: Request<Body>,
    ) -> Pin<Box<dyn Future<Output = hyper::Result<Response<Body>>> + Send + Sync>>;
}

impl<F, R> Handler for F
where
    F: Fn(Request<Body>) -> R + Send + Sync,
    R: Future<Output = Result<Response<Body>, hyper::Error>> + Send + Sync + 'static,
{
    fn handle(
        &self,
        req: Request<Body>,
    ) -> Pin<Box<dyn Future<Output = hyper::Result<Response<Body>>> + Send + Sync>> {
        Box::pin(self(req))
    }
}

#[doc(hidden)]
pub struct MakeRouterService(RouterService);

impl<T> Service<T> for MakeRouterService {
    type Response = RouterService;
    type Error = hyper::Error;
    type Future = future::Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _: T) -> Self::Future {
        let service = self.0.clone();
        future::ok(service)
    }
}

#[doc(hidden)]
#[derive(Clone)]
pub struct RouterService(Arc<Router>);

impl RouterService {
    fn new(router: Router) -> Self {
        RouterService(Arc::new(router))
    }
}

impl Service<Request<Body>> for RouterService {
    type Response = Response<Body>;
    type Error = hyper::Error;
    type Future = ResponseFut;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        self.0.serve(req)
    }
}

impl Router {
    /// Converts the `Router` into a `Service` which you can serve directly with `Hyper`.
    /// If you have an existing `Service` that you want to incorporate a `Router` into, see
    /// [`Router::serve`](crate::Router::serve).
    /// ```rust,no_run
    /// # use routemark::Router;
    /// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
    /// // Our router...
    /// let router = Router::builder().build()?;
    ///
    /// // Convert it into a service...
    /// let service = router.into_service();
    ///
    /// // Serve with hyper
    /// hyper::Server::bind(&([127, 0, 0, 1], 3030).into())
    ///     .serve(service)
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn into_service(self) -> MakeRouterService {
        MakeRouterService(RouterService::new(self))
    }

    /// An asynchronous function from a `Request` to a `Response`. You will generally not need to use
    /// this function directly, and instead use
    /// [`Router::into_service`](crate::Router::into_service). However, it may be useful when
    /// incorporating the router into a larger service.
    /// ```rust,no_run
    /// # use routemark::Router;
    /// # use hyper::service::{make_service_fn, service_fn};
    /// # use hyper::{Request, Body, Server};
    /// # use std::convert::Infallible;
    /// # use std::sync::Arc;
    ///
    /// # async fn run() {
    /// let router = Arc::new(Router::builder().build().unwrap());
    ///
    /// let make_svc = make_service_fn(move |_| {
    ///     let router = router.clone();
    ///     async move {
    ///         Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
    ///             let router = router.clone();
    ///             async move { router.serve(req).await }
    ///         }))
    ///     }
    /// });
    ///
    /// let server = Server::bind(&([127, 0, 0, 1], 3000).into())
    ///     .serve(make_svc)
    ///     .await;
    /// # }
    /// ```
    pub fn serve(&self, mut req: Request<Body>) -> ResponseFut {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        let allow = match self.lookup(&method, &path) {
            Lookup::Found(found) => {
                req.extensions_mut().insert(found.params);
                return ResponseFutKind::Boxed(found.handler.handle(req)).into();
            }
            Lookup::MethodNotAllowed(allow) => allow,
            Lookup::NotFound => Vec::new(),
        };

        if method != Method::CONNECT && path != "/" && self.options.redirect_fixed_path {
            let fixed_path = clean(&path);

            if fixed_path != path && self.table.resolve(&method, &fixed_path).route().is_some() {
                let code = match method {
                    // Moved Permanently, request with GET method
                    Method::GET => StatusCode::MOVED_PERMANENTLY,
                    // Permanent Redirect, request with same method
                    _ => StatusCode::PERMANENT_REDIRECT,
                };

                return ResponseFutKind::Redirect(fixed_path, code).into();
            }
        }

        if method == Method::OPTIONS && self.options.handle_options {
            if !allow.is_empty() {
                return match self.global_options {
                    Some(ref handler) => ResponseFutKind::Boxed(handler.handle(req)).into(),
                    None => ResponseFutKind::Options(allow.join(", ")).into(),
                };
            }
        } else if self.options.handle_method_not_allowed && !allow.is_empty() {
            return match self.method_not_allowed {
                Some(ref handler) => ResponseFutKind::Boxed(handler.handle(req)).into(),
                None => ResponseFutKind::MethodNotAllowed(allow.join(", ")).into(),
            };
        }

        match self.not_found {
            Some(ref handler) => ResponseFutKind::Boxed(handler.handle(req)).into(),
            None => ResponseFutKind::NotFound.into(),
        }
    }
}

pub struct ResponseFut {
    kind: ResponseFutKind,
}

impl From<ResponseFutKind> for ResponseFut {
    fn from(kind: ResponseFutKind) -> Self {
        Self { kind }
    }
}

enum ResponseFutKind {
    Boxed(Pin<Box<dyn Future<Output = hyper::Result<Response<Body>>> + Send + Sync>>),
    Redirect(String, StatusCode),
    MethodNotAllowed(String),
    Options(String),
    NotFound,
}

impl Future for ResponseFut {
    type Output = hyper::Result<Response<Body>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let ready = match self.kind {
            ResponseFutKind::Boxed(ref mut fut) => ready!(fut.as_mut().poll(cx)),
            ResponseFutKind::Redirect(ref path, code) => {
                Ok(empty_response(code, Some((header::LOCATION, path.as_str()))))
            }
            ResponseFutKind::NotFound => Ok(empty_response(StatusCode::NOT_FOUND, None)),
            ResponseFutKind::Options(ref allowed) => {
                Ok(empty_response(StatusCode::OK, Some((header::ALLOW, allowed.as_str()))))
            }
            ResponseFutKind::MethodNotAllowed(ref allowed) => Ok(empty_response(
                StatusCode::METHOD_NOT_ALLOWED,
                Some((header::ALLOW, allowed.as_str())),
            )),
        };

        Poll::Ready(ready)
    }
}

fn empty_response(status: StatusCode, header: Option<(HeaderName, &str)>) -> Response<Body> {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = status;

    if let Some((name, value)) = header {
        if let Ok(value) = HeaderValue::from_str(value) {
            res.headers_mut().insert(name, value);
        }
    }

    res
}
