//! # Routemark
//!
//! Routemark is an HTTP request router for [hyper](https://hyper.rs) that resolves
//! static routes with a hash lookup and parameterized routes with one regex scan per
//! request, however many routes are registered.
//!
//! ## How it works
//!
//! **Static routes first:** A route without parameters is stored under its exact URI,
//! with and without a trailing slash. Resolving it is a single map access, and a static
//! route always wins over a parameterized route matching the same path.
//!
//! **One pattern per method:** Every parameterized route of a method is compiled into a
//! regex fragment and appended as one alternative of a combined pattern. Each
//! alternative is wrapped in a group named after a short *mark* (`a`, `b`, ..., `z`,
//! `aa`, ...). A single match against the combined pattern tells which mark fired, and
//! the mark leads straight to the route:
//!
//! ```ignore
//!  GET /posts/{id}                 mark a
//!  GET /posts/{id}/comments/{c}    mark b
//!
//!  ^(?:(?P<a>/posts/([^/]+))|(?P<b>/posts/([^/]+)/comments/([^/]+)))/?$
//! ```
//!
//! **Cacheable:** The compiled route set serializes to a versioned blob that can be
//! stored with [`RouteCache`] and reloaded on the next start instead of being compiled
//! again.
//!
//! **Method aware:** Requests for a path that exists under other methods are answered
//! with `405 Method Not Allowed` and an `Allow` header, and `OPTIONS` requests are
//! answered automatically.
//!
//! ## Usage
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
//! ```
//!
//! ### Named parameters
//!
//! `{user}` is a *named parameter*. The values are accessible via
//! `req.extensions().get::<Params>()`. Named parameters only match a single path
//! segment:
//!
//! ```ignore
//! Pattern: /user/{user}
//!
//!  /user/gordon              match
//!  /user/you                 match
//!  /user/gordon/             match
//!  /user/gordon/profile      no match
//!  /user/                    no match
//! ```
//!
//! A parameter may restrict what it matches with its own pattern, written after a
//! colon: `/posts/{id:\d+}`. The pattern must not contain capture groups.
//!
//! ### Not Found Handler
//!
//! Requests that match no route are answered with `404 Not Found`. A custom handler can
//! take over:
//!
//! ```rust
//! use routemark::Router;
//! use hyper::{Request, Response, Body};
//!
//! let router = Router::builder()
//!     .not_found(|_: Request<Body>| async {
//!         Ok::<_, hyper::Error>(Response::new(Body::from("nothing here")))
//!     })
//!     .build()
//!     .unwrap();
//! ```

#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod mark;
pub mod params;
pub mod path;
pub mod pattern;
pub mod route;
#[doc(hidden)]
pub mod router;
pub mod tree;

#[doc(inline)]
pub use router::{Handler, Lookup, Match, Router, RouterBuilder, RouterOptions};

pub use cache::RouteCache;
pub use config::RouteConfig;
pub use dispatch::{Resolution, RouteTable};
pub use error::{CacheError, CompileError, RouteError};
pub use mark::Mark;
pub use params::{Param, Params};
pub use route::{HandlerId, Route};
pub use tree::{MarkedRoute, RoutingTree};
