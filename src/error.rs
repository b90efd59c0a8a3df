//! Errors raised while declaring routes, compiling the route table and
//! loading a persisted route cache.
//!
//! Dispatch never fails: a request that matches nothing is a
//! [`Resolution`](crate::dispatch::Resolution), not an error.

use thiserror::Error;

/// A URI template could not be compiled into a matching pattern.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("route template is empty")]
    Empty,

    #[error("expected route template beginning with '/', found: '{template}'")]
    MissingLeadingSlash { template: String },

    #[error("parameter '{name}' is declared more than once in '{template}'")]
    DuplicateParameter { template: String, name: String },

    #[error("invalid parameter name '{name}' in '{template}'")]
    InvalidParameterName { template: String, name: String },

    #[error("unclosed placeholder in '{template}'")]
    UnclosedPlaceholder { template: String },

    #[error("invalid constraint for parameter '{name}' in '{template}': {source}")]
    InvalidConstraint {
        template: String,
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("constraint for parameter '{name}' in '{template}' must not contain capture groups")]
    CapturingConstraint { template: String, name: String },
}

/// Registration or route table compilation failed. These abort startup.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("too many dynamic routes for {method}: {routes} routes exceed the limit of {limit}")]
    CapacityExceeded {
        method: String,
        routes: usize,
        limit: usize,
    },

    #[error("too many dynamic routes for {method}: the combined pattern of {routes} routes exceeds the regex size limit of {size_limit} bytes")]
    PatternTooLarge {
        method: String,
        routes: usize,
        size_limit: usize,
    },

    #[error("combined pattern for {method} does not compile: {source}")]
    InvalidPattern {
        method: String,
        #[source]
        source: regex::Error,
    },

    #[error("inconsistent route configuration: {0}")]
    Inconsistent(String),

    #[error("no handler bound for '{0}'")]
    UnboundHandler(String),
}

/// A persisted route cache could not be used.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("route cache i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("route cache could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("route cache fingerprint mismatch: expected {expected}, found {found}")]
    Fingerprint { expected: String, found: String },

    #[error("route cache is inconsistent: {0}")]
    Inconsistent(#[from] RouteError),
}
