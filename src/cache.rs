//! Persists a compiled [`RouteConfig`] between process restarts.
//!
//! The blob is a JSON envelope holding a fingerprint and the three route
//! maps. The fingerprint hashes the crate version and the attribute set of
//! [`Route`](crate::Route), so a cache written by a build with a different
//! route shape is rejected instead of being decoded into the wrong
//! structure.
//!
//! ```rust,no_run
//! use routemark::{Route, RouteCache, RouteConfig, Router};
//! use hyper::{Body, Method, Request, Response};
//!
//! async fn show(_: Request<Body>) -> hyper::Result<Response<Body>> {
//!     Ok(Response::new(Body::empty()))
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = RouteCache::new("/var/cache/app/routes.json");
//! let config = cache.load_or_compile(|| {
//!     let mut config = RouteConfig::new();
//!     config.add_route(Route::new(Method::GET, "/posts/{id}", "posts.show")?)?;
//!     Ok(config)
//! })?;
//!
//! let router = Router::builder()
//!     .with_config(config)
//!     .bind("posts.show", show)
//!     .build()?;
//! # Ok(())
//! # }
//! ```
use crate::config::RouteConfig;
use crate::dispatch::RouteTable;
use crate::error::{CacheError, RouteError};
use crate::route::ROUTE_ATTRIBUTES;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    fingerprint: String,
    routes: &'a RouteConfig,
}

#[derive(Deserialize)]
struct Envelope {
    fingerprint: String,
    routes: serde_json::Value,
}

/// Hex SHA-256 over the crate version and the persisted route attributes.
pub fn fingerprint() -> String {
    let mut hasher = Sha256::new();
    hasher.update(env!("CARGO_PKG_NAME").as_bytes());
    hasher.update(b"\0");
    hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
    for attribute in ROUTE_ATTRIBUTES {
        hasher.update(b"\0");
        hasher.update(attribute.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Serializes `config` into a cache blob.
pub fn encode(config: &RouteConfig) -> Result<Vec<u8>, CacheError> {
    let envelope = EnvelopeRef {
        fingerprint: fingerprint(),
        routes: config,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Restores a config from a cache blob, checking its fingerprint and the
/// consistency of the restored maps.
pub fn decode(bytes: &[u8]) -> Result<RouteConfig, CacheError> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;

    let expected = fingerprint();
    if envelope.fingerprint != expected {
        return Err(CacheError::Fingerprint {
            expected,
            found: envelope.fingerprint,
        });
    }

    let config: RouteConfig = serde_json::from_value(envelope.routes)?;

    // compiling proves every mark and capture group lines up with its route
    Ok(RouteTable::new(config)?.into_config())
}

/// A route cache file.
#[derive(Debug, Clone)]
pub struct RouteCache {
    path: PathBuf,
}

impl RouteCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RouteCache { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cache. Returns `Ok(None)` when there is no cache file.
    pub fn load(&self) -> Result<Option<RouteConfig>, CacheError> {
        match fs::read(&self.path) {
            Ok(bytes) => decode(&bytes).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes `config` to the cache file, replacing it atomically.
    pub fn store(&self, config: &RouteConfig) -> Result<(), CacheError> {
        let bytes = encode(config)?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        // uniquely named per writer, removed on drop if persisting fails
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }

    /// Deletes the cache file if there is one.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }

    /// Returns the cached config, or runs `compile` and caches its result.
    ///
    /// A cache that cannot be used is discarded and recompiled; only errors
    /// from `compile` itself are returned. Failing to write the cache is
    /// logged and otherwise ignored.
    pub fn load_or_compile<F>(&self, compile: F) -> Result<RouteConfig, RouteError>
    where
        F: FnOnce() -> Result<RouteConfig, RouteError>,
    {
        match self.load() {
            Ok(Some(config)) => {
                tracing::debug!(path = ?self.path, routes = config.len(), "loaded route cache");
                return Ok(config);
            }
            Ok(None) => {
                tracing::debug!(path = ?self.path, "no route cache");
            }
            Err(err) => {
                tracing::warn!(path = ?self.path, error = %err, "discarding route cache");
                if let Err(err) = self.clear() {
                    tracing::warn!(path = ?self.path, error = %err, "failed to remove route cache");
                }
            }
        }

        let config = compile()?;

        if let Err(err) = self.store(&config) {
            tracing::warn!(path = ?self.path, error = %err, "failed to write route cache");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::route::Route;

    use hyper::Method;

    fn declared() -> Result<RouteConfig, RouteError> {
        let mut config = RouteConfig::new();
        config.add_route(Route::new(Method::GET, "/posts", "posts.index")?)?;
        config.add_route(Route::new(Method::GET, "/posts/{id}", "posts.show")?)?;
        config.add_route(Route::new(Method::DELETE, "/posts/{id}", "posts.destroy")?)?;
        Ok(config)
    }

    #[test]
    fn encode_decode() {
        let config = declared().unwrap();
        let bytes = encode(&config).unwrap();
        let restored = decode(&bytes).unwrap();

        assert_eq!(encode(&restored).unwrap(), bytes);

        let table = RouteTable::new(restored).unwrap();
        let resolution = table.resolve(&Method::DELETE, "/posts/3");
        assert_eq!(
            resolution.route().map(|r| r.handler().as_str()),
            Some("posts.destroy")
        );
    }

    #[test]
    fn fingerprint_mismatch_is_rejected() {
        let config = declared().unwrap();
        let mut value: serde_json::Value =
            serde_json::from_slice(&encode(&config).unwrap()).unwrap();
        value["fingerprint"] = serde_json::json!("0000");

        let err = decode(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        assert!(matches!(err, CacheError::Fingerprint { .. }));
    }

    #[test]
    fn mismatched_captures_are_rejected() {
        let config = declared().unwrap();
        let mut value: serde_json::Value =
            serde_json::from_slice(&encode(&config).unwrap()).unwrap();
        value["routes"]["dynamic_routes"]["GET"]["a"]["parameter_names"] =
            serde_json::json!([]);

        let err = decode(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        assert!(matches!(err, CacheError::Inconsistent(_)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(decode(b"not json"), Err(CacheError::Decode(_))));
    }

    #[test]
    fn missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path().join("routes.json"));
        assert!(cache.load().unwrap().is_none());
        cache.clear().unwrap();
    }

    #[test]
    fn compiles_once_then_reads_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path().join("nested").join("routes.json"));

        let first = cache.load_or_compile(declared).unwrap();
        assert!(cache.path().exists());

        let second = cache
            .load_or_compile(|| panic!("cache should have been used"))
            .unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn store_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path().join("routes.json"));
        let config = declared().unwrap();

        cache.store(&config).unwrap();
        cache.store(&config).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, ["routes.json"]);
        assert!(cache.load().unwrap().is_some());
    }

    #[test]
    fn corrupt_cache_is_recompiled() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path().join("routes.json"));
        fs::write(cache.path(), b"{\"fingerprint\": 1").unwrap();

        let mut compiled = false;
        let config = cache
            .load_or_compile(|| {
                compiled = true;
                declared()
            })
            .unwrap();

        assert!(compiled);
        assert_eq!(config.len(), 3);
        assert!(cache.load().unwrap().is_some());
    }

    #[test]
    fn inconsistent_cache_is_recompiled() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path().join("routes.json"));

        let mut value: serde_json::Value =
            serde_json::from_slice(&encode(&declared().unwrap()).unwrap()).unwrap();
        value["routes"]["matching_regexes"]["GET"] = serde_json::json!("^(?:(?P<a>/x))/?$");
        fs::write(cache.path(), serde_json::to_vec(&value).unwrap()).unwrap();

        assert!(matches!(cache.load(), Err(CacheError::Decode(_))));

        let config = cache.load_or_compile(declared).unwrap();
        assert_eq!(
            config.matching_regexes().get("GET").map(String::as_str),
            Some("^(?:(?P<a>/posts/([^/]+)))/?$")
        );
    }

    #[test]
    fn compile_errors_are_returned() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RouteCache::new(dir.path().join("routes.json"));

        let result = cache.load_or_compile(|| {
            let mut config = RouteConfig::new();
            config.add_route(Route::new(Method::GET, "/a/{x}/{x}", "dup")?)?;
            Ok(config)
        });

        assert!(matches!(result, Err(RouteError::Compile(_))));
        assert!(!cache.path().exists());
    }
}
