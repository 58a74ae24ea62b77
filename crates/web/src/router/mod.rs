//! Method-aware path routing over a segment trie.
//!
//! One trie per HTTP method plus a method-agnostic fallback trie (the
//! empty-method bucket of the original API). Registration walks and extends
//! the trie; lookup walks it with literal-over-parameter precedence and
//! rebuilds the captured parameters for every request.
//!
//! The router is built single-threaded at configuration time and is
//! read-only once serving starts; the server enforces that by consuming the
//! builder, not by locking.

mod error;
mod params;
mod route;
mod tree;

pub use error::RouteError;
pub use params::PathParams;
pub use route::Route;

use std::collections::HashMap;

use http::Method;

use crate::handler::Handler;
use route::Pattern;
use tree::Node;

#[derive(Debug, Default)]
pub struct Router {
    methods: HashMap<Method, Node>,
    any: Node,
}

/// A resolved route together with the parameters captured from the path.
#[derive(Debug)]
pub struct RouteMatch<'router> {
    route: &'router Route,
    params: PathParams,
}

impl<'router> RouteMatch<'router> {
    pub fn route(&self) -> &'router Route {
        self.route
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn into_parts(self) -> (&'router Route, PathParams) {
        (self.route, self.params)
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `pattern` for `method`, or for the
    /// method-agnostic fallback bucket when `method` is `None`.
    ///
    /// Fails fast on malformed patterns; see [`RouteError`]. Registering a
    /// structurally identical pattern again overwrites the previous route.
    pub fn insert(
        &mut self,
        method: Option<Method>,
        pattern: &str,
        handler: impl Handler + 'static,
    ) -> Result<(), RouteError> {
        let pattern = Pattern::parse(pattern)?;
        let root = match method {
            Some(method) => self.methods.entry(method).or_default(),
            None => &mut self.any,
        };
        let segments = pattern.segments().to_vec();
        root.insert(&segments, Route::new(pattern, Box::new(handler)));
        Ok(())
    }

    /// Resolves `path` for `method`.
    ///
    /// The method's own trie is consulted first; if it misses — whether the
    /// method has no trie at all or just no matching route — the walk is
    /// retried against the fallback trie, so method-specific registrations
    /// shadow `all` registrations for the same path without hiding the rest
    /// of the fallback bucket.
    pub fn at(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let segments = split_path(path);
        let route = match self.methods.get(method) {
            Some(root) => root.find(&segments).or_else(|| self.any.find(&segments)),
            None => self.any.find(&segments),
        };
        route.map(|route| RouteMatch { params: route.capture(&segments), route })
    }

    #[cfg(test)]
    fn method_root(&self, method: &Method) -> Option<&Node> {
        self.methods.get(method)
    }
}

/// Splits a request path into segments, stripping one leading and one
/// trailing slash — the lookup-side mirror of pattern normalization.
fn split_path(path: &str) -> Vec<&str> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    if path.is_empty() { Vec::new() } else { path.split('/').collect() }
}
