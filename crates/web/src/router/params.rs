use std::sync::Arc;

/// Parameters captured from the path of a matched request.
///
/// Built fresh for every match by pairing the route's declared parameter
/// names with the concrete path segments at the same positions. The same
/// route serves concurrent requests with different parameter values, so the
/// mapping always travels with the request, never with the route.
#[derive(Debug, Clone, Default)]
pub struct PathParams {
    pairs: Vec<(Arc<str>, String)>,
}

impl PathParams {
    pub(crate) fn new(pairs: Vec<(Arc<str>, String)>) -> Self {
        Self { pairs }
    }

    #[inline]
    pub fn empty() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Value captured for `name`, or `None` if the pattern declared no such
    /// parameter.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.pairs.iter().find(|(key, _)| key.as_ref() == name).map(|(_, value)| value.as_str())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Name/value pairs in path-position order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(name, value)| (name.as_ref(), value.as_str()))
    }
}
