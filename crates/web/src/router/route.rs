use std::fmt;
use std::sync::Arc;

use crate::handler::Handler;
use crate::router::RouteError;
use crate::router::params::PathParams;

/// A validated, normalized route pattern.
///
/// Splitting and parameter discovery happen once here, at registration time;
/// the trie and the route both consume the result.
#[derive(Debug)]
pub(crate) struct Pattern {
    normalized: String,
    segments: Vec<Segment>,
    params: Vec<(usize, Arc<str>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    Param,
}

impl Pattern {
    /// Parses and validates a pattern.
    ///
    /// Exactly one trailing slash is stripped, so `/path` and `/path/`
    /// register the same route; `/` alone denotes the root route. A segment
    /// is a parameter iff its first byte is `:`.
    pub(crate) fn parse(pattern: &str) -> Result<Self, RouteError> {
        if !pattern.starts_with('/') {
            return Err(RouteError::MissingLeadingSlash { pattern: pattern.to_owned() });
        }

        let normalized =
            if pattern.len() > 1 { pattern.strip_suffix('/').unwrap_or(pattern) } else { pattern };

        let mut segments = Vec::new();
        let mut params: Vec<(usize, Arc<str>)> = Vec::new();

        let body = &normalized[1..];
        if !body.is_empty() {
            for (index, segment) in body.split('/').enumerate() {
                if segment.is_empty() {
                    return Err(RouteError::EmptySegment { pattern: pattern.to_owned() });
                }
                match segment.strip_prefix(':') {
                    Some("") => {
                        return Err(RouteError::UnnamedParam { pattern: pattern.to_owned() });
                    }
                    Some(name) => {
                        if params.iter().any(|(_, existing)| existing.as_ref() == name) {
                            return Err(RouteError::DuplicateParam {
                                pattern: pattern.to_owned(),
                                name: name.to_owned(),
                            });
                        }
                        params.push((index, Arc::from(name)));
                        segments.push(Segment::Param);
                    }
                    None => segments.push(Segment::Literal(segment.to_owned())),
                }
            }
        }

        Ok(Self { normalized: normalized.to_owned(), segments, params })
    }

    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

/// A registered endpoint: the normalized pattern, its handler and the
/// parameter names in path-position order.
///
/// Immutable once built, and owned exclusively by the trie node that stores
/// it. Request state never lands here — captured parameters are produced by
/// [`capture`](Route::capture) into a per-request value.
pub struct Route {
    pattern: String,
    params: Vec<(usize, Arc<str>)>,
    handler: Box<dyn Handler>,
}

impl Route {
    pub(crate) fn new(pattern: Pattern, handler: Box<dyn Handler>) -> Self {
        Self { pattern: pattern.normalized, params: pattern.params, handler }
    }

    /// The normalized pattern this route was registered under.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }

    /// Maps the declared parameter positions back onto the concrete path
    /// segments of one request.
    pub(crate) fn capture(&self, segments: &[&str]) -> PathParams {
        if self.params.is_empty() {
            return PathParams::empty();
        }
        let pairs = self
            .params
            .iter()
            .map(|(index, name)| (Arc::clone(name), segments[*index].to_owned()))
            .collect();
        PathParams::new(pairs)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literals_and_params() {
        let pattern = Pattern::parse("/stuff/:a/params/:b").unwrap();

        assert_eq!(pattern.normalized, "/stuff/:a/params/:b");
        assert_eq!(
            pattern.segments,
            vec![
                Segment::Literal("stuff".to_owned()),
                Segment::Param,
                Segment::Literal("params".to_owned()),
                Segment::Param,
            ]
        );
        assert_eq!(pattern.params.len(), 2);
        assert_eq!(pattern.params[0], (1, Arc::from("a")));
        assert_eq!(pattern.params[1], (3, Arc::from("b")));
    }

    #[test]
    fn test_parse_strips_one_trailing_slash() {
        let pattern = Pattern::parse("/path/").unwrap();
        assert_eq!(pattern.normalized, "/path");
        assert_eq!(pattern.segments.len(), 1);
    }

    #[test]
    fn test_parse_root() {
        let pattern = Pattern::parse("/").unwrap();
        assert_eq!(pattern.normalized, "/");
        assert!(pattern.segments.is_empty());
    }

    #[test]
    fn test_parse_rejects_missing_leading_slash() {
        assert_eq!(
            Pattern::parse("no/slash").unwrap_err(),
            RouteError::MissingLeadingSlash { pattern: "no/slash".to_owned() }
        );
    }

    #[test]
    fn test_parse_rejects_empty_segment() {
        assert_eq!(
            Pattern::parse("/a//b").unwrap_err(),
            RouteError::EmptySegment { pattern: "/a//b".to_owned() }
        );
    }

    #[test]
    fn test_parse_rejects_unnamed_param() {
        assert_eq!(
            Pattern::parse("/a/:/b").unwrap_err(),
            RouteError::UnnamedParam { pattern: "/a/:/b".to_owned() }
        );
    }

    #[test]
    fn test_parse_rejects_duplicate_param() {
        assert_eq!(
            Pattern::parse("/a/:x/b/:x").unwrap_err(),
            RouteError::DuplicateParam { pattern: "/a/:x/b/:x".to_owned(), name: "x".to_owned() }
        );
    }
}
