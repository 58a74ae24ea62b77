use thiserror::Error;

/// Configuration errors raised while registering a route pattern.
///
/// Registration fails fast: a malformed pattern never reaches the trie, so
/// lookups can rely on every stored pattern being well formed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("route pattern {pattern:?} must begin with '/'")]
    MissingLeadingSlash { pattern: String },

    #[error("route pattern {pattern:?} contains an empty segment")]
    EmptySegment { pattern: String },

    #[error("route pattern {pattern:?} contains a parameter segment with no name")]
    UnnamedParam { pattern: String },

    #[error("route pattern {pattern:?} declares parameter {name:?} more than once")]
    DuplicateParam { pattern: String, name: String },
}
