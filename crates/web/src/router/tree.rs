use std::collections::HashMap;

use crate::router::route::{Route, Segment};

/// One vertex of the path trie.
///
/// Literal children hang off the segment-text map; parameter segments all
/// share the single reserved `param` slot, whatever their declared name. A
/// node with a route is a leaf, which does not stop it from also branching —
/// `/a` and `/a/b` coexist on the same spine.
#[derive(Debug, Default)]
pub(crate) struct Node {
    literal: HashMap<String, Node>,
    param: Option<Box<Node>>,
    route: Option<Route>,
}

impl Node {
    /// Walks/extends the trie along `segments` and stores `route` at the end.
    ///
    /// Existing children are extended, never replaced, so patterns sharing a
    /// prefix end up as siblings. Inserting over a structurally identical
    /// pattern overwrites the route at that leaf.
    pub(crate) fn insert(&mut self, segments: &[Segment], route: Route) {
        match segments.split_first() {
            None => {
                self.route = Some(route);
            }
            Some((Segment::Literal(text), rest)) => {
                self.literal.entry(text.clone()).or_default().insert(rest, route);
            }
            Some((Segment::Param, rest)) => {
                self.param.get_or_insert_with(Box::default).insert(rest, route);
            }
        }
    }

    /// Resolves `segments` to a route.
    ///
    /// At each step the literal child wins over the parameter slot; once a
    /// child is chosen there is no backtracking. The parameter slot never
    /// matches an empty segment. The landed node must actually hold a route.
    pub(crate) fn find(&self, segments: &[&str]) -> Option<&Route> {
        match segments.split_first() {
            None => self.route.as_ref(),
            Some((segment, rest)) => {
                let child = match self.literal.get(*segment) {
                    Some(child) => child,
                    None if segment.is_empty() => return None,
                    None => self.param.as_deref()?,
                };
                child.find(rest)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn literal_children(&self) -> usize {
        self.literal.len()
    }

    #[cfg(test)]
    pub(crate) fn literal_child(&self, segment: &str) -> Option<&Node> {
        self.literal.get(segment)
    }
}
