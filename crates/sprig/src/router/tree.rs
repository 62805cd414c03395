//! The path trie that maps request paths to handler sets.
//!
//! Every node is keyed by the raw segment it was registered with, so literal segments and pattern tokens share
//! one children map. Pattern tokens are also recorded on their parent node, in registration order, so a search
//! knows which children to try besides the literal one.
//!
//! A search walks the request path breadth-first, keeping every node the path can currently be in. Endpoint
//! matches only survive when they are the most specific ones found: more literal segments win, then more named
//! parameters. Wildcard matches always survive, they are how catch-all handlers such as logging or 404 pages get
//! to see the request.

use super::method::RouteMethod;
use super::pattern::{split_path, split_routing_path, Matcher, Pattern, WILDCARD};
use super::scope::ScopeId;
use crate::error::RouterError;
use crate::handler::BoxedHandler;
use crate::request::PathParams;
use crate::validate::SchemaMap;
use http::Method;
use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// The handlers registered for one method on one node, by one router.
pub(crate) struct HandlerSet {
    pub(crate) method: RouteMethod,
    pub(crate) handlers: Vec<BoxedHandler>,
    pub(crate) scope: ScopeId,
    /// Registration order across the whole trie.
    pub(crate) score: usize,
}

pub(crate) enum Target {
    Method { method: RouteMethod, handlers: Vec<BoxedHandler>, scope: ScopeId },
    Subtree(Node),
}

#[derive(Default)]
pub(crate) struct Node {
    children: HashMap<String, Node>,
    patterns: Vec<Pattern>,
    sets: Vec<HandlerSet>,
    schema: Option<SchemaMap>,
    terminal: bool,
}

impl Node {
    fn pattern(&self, token: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|pattern| pattern.token() == token)
    }

    pub(crate) fn schema(&self) -> Option<&SchemaMap> {
        self.schema.as_ref()
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub(crate) fn sets(&self) -> &[HandlerSet] {
        &self.sets
    }

    fn merge(&mut self, other: Node) {
        for pattern in other.patterns {
            if self.pattern(pattern.token()).is_none() {
                self.patterns.push(pattern);
            }
        }
        for (key, child) in other.children {
            match self.children.entry(key) {
                Entry::Occupied(mut existing) => existing.get_mut().merge(child),
                Entry::Vacant(vacant) => {
                    vacant.insert(child);
                }
            }
        }
        self.sets.extend(other.sets);
        if other.schema.is_some() {
            self.schema = other.schema;
        }
        self.terminal |= other.terminal;
    }

    fn rebase(&mut self, score_offset: usize, scope_offset: usize) {
        for set in &mut self.sets {
            set.score += score_offset;
            set.scope = set.scope.offset(scope_offset);
        }
        for child in self.children.values_mut() {
            child.rebase(score_offset, scope_offset);
        }
    }

    fn walk<'t>(&'t self, path: &mut Vec<&'t str>, visit: &mut impl FnMut(String, &'t Node)) {
        visit(format!("/{}", path.join("/")), self);
        for (key, child) in &self.children {
            path.push(key);
            child.walk(path, visit);
            path.pop();
        }
    }
}

#[derive(Default)]
pub(crate) struct PathTrie {
    root: Node,
    /// Number of handler sets ever created, the next set's score.
    order: usize,
}

impl PathTrie {
    /// Registers `target` at `path`, creating nodes as needed.
    ///
    /// Handlers for a method that already has a set from the same router are appended to that set. A schema
    /// replaces the node's previous schema.
    pub(crate) fn insert(&mut self, path: &str, schema: Option<SchemaMap>, target: Target) -> Result<(), RouterError> {
        let mut node = &mut self.root;
        for token in split_routing_path(path) {
            if node.pattern(&token).is_none() {
                if let Some(pattern) = Pattern::parse(&token)? {
                    node.patterns.push(pattern);
                }
            }
            node = node.children.entry(token).or_default();
        }

        match target {
            Target::Method { method, handlers, scope } => {
                match node.sets.iter_mut().find(|set| set.method == method && set.scope == scope) {
                    Some(set) => set.handlers.extend(handlers),
                    None => {
                        node.sets.push(HandlerSet { method, handlers, scope, score: self.order });
                        self.order += 1;
                    }
                }
            }
            Target::Subtree(subtree) => node.merge(subtree),
        }

        if schema.is_some() {
            node.schema = schema;
        }
        node.terminal = true;
        Ok(())
    }

    /// Mounts every route of `other` below `prefix`. Routes keep their relative order and rank after the
    /// routes already registered here.
    pub(crate) fn graft(&mut self, prefix: &str, other: PathTrie, scope_offset: usize) -> Result<(), RouterError> {
        let PathTrie { mut root, order } = other;
        root.rebase(self.order, scope_offset);
        self.order += order;
        self.insert(prefix, None, Target::Subtree(root))
    }

    /// Structural lookup: walks the registered segments literally, pattern tokens included.
    pub(crate) fn find(&self, path: &str) -> Option<&Node> {
        split_routing_path(path).iter().try_fold(&self.root, |node, token| node.children.get(token))
    }

    /// Every node holding handlers, with its registered path.
    pub(crate) fn routes(&self) -> Vec<(String, &Node)> {
        let mut routes = Vec::new();
        self.root.walk(&mut Vec::new(), &mut |path, node| {
            if node.terminal && !node.sets.is_empty() {
                routes.push((path, node));
            }
        });
        routes
    }

    /// Every handler set for `method` that matches `path`, ordered by registration.
    pub(crate) fn search<'t>(&'t self, method: &Method, path: &str) -> Vec<RouteMatch<'t>> {
        let segments = split_path(path);
        let mut found = Vec::new();
        let root = Cursor::new(&self.root);

        if segments.is_empty() {
            root.collect_endpoint(method, &mut found);
        }

        let mut frontier = vec![root];
        for (index, segment) in segments.iter().enumerate() {
            let is_last = index + 1 == segments.len();
            let mut next = Vec::new();

            for cursor in &frontier {
                if let Some(child) = cursor.node.children.get(*segment) {
                    let advanced = cursor.literal(child);
                    if is_last { advanced.collect_endpoint(method, &mut found) } else { next.push(advanced) }
                }

                for pattern in &cursor.node.patterns {
                    let Some(child) = cursor.node.children.get(pattern.token()) else {
                        continue;
                    };
                    match pattern {
                        Pattern::Wildcard => {
                            let advanced = cursor.wildcard(child);
                            advanced.collect(method, true, &mut found);
                            next.push(advanced);
                        }
                        Pattern::Named { name, matcher, .. } => {
                            if !is_last && matches!(matcher, Matcher::Regex(_)) {
                                let rest = segments[index..].join("/");
                                if matcher.matches(&rest) {
                                    cursor.named(child, name, rest).collect(method, false, &mut found);
                                    continue;
                                }
                            }
                            if matcher.matches(segment) {
                                let advanced = cursor.named(child, name, (*segment).to_string());
                                if is_last { advanced.collect_endpoint(method, &mut found) } else { next.push(advanced) }
                            }
                        }
                    }
                }
            }
            frontier = next;
        }

        keep_most_specific(found)
    }
}

/// A handler set that matched a request.
pub(crate) struct RouteMatch<'t> {
    pub(crate) set: &'t HandlerSet,
    pub(crate) schema: Option<&'t SchemaMap>,
    pub(crate) params: PathParams,
    pub(crate) wildcard: bool,
    /// (literal segments, named parameters) on the way to the node.
    rank: (usize, usize),
}

/// The match whose router and schema govern the request: the earliest of the most specific endpoints, or when
/// there is none, the earliest of the most specific wildcards.
pub(crate) fn primary<'m, 't>(matches: &'m [RouteMatch<'t>]) -> Option<&'m RouteMatch<'t>> {
    matches
        .iter()
        .find(|m| !m.wildcard)
        .or_else(|| matches.iter().min_by_key(|m| (Reverse(m.rank), m.set.score)))
}

fn keep_most_specific(mut found: Vec<RouteMatch<'_>>) -> Vec<RouteMatch<'_>> {
    found.sort_by_key(|m| m.set.score);
    found.dedup_by_key(|m| m.set.score);

    if let Some(best) = found.iter().filter(|m| !m.wildcard).map(|m| m.rank).max() {
        found.retain(|m| m.wildcard || m.rank == best);
    }
    found
}

#[derive(Clone)]
struct Cursor<'t> {
    node: &'t Node,
    params: PathParams,
    literals: usize,
    named: usize,
}

impl<'t> Cursor<'t> {
    fn new(node: &'t Node) -> Self {
        Self { node, params: PathParams::empty(), literals: 0, named: 0 }
    }

    fn literal(&self, node: &'t Node) -> Self {
        Self { node, params: self.params.clone(), literals: self.literals + 1, named: self.named }
    }

    fn wildcard(&self, node: &'t Node) -> Self {
        Self { node, params: self.params.clone(), literals: self.literals, named: self.named }
    }

    fn named(&self, node: &'t Node, name: &str, value: String) -> Self {
        let mut params = self.params.clone();
        params.push(name, value);
        Self { node, params, literals: self.literals, named: self.named + 1 }
    }

    /// Collects the node the path ended on, plus a wildcard child, which also matches an empty remainder.
    fn collect_endpoint(&self, method: &Method, found: &mut Vec<RouteMatch<'t>>) {
        self.collect(method, false, found);
        if let Some(star) = self.node.children.get(WILDCARD) {
            self.wildcard(star).collect(method, true, found);
        }
    }

    fn collect(&self, method: &Method, wildcard: bool, found: &mut Vec<RouteMatch<'t>>) {
        for set in self.node.sets.iter().filter(|set| set.method.matches(method)) {
            found.push(RouteMatch {
                set,
                schema: self.node.schema.as_ref(),
                params: self.params.clone(),
                wildcard,
                rank: (self.literals, self.named),
            });
        }
    }
}
