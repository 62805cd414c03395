//! Per-router configuration carried into every request that router matches.

use crate::context::RequestContext;
use crate::handler::BoxedHandler;
use crate::validate::SchemaMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

pub(crate) type Field = Box<dyn Any + Send + Sync>;
type Init = Arc<dyn Fn() -> Field + Send + Sync>;
type Derivation = Arc<dyn Fn(&RequestContext) -> Field + Send + Sync>;

/// Index of a scope in the router's scope table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScopeId(usize);

impl ScopeId {
    /// Every builder's own scope.
    pub(crate) const ROOT: ScopeId = ScopeId(0);

    pub(crate) fn offset(self, by: usize) -> Self {
        ScopeId(self.0 + by)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// A value copied onto every request context.
pub(crate) trait Decoration: Send + Sync {
    fn instantiate(&self) -> Field;
}

impl<T: Clone + Send + Sync + 'static> Decoration for T {
    fn instantiate(&self) -> Field {
        Box::new(self.clone())
    }
}

/// Several decorators declared at once, see [`RouterBuilder::decorate_all`](crate::RouterBuilder::decorate_all).
#[derive(Clone, Default)]
pub struct Decorators {
    entries: Vec<(String, Arc<dyn Decoration>)>,
}

impl Decorators {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<V: Clone + Send + Sync + 'static>(mut self, key: impl Into<String>, value: V) -> Self {
        self.entries.push((key.into(), Arc::new(value) as Arc<dyn Decoration>));
        self
    }
}

impl fmt::Debug for Decorators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(key, _)| key)).finish()
    }
}

/// Several state initializers declared at once, see [`RouterBuilder::state_all`](crate::RouterBuilder::state_all).
#[derive(Clone, Default)]
pub struct States {
    entries: Vec<(String, Init)>,
}

impl States {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<T, F>(mut self, key: impl Into<String>, init: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let init: Init = Arc::new(move || Box::new(init()) as Field);
        self.entries.push((key.into(), init));
        self
    }
}

impl fmt::Debug for States {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(key, _)| key)).finish()
    }
}

/// Middleware, guard schema and context injections of one router.
#[derive(Clone, Default)]
pub(crate) struct Scope {
    pub(crate) middleware: Vec<BoxedHandler>,
    pub(crate) guard: SchemaMap,
    decorators: Vec<(String, Arc<dyn Decoration>)>,
    initializers: Vec<(String, Init)>,
    derivations: Vec<(String, Derivation)>,
}

impl Scope {
    pub(crate) fn decorate(&mut self, decorators: Decorators) {
        for (key, value) in decorators.entries {
            self.decorators.retain(|(existing, _)| *existing != key);
            self.decorators.push((key, value));
        }
    }

    pub(crate) fn state(&mut self, states: States) {
        for (key, init) in states.entries {
            self.initializers.retain(|(existing, _)| *existing != key);
            self.initializers.push((key, init));
        }
    }

    pub(crate) fn derive<T, F>(&mut self, key: String, derive: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&RequestContext) -> T + Send + Sync + 'static,
    {
        let derivation: Derivation = Arc::new(move |ctx: &RequestContext| Box::new(derive(ctx)) as Field);
        self.derivations.push((key, derivation));
    }

    /// Puts `outer` around this scope: its middleware runs first, its guard is intersected with this one and its
    /// injections come before this scope's own, which win on equal keys.
    pub(crate) fn inherit(&mut self, outer: &Scope) {
        let mut middleware = outer.middleware.clone();
        middleware.append(&mut self.middleware);
        self.middleware = middleware;

        self.guard = outer.guard.merge(&self.guard);

        let own: Vec<_> = std::mem::take(&mut self.decorators);
        self.decorators = outer.decorators.clone();
        for (key, value) in own {
            self.decorators.retain(|(existing, _)| *existing != key);
            self.decorators.push((key, value));
        }

        let own: Vec<_> = std::mem::take(&mut self.initializers);
        self.initializers = outer.initializers.clone();
        for (key, init) in own {
            self.initializers.retain(|(existing, _)| *existing != key);
            self.initializers.push((key, init));
        }

        let mut derivations = outer.derivations.clone();
        derivations.append(&mut self.derivations);
        self.derivations = derivations;
    }

    /// Populates a fresh context: decorators, then state, then derivations in declaration order.
    pub(crate) fn inject(&self, ctx: &mut RequestContext) {
        for (key, decoration) in &self.decorators {
            ctx.insert_field(key, (**decoration).instantiate());
        }
        for (key, init) in &self.initializers {
            ctx.insert_field(key, init());
        }
        for (key, derive) in &self.derivations {
            let value = derive(&*ctx);
            ctx.insert_field(key, value);
        }
        trace!(
            decorators = self.decorators.len(),
            state = self.initializers.len(),
            derivations = self.derivations.len(),
            "context injected"
        );
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("middleware", &self.middleware.len())
            .field("guard", &self.guard)
            .field("decorators", &self.decorators.iter().map(|(key, _)| key).collect::<Vec<_>>())
            .field("state", &self.initializers.iter().map(|(key, _)| key).collect::<Vec<_>>())
            .field("derivations", &self.derivations.iter().map(|(key, _)| key).collect::<Vec<_>>())
            .finish()
    }
}
