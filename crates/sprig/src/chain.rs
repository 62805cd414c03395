//! The onion chain that runs middleware around the matched route handlers.
//!
//! The router middleware run first, outermost first. The last middleware's `next` runs the route handlers of the
//! match in registration order. What happens after the last route handler calls `next` depends on the match:
//! with a real endpoint in the match the chain is left unanswered, which is a misconfiguration, and with only
//! wildcard catch-alls in the match the request falls through to not found.

use crate::context::RequestContext;
use crate::error::Misconfiguration;
use crate::handler::{BoxedHandler, ResponseResult};
use std::fmt;
use tracing::trace;

/// What the chain does once every handler has called `next`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Exhausted {
    NotFound,
    Unanswered,
}

#[derive(Clone, Copy)]
enum Tail<'a> {
    Routes { handlers: &'a [BoxedHandler], exhausted: Exhausted },
    Done(Exhausted),
}

/// The rest of the handler chain, handed to every [`Handler`](crate::Handler).
#[derive(Clone, Copy)]
pub struct Next<'a> {
    handlers: &'a [BoxedHandler],
    tail: Tail<'a>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(middleware: &'a [BoxedHandler], routes: &'a [BoxedHandler], exhausted: Exhausted) -> Self {
        Self { handlers: middleware, tail: Tail::Routes { handlers: routes, exhausted } }
    }

    /// Runs the remaining handlers and returns the response they produce.
    pub async fn run(self, ctx: &mut RequestContext) -> ResponseResult {
        if let Some((head, rest)) = self.handlers.split_first() {
            return head.call(ctx, Next { handlers: rest, tail: self.tail }).await;
        }

        match self.tail {
            Tail::Routes { handlers, exhausted } => match handlers.split_first() {
                Some((head, rest)) => head.call(ctx, Next { handlers: rest, tail: Tail::Done(exhausted) }).await,
                None => {
                    trace!(path = ctx.req().path(), "no route handler for method, answering not found");
                    Ok(ctx.not_found())
                }
            },
            Tail::Done(Exhausted::NotFound) => {
                trace!(path = ctx.req().path(), "catch-all handlers passed, answering not found");
                Ok(ctx.not_found())
            }
            Tail::Done(Exhausted::Unanswered) => Err(Misconfiguration::UnansweredChain.into()),
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes = match self.tail {
            Tail::Routes { handlers, .. } => handlers.len(),
            Tail::Done(_) => 0,
        };
        f.debug_struct("Next").field("middleware", &self.handlers.len()).field("routes", &routes).finish()
    }
}
