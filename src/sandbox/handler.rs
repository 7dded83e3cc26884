use super::context::RequestContext;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// The contract between the server and application code.
///
/// A handler is invoked once per matching request with the request's
/// [`RequestContext`] as its only channel to the outside world: it reads
/// query/body/cookie/session data from the context, appends output to it,
/// and sets status/headers/cookies on it. Returning an error (or panicking)
/// is caught at the sandbox boundary and becomes a 500 response; it never
/// crashes the connection task or the process.
///
/// Handlers run to completion on the connection's coroutine and must not
/// perform I/O that suspends; blocking the coroutine mid-handler would let
/// another task interleave with the sandbox sequence.
pub trait Handler: Send + Sync {
    fn handle(&self, ctx: &mut RequestContext) -> anyhow::Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut RequestContext) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Registry of dynamic routes, keyed by decoded request path.
///
/// Handlers are compiled functions registered ahead of time; the registry is
/// built at startup and immutable once the server starts, so lookups need no
/// locking.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an exact request path. Registering the same
    /// path twice replaces the earlier handler.
    pub fn register<H: Handler + 'static>(&mut self, path: &str, handler: H) {
        self.register_arc(path, Arc::new(handler));
    }

    pub fn register_arc(&mut self, path: &str, handler: Arc<dyn Handler>) {
        let replaced = self.handlers.insert(path.to_string(), handler).is_some();
        info!(path, replaced, total = self.handlers.len(), "handler registered");
    }

    pub fn get(&self, path: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_exact_path() {
        let mut reg = HandlerRegistry::new();
        reg.register("/counter", |_ctx: &mut RequestContext| Ok(()));
        assert!(reg.get("/counter").is_some());
        assert!(reg.get("/counter/").is_none());
        assert!(reg.get("/other").is_none());
    }

    #[test]
    fn re_registration_replaces() {
        let mut reg = HandlerRegistry::new();
        reg.register("/p", |ctx: &mut RequestContext| {
            ctx.echo("first");
            Ok(())
        });
        reg.register("/p", |ctx: &mut RequestContext| {
            ctx.echo("second");
            Ok(())
        });
        assert_eq!(reg.len(), 1);
    }
}
