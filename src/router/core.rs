use crate::sandbox::{Handler, HandlerRegistry};
use crate::static_files::StaticFiles;
use percent_encoding::percent_decode_str;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Where a request path resolves to.
pub enum RouteTarget {
    /// A registered dynamic handler; dispatched through the sandbox.
    Handler(Arc<dyn Handler>),
    /// A file under the document root; streamed by the static responder.
    Static(PathBuf),
    /// Nothing matched, or the path escaped the document root.
    NotFound,
}

/// Maps request paths to handlers or static files.
///
/// Registered handler paths take precedence over the filesystem; everything
/// else is resolved against the document root with the canonicalization
/// guard in [`StaticFiles::resolve`].
pub struct Router {
    handlers: HandlerRegistry,
    statics: StaticFiles,
}

impl Router {
    pub fn new(handlers: HandlerRegistry, statics: StaticFiles) -> Self {
        Self { handlers, statics }
    }

    pub fn statics(&self) -> &StaticFiles {
        &self.statics
    }

    /// Resolve a raw (still percent-encoded) request path.
    pub fn route(&self, raw_path: &str) -> RouteTarget {
        let decoded = percent_decode_str(raw_path).decode_utf8_lossy();

        if let Some(handler) = self.handlers.get(&decoded) {
            debug!(path = %decoded, "matched dynamic handler");
            return RouteTarget::Handler(handler);
        }

        match self.statics.resolve(&decoded) {
            Some(file) => {
                debug!(path = %decoded, file = %file.display(), "matched static file");
                RouteTarget::Static(file)
            }
            None => RouteTarget::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::RequestContext;
    use std::fs;

    fn router_with(handler_path: &str) -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.html"), "<p>static</p>").unwrap();
        let mut handlers = HandlerRegistry::new();
        handlers.register(handler_path, |_ctx: &mut RequestContext| Ok(()));
        let statics = StaticFiles::new(dir.path()).unwrap();
        (dir, Router::new(handlers, statics))
    }

    #[test]
    fn handler_paths_take_precedence() {
        let (_dir, router) = router_with("/page.html");
        assert!(matches!(router.route("/page.html"), RouteTarget::Handler(_)));
    }

    #[test]
    fn static_fallback_and_not_found() {
        let (_dir, router) = router_with("/counter");
        assert!(matches!(router.route("/page.html"), RouteTarget::Static(_)));
        assert!(matches!(router.route("/missing"), RouteTarget::NotFound));
    }

    #[test]
    fn percent_encoded_paths_decode_before_lookup() {
        let (_dir, router) = router_with("/counter");
        assert!(matches!(router.route("/page%2Ehtml"), RouteTarget::Static(_)));
        // encoded traversal still rejected after decoding
        assert!(matches!(
            router.route("/%2E%2E/%2E%2E/etc/passwd"),
            RouteTarget::NotFound
        ));
    }
}
