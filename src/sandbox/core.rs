use super::context::{CookieOptions, RequestContext};
use super::handler::Handler;
use crate::server::request::ParsedRequest;
use crate::session::{mint_session_id, SessionStore, SharedState, SESSION_COOKIE};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Response assembled from a finished request context.
///
/// Status, headers, and cookies come straight from the context; the body is
/// the captured output. Serialization to the wire lives in
/// [`crate::server::response`].
#[derive(Debug)]
pub struct SandboxResponse {
    pub status: u16,
    /// Headers in insertion order, defaults first.
    pub headers: Vec<(String, String)>,
    /// One `Set-Cookie` line is emitted per entry, in order.
    pub cookies: Vec<String>,
    pub body: Vec<u8>,
}

impl SandboxResponse {
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Executes handlers inside isolated per-request contexts.
///
/// The sandbox owns the only references handlers get to shared state: the
/// session store (through load/commit on the context's snapshot) and the
/// shared counters (by `Arc`). Everything else a handler touches lives in the
/// context and dies with it.
pub struct Sandbox {
    sessions: Arc<SessionStore>,
    shared: Arc<SharedState>,
}

impl Sandbox {
    pub fn new(sessions: Arc<SessionStore>, shared: Arc<SharedState>) -> Self {
        Self { sessions, shared }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Run `handler` for `req` and return the response.
    ///
    /// The sequence is fixed and contains no suspension point, so no other
    /// task can interleave with a mutation of this context:
    ///
    /// 1. allocate a fresh context with deep copies of query/body/cookies
    /// 2. resolve the session: a known `SESSIONID` cookie loads a snapshot of
    ///    that session, otherwise a new id is minted, registered, and queued
    ///    as a `Set-Cookie`
    /// 3. output capture begins (the context's buffer)
    /// 4. the handler runs; an `Err` or panic is converted into diagnostic
    ///    output plus status 500
    /// 5. on success only, the session snapshot is committed back under its
    ///    id (last-writer-wins for that id, other sessions untouched)
    /// 6. the response is built and the context dropped
    pub fn invoke(&self, handler: &dyn Handler, req: &ParsedRequest) -> SandboxResponse {
        let mut ctx = RequestContext::from_request(req, Arc::clone(&self.shared));

        match req.cookies.get(SESSION_COOKIE) {
            Some(id) if !id.is_empty() && self.sessions.contains(id) => {
                debug!(session_id = %id, "session resumed");
                ctx.bind_session(id.clone(), self.sessions.load(id));
            }
            _ => {
                let id = mint_session_id();
                self.sessions.register(&id);
                ctx.set_cookie(SESSION_COOKIE, &id, CookieOptions::default());
                debug!(session_id = %id, "session created");
                ctx.bind_session(id, Default::default());
            }
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| handler.handle(&mut ctx)));

        match outcome {
            Ok(Ok(())) => {
                let id = ctx.session_id().to_string();
                self.sessions.commit(&id, ctx.take_session());
            }
            Ok(Err(err)) => {
                error!(error = %err, "handler returned error");
                ctx.set_status(500);
                let detail = html_escape(&err.to_string());
                ctx.echo(&format!("<h1>Handler Error</h1><p>{detail}</p>"));
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(panic = %message, "handler panicked");
                ctx.set_status(500);
                let detail = html_escape(&message);
                ctx.echo(&format!("<h1>Handler Error</h1><p>{detail}</p>"));
            }
        }

        let (status, headers, cookies, body) = ctx.into_parts();
        info!(status, body_bytes = body.len(), "sandbox finished");
        SandboxResponse {
            status,
            headers,
            cookies,
            body,
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Minimal HTML escaping for diagnostic text embedded in error pages.
pub(crate) fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
