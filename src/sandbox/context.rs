use crate::server::request::{Body, ParsedRequest};
use crate::session::{SessionData, SharedState};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use url::form_urlencoded;

/// Optional attributes for an outgoing cookie.
///
/// `expires` takes a preformatted HTTP date (`Wdy, DD-Mon-YYYY HH:MM:SS GMT`);
/// `max_age` is the simpler alternative when a relative lifetime is enough.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub path: String,
    pub expires: Option<String>,
    pub max_age: Option<u64>,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            expires: None,
            max_age: None,
            domain: None,
            secure: false,
            http_only: false,
        }
    }
}

/// The isolated per-request state exposed to a handler.
///
/// A context is created when a dynamic route is matched and destroyed after
/// the response is written. It owns deep copies of the request's query, body,
/// and cookie data plus a snapshot of the session, so nothing a handler reads
/// or writes aliases another task's state. The context is the handler's only
/// channel to the outside world.
pub struct RequestContext {
    query: HashMap<String, String>,
    post: HashMap<String, Value>,
    cookies: HashMap<String, String>,
    raw_body: Vec<u8>,
    session_id: String,
    session: SessionData,
    shared: Arc<SharedState>,
    output: Vec<u8>,
    status: u16,
    headers: Vec<(String, String)>,
    set_cookies: Vec<String>,
}

impl RequestContext {
    /// Build a context from a parsed request, deep-copying everything the
    /// handler may touch. The session fields start empty; the sandbox fills
    /// them in before the handler runs.
    pub(crate) fn from_request(req: &ParsedRequest, shared: Arc<SharedState>) -> Self {
        let (post, raw_body) = match &req.body {
            Body::Form(map) => (
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
                Vec::new(),
            ),
            Body::Json(Value::Object(obj)) => (
                obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                Vec::new(),
            ),
            Body::Json(other) => (HashMap::new(), other.to_string().into_bytes()),
            Body::Raw(bytes) => (HashMap::new(), bytes.clone()),
            Body::Empty => (HashMap::new(), Vec::new()),
        };
        Self {
            query: req.query_params.clone(),
            post,
            cookies: req.cookies.clone(),
            raw_body,
            session_id: String::new(),
            session: SessionData::new(),
            shared,
            output: Vec::new(),
            status: 200,
            headers: vec![
                (
                    "Content-Type".to_string(),
                    "text/html; charset=UTF-8".to_string(),
                ),
                ("Connection".to_string(), "close".to_string()),
            ],
            set_cookies: Vec::new(),
        }
    }

    // request data, read-only

    /// A query parameter by name.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// A decoded body field by name (form fields or JSON object members).
    pub fn post(&self, name: &str) -> Option<&Value> {
        self.post.get(name)
    }

    /// A request cookie by name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// The raw request body when it was not a form or JSON object.
    pub fn raw_body(&self) -> &[u8] {
        &self.raw_body
    }

    // session

    /// Id of the session bound to this request.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(crate) fn bind_session(&mut self, id: String, data: SessionData) {
        self.session_id = id;
        self.session = data;
    }

    /// Read access to the session snapshot.
    pub fn session(&self) -> &SessionData {
        &self.session
    }

    /// Mutable access to the session snapshot. Changes are committed to the
    /// store only if the handler returns successfully.
    pub fn session_mut(&mut self) -> &mut SessionData {
        &mut self.session
    }

    pub(crate) fn take_session(&mut self) -> SessionData {
        std::mem::take(&mut self.session)
    }

    /// Cross-request shared counters and container.
    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    // response construction

    /// Append text to the captured output. Nothing is written to the network
    /// until the handler finishes.
    pub fn echo(&mut self, content: &str) {
        self.output.extend_from_slice(content.as_bytes());
    }

    /// Append raw bytes to the captured output.
    pub fn write_bytes(&mut self, content: &[u8]) {
        self.output.extend_from_slice(content);
    }

    /// Set the response status code (default 200).
    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Set or overwrite a response header, keeping its original position.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let Some(entry) = self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            entry.1 = value.to_string();
        } else {
            self.headers.push((name.to_string(), value.to_string()));
        }
    }

    /// Queue an outgoing cookie. Name and value are form-urlencoded like the
    /// request side expects; attributes follow [`CookieOptions`].
    pub fn set_cookie(&mut self, name: &str, value: &str, opts: CookieOptions) {
        let enc = |s: &str| form_urlencoded::byte_serialize(s.as_bytes()).collect::<String>();
        let mut cookie = format!("{}={}", enc(name), enc(value));
        if let Some(expires) = &opts.expires {
            cookie.push_str("; Expires=");
            cookie.push_str(expires);
        }
        if let Some(max_age) = opts.max_age {
            cookie.push_str("; Max-Age=");
            cookie.push_str(&max_age.to_string());
        }
        if let Some(domain) = &opts.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if !opts.path.is_empty() {
            cookie.push_str("; Path=");
            cookie.push_str(&opts.path);
        }
        if opts.secure {
            cookie.push_str("; Secure");
        }
        if opts.http_only {
            cookie.push_str("; HttpOnly");
        }
        self.set_cookies.push(cookie);
    }

    pub(crate) fn into_parts(self) -> (u16, Vec<(String, String)>, Vec<String>, Vec<u8>) {
        (self.status, self.headers, self.set_cookies, self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn empty_ctx() -> RequestContext {
        let req = ParsedRequest::empty_for_tests();
        RequestContext::from_request(&req, Arc::new(SharedState::new()))
    }

    #[test]
    fn output_accumulates_in_order() {
        let mut ctx = empty_ctx();
        ctx.echo("a");
        ctx.echo("b");
        ctx.write_bytes(b"c");
        let (_, _, _, output) = ctx.into_parts();
        assert_eq!(output, b"abc");
    }

    #[test]
    fn set_header_overwrites_in_place() {
        let mut ctx = empty_ctx();
        ctx.set_header("content-type", "application/json");
        ctx.set_header("X-Custom", "1");
        let (_, headers, _, _) = ctx.into_parts();
        assert_eq!(headers[0].1, "application/json");
        assert_eq!(headers[2], ("X-Custom".to_string(), "1".to_string()));
    }

    #[test]
    fn cookie_attributes_render() {
        let mut ctx = empty_ctx();
        ctx.set_cookie(
            "token",
            "v 1",
            CookieOptions {
                max_age: Some(60),
                secure: true,
                http_only: true,
                ..CookieOptions::default()
            },
        );
        let (_, _, cookies, _) = ctx.into_parts();
        assert_eq!(cookies[0], "token=v+1; Max-Age=60; Path=/; Secure; HttpOnly");
    }

    #[test]
    fn session_mutation_stays_local_until_taken() {
        let mut ctx = empty_ctx();
        ctx.bind_session("id".into(), SessionData::new());
        ctx.session_mut().insert("count".into(), json!(3));
        let taken = ctx.take_session();
        assert_eq!(taken.get("count"), Some(&json!(3)));
        assert!(ctx.session().is_empty());
    }
}
