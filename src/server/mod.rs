//! # Server Module
//!
//! The network-facing half of the crate: the listener and accept loop
//! ([`http_server`]), the request reader/parser ([`request`]), the
//! per-connection state machine ([`service`]), and the response writer
//! ([`response`]).
//!
//! Each connection is handled end-to-end by one coroutine:
//! `Accepted → Reading → Parsed → Handling → Writing → Closed`, with a
//! `Failed` exit from any state that still delivers a best-effort error
//! response. Suspension happens only while awaiting socket readiness; once a
//! handler starts it runs to completion.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_cookies, parse_query_params, parse_request, Body, ParseError, ParsedRequest};
pub use response::{error_page, status_reason, write_response};
pub use service::{health_endpoint, metrics_endpoint, AppService};
