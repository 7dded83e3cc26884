//! # fiberserve
//!
//! **fiberserve** is a single-process HTTP server built on the [`may`] coroutine
//! runtime. Every client connection is handled by its own lightweight,
//! cooperatively scheduled task, and every dynamic request runs inside an
//! isolated execution sandbox: its own copies of query/body/cookie data, its
//! own output buffer, and its own snapshot of the session. Concurrent requests
//! can never observe or corrupt each other's state.
//!
//! ## Architecture
//!
//! The library is organized into a handful of modules:
//!
//! - **[`server`]** - Listener, accept loop, HTTP request parser, connection
//!   state machine, and response writer
//! - **[`router`]** - Maps request paths to registered handlers or to files
//!   under the document root (with a canonicalization-based traversal guard)
//! - **[`sandbox`]** - The per-request [`sandbox::RequestContext`], the
//!   [`sandbox::Handler`] contract, and the isolation sequence that loads and
//!   commits session state around handler execution
//! - **[`session`]** - The process-wide session store and shared counters,
//!   the only cross-request mutable state
//! - **[`static_files`]** - Chunked static file streaming with extension-based
//!   content types
//! - **[`metrics`]** - Atomic request counters exposed at `/metrics`
//! - **[`runtime_config`]** - Environment-variable runtime tuning
//!
//! ## Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Acceptor as Acceptor<br/>(coroutine)
//!     participant Task as Connection Task<br/>(coroutine)
//!     participant Router
//!     participant Sandbox
//!     participant Store as SessionStore
//!
//!     Client->>Acceptor: TCP connect
//!     Acceptor->>Task: spawn per connection
//!     Task->>Task: read request bytes (suspend point)
//!     Task->>Task: parse method/path/headers/body
//!     Task->>Router: route(path)
//!     alt registered handler
//!         Router-->>Task: Handler
//!         Task->>Sandbox: invoke(handler, request)
//!         Sandbox->>Store: load session snapshot
//!         Sandbox->>Sandbox: run handler, capture output
//!         Sandbox->>Store: commit session (success only)
//!         Sandbox-->>Task: response
//!     else file under document root
//!         Router-->>Task: Static(path)
//!         Task->>Client: stream file in chunks
//!     else
//!         Router-->>Task: NotFound
//!         Task->>Client: 404
//!     end
//!     Task->>Client: write response, close
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use fiberserve::router::Router;
//! use fiberserve::sandbox::{HandlerRegistry, Sandbox};
//! use fiberserve::server::{AppService, HttpServer};
//! use fiberserve::session::{SessionStore, SharedState};
//! use fiberserve::static_files::StaticFiles;
//! use std::sync::Arc;
//!
//! let mut handlers = HandlerRegistry::new();
//! handlers.register("/hello", |ctx: &mut fiberserve::sandbox::RequestContext| {
//!     ctx.echo("<h1>hello</h1>");
//!     Ok(())
//! });
//!
//! let statics = StaticFiles::new("public").unwrap();
//! let sessions = Arc::new(SessionStore::new());
//! let shared = Arc::new(SharedState::new());
//! let service = AppService::new(
//!     Router::new(handlers, statics),
//!     Sandbox::new(sessions, shared),
//! );
//! let handle = HttpServer(service).start("127.0.0.1:8080").unwrap();
//! handle.join().unwrap();
//! ```
//!
//! ## Runtime Considerations
//!
//! fiberserve uses the `may` coroutine runtime, not tokio or async-std:
//!
//! - One coroutine per connection; suspension happens only at socket
//!   accept/read/write, inside the `may` reactor
//! - Handler bodies are synchronous and run to completion once started; a
//!   handler must not perform I/O that yields to the scheduler
//! - Coroutine stack size, read timeout, and request size limits are
//!   configurable via `FIBERSERVE_*` environment variables (see
//!   [`runtime_config`])
//! - Connections are closed after each response (no keep-alive)

mod ids;
pub mod metrics;
pub mod router;
pub mod runtime_config;
pub mod sandbox;
pub mod server;
pub mod session;
pub mod static_files;

pub use router::{RouteTarget, Router};
pub use sandbox::{Handler, HandlerRegistry, RequestContext, Sandbox};
pub use server::{AppService, HttpServer, ServerHandle};
pub use session::{SessionStore, SharedState};
