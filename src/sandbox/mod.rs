//! # Execution Sandbox
//!
//! The sandbox gives every dynamic request a fully isolated execution
//! context. Correctness of the isolation invariant depends on the exact
//! sequencing documented on [`Sandbox::invoke`]: context allocation, session
//! resolution, output capture, handler execution with fault containment,
//! conditional session write-back, response assembly.
//!
//! Two properties make the isolation hold:
//!
//! - A [`RequestContext`] is owned by exactly one connection task and is
//!   never reachable from another; query/body/cookie data is deep-copied in,
//!   and the session is a snapshot, not a reference into the store.
//! - The invoke sequence contains no suspension point. Handlers are
//!   synchronous, so the read-modify-write of a session id cannot interleave
//!   with another task's on the same coroutine scheduler thread; commits
//!   themselves are atomic per id.

mod context;
mod core;
mod handler;

pub use context::{CookieOptions, RequestContext};
pub use core::{Sandbox, SandboxResponse};
pub use handler::{Handler, HandlerRegistry};
