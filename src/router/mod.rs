//! # Router Module
//!
//! Resolves request paths to a [`RouteTarget`]: a registered dynamic handler,
//! a file under the document root, or not-found.
//!
//! Dynamic routes are compiled handler functions registered ahead of time in
//! a [`crate::sandbox::HandlerRegistry`]; there is no runtime discovery of
//! handler code. Static resolution percent-decodes the path, canonicalizes
//! it, and requires the canonical document root as a strict prefix, so
//! traversal through `..` segments or symlinks can never leave the root.

mod core;

pub use core::{RouteTarget, Router};
