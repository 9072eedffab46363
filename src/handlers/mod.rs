//! HTTP handlers, one module per resource.
//!
//! Every handler resolves the caller, consults its resource's [`Policy`](crate::permissions::Policy),
//! and only then reads the request body. A body that fails to parse or validate is
//! reported after a permission denial or a missing object, never before.

pub mod auth;
pub mod catalog;
pub mod comments;
pub mod reviews;
pub mod titles;
pub mod users;
