//! HTTP service implementation.
//!
//! ## Structure
//!
//! - [`handler`] - routes, request handlers and the shared [`IdService`]
//!   state.
//! - [`error`] - mapping of allocation errors to HTTP responses.
//!
//! [`IdService`]: handler::IdService

pub mod error;
pub mod handler;
