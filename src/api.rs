//! REST client for the companion backend
//!
//! Wire types, error classification, and the `reqwest` implementation of
//! the backend traits the runtimes are written against.

mod client;
mod error;
pub mod types;

pub use client::HttpApi;
pub use error::{ApiError, ApiErrorKind};
pub use types::{AuthGrant, Credentials, ProfileDetails, Registration};
