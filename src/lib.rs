//! Manifold - compose manifest normalization for a multi-tenant platform
//!
//! Manifold takes a user-supplied compose manifest and rewrites it so that
//! it can be built and deployed next to other applications:
//!
//! - Container names prefixed with the application id
//! - Volumes namespaced per application
//! - Secrets injected as environment and build arguments
//! - Every service attached to the shared platform network
//! - Platform restart and deploy policy

pub mod compose;
pub mod deploy;
pub mod error;

pub use error::{ManifoldError, Result};
