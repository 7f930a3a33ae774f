//! Compose manifest handling
//!
//! This module models compose manifests and rewrites them for deployment
//! on the shared platform.

pub mod config;
pub mod entry;
pub mod normalizer;
pub mod parser;

pub use config::{Manifest, ServiceSpec};
pub use normalizer::{ManifestNormalizer, NormalizedManifest};
pub use parser::ManifestCodec;
