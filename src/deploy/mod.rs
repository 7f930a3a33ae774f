//! Deployment collaborators
//!
//! The context a manifest is normalized for, the secret and policy
//! providers the normalizer consults, and the pipeline that drives a build.

pub mod context;
pub mod pipeline;
pub mod policy;
pub mod secrets;

pub use context::{DeploymentContext, Secret, ServicePortConfig};
pub use pipeline::{BuildDriver, BuildRequest, ComposePipeline, LogSink, PipelineRequest};
pub use policy::{DefaultPolicy, PolicyProvider};
pub use secrets::{PlatformSecrets, SecretExpander, SecretScope};
