//! Compose manifest types
//!
//! Only the fields the normalizer rewrites are modelled explicitly. Every
//! other key is kept in a flattened `extra` mapping so that a manifest
//! survives a decode/normalize/encode cycle without losing user settings.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;

/// Compose manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<IndexMap<String, ServiceSpec>>,
    /// Top-level volumes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<IndexMap<String, VolumeSpec>>,
    /// Top-level networks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<IndexMap<String, NetworkSpec>>,
    /// Everything else (version, name, secrets, configs, x-* keys)
    #[serde(flatten)]
    pub extra: Mapping,
}

/// Service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Container name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// Environment variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentSpec>,
    /// Build configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,
    /// Labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelsSpec>,
    /// Volume mounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<VolumeMount>>,
    /// Networks to connect to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<ServiceNetworks>,
    /// Restart policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    /// Deploy configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeploySpec>,
    /// Exposed ports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose: Option<Vec<ExposedPort>>,
    /// Fields the normalizer leaves untouched
    #[serde(flatten)]
    pub extra: Mapping,
}

/// Scalar value in a key/value mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Bool(b) => write!(f, "{}", b),
            ScalarValue::Int(i) => write!(f, "{}", i),
            ScalarValue::Float(v) => write!(f, "{}", v),
            ScalarValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// Environment (or build argument) source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvironmentSpec {
    /// Array of KEY=value strings
    List(Vec<String>),
    /// Map of key to value
    Map(IndexMap<String, Option<ScalarValue>>),
}

/// Build arguments share the environment shapes
pub type ArgsSpec = EnvironmentSpec;

impl EnvironmentSpec {
    /// Resolve to the canonical ordered `KEY=VALUE` sequence.
    ///
    /// Map entries with a null value become a bare `KEY`, which compose
    /// treats as a pass-through of the host variable.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            EnvironmentSpec::List(items) => items.clone(),
            EnvironmentSpec::Map(map) => map
                .iter()
                .map(|(key, value)| match value {
                    Some(v) => format!("{}={}", key, v),
                    None => key.clone(),
                })
                .collect(),
        }
    }
}

/// Build configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
#[allow(clippy::large_enum_variant)]
pub enum BuildSpec {
    /// Simple context path
    Context(String),
    /// Full build configuration
    Full(BuildDetails),
}

impl BuildSpec {
    /// Promote a bare context path to the structured form
    pub fn into_details(self) -> BuildDetails {
        match self {
            BuildSpec::Context(context) => BuildDetails {
                context: Some(context),
                ..Default::default()
            },
            BuildSpec::Full(details) => details,
        }
    }
}

/// Full build configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildDetails {
    /// Build context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Build arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<ArgsSpec>,
    /// Dockerfile, target, cache settings and the rest
    #[serde(flatten)]
    pub extra: Mapping,
}

/// Labels configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelsSpec {
    /// Array of "key=value" strings
    List(Vec<String>),
    /// Map of key to value
    Map(IndexMap<String, Option<ScalarValue>>),
}

/// Volume mount on a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VolumeMount {
    /// Short syntax: "source:target:mode"
    Short(String),
    /// Long syntax, kept verbatim
    Long(Mapping),
}

/// Networks a service joins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceNetworks {
    /// Array of network names
    List(Vec<String>),
    /// Map of network name to per-service settings
    Map(IndexMap<String, Option<Value>>),
}

impl ServiceNetworks {
    /// Network names in declaration order
    pub fn names(&self) -> Vec<String> {
        match self {
            ServiceNetworks::List(names) => names.clone(),
            ServiceNetworks::Map(map) => map.keys().cloned().collect(),
        }
    }
}

/// Exposed port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExposedPort {
    /// Port number
    Number(u16),
    /// Port, range or port/protocol string
    Text(String),
}

/// Deploy configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploySpec {
    /// Restart policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<RestartPolicySpec>,
    /// Replicas, resources, placement and the rest
    #[serde(flatten)]
    pub extra: Mapping,
}

/// Restart policy configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestartPolicySpec {
    /// Condition (none, on-failure, any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Delay between retries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<String>,
    /// Maximum attempts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Window for counting retries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
}

/// External resource marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalSpec {
    /// Boolean
    Bool(bool),
    /// With name
    Named { name: String },
}

/// Top-level volume or network declaration
///
/// A bare key (`data:` with no body) decodes to the empty declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceSpec {
    /// Name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// External resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalSpec>,
    /// Driver
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    /// Driver options, labels and the rest
    #[serde(flatten)]
    pub extra: Mapping,
}

/// Top-level volume declaration
pub type VolumeSpec = ResourceSpec;

/// Top-level network declaration
pub type NetworkSpec = ResourceSpec;

impl ResourceSpec {
    /// Declaration that only carries a name
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Declaration of a pre-existing resource
    pub fn external() -> Self {
        Self {
            external: Some(ExternalSpec::Bool(true)),
            ..Default::default()
        }
    }
}

impl<'de> Deserialize<'de> for ResourceSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Fields {
            #[serde(default)]
            name: Option<String>,
            #[serde(default)]
            external: Option<ExternalSpec>,
            #[serde(default)]
            driver: Option<String>,
            #[serde(flatten)]
            extra: Mapping,
        }

        Ok(Option::<Fields>::deserialize(deserializer)?
            .map(|f| ResourceSpec {
                name: f.name,
                external: f.external,
                driver: f.driver,
                extra: f.extra,
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_map_to_list() {
        let yaml = r#"
FOO: bar
PORT: 8080
DEBUG: true
PASSTHROUGH:
"#;
        let env: EnvironmentSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            env.to_list(),
            vec!["FOO=bar", "PORT=8080", "DEBUG=true", "PASSTHROUGH"]
        );
    }

    #[test]
    fn test_environment_list_is_kept() {
        let env: EnvironmentSpec = serde_yaml::from_str("[\"A=1\", \"B=2\"]").unwrap();
        assert_eq!(env.to_list(), vec!["A=1", "B=2"]);
    }

    #[test]
    fn test_build_context_promotion() {
        let build: BuildSpec = serde_yaml::from_str("./app").unwrap();
        let details = build.into_details();
        assert_eq!(details.context.as_deref(), Some("./app"));
        assert!(details.args.is_none());
    }

    #[test]
    fn test_bare_resource_declaration() {
        let yaml = r#"
data:
shared:
  external: true
"#;
        let volumes: IndexMap<String, VolumeSpec> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(volumes["data"], ResourceSpec::default());
        assert_eq!(volumes["shared"], ResourceSpec::external());
    }

    #[test]
    fn test_unknown_service_fields_survive() {
        let yaml = r#"
image: nginx
ports:
  - "80:80"
"#;
        let service: ServiceSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            service.extra.get("image"),
            Some(&Value::String("nginx".to_string()))
        );

        let out = serde_yaml::to_string(&service).unwrap();
        assert!(out.contains("image: nginx"));
        assert!(out.contains("80:80"));
    }
}
