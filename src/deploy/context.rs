//! Deployment context supplied by the platform

use crate::compose::entry::VolumeEntry;
use crate::error::{ManifoldError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Secret attached to an application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    /// Variable name
    pub name: String,
    /// Variable value
    pub value: String,
    /// Also injected as a build argument
    #[serde(default)]
    pub is_build_secret: bool,
    /// Only applies to preview (pull/merge request) deployments
    #[serde(default, alias = "isPRMRSecret")]
    pub is_preview_secret: bool,
}

impl Secret {
    /// Create a runtime-only secret
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            is_build_secret: false,
            is_preview_secret: false,
        }
    }

    /// Also inject at build time
    pub fn build(mut self) -> Self {
        self.is_build_secret = true;
        self
    }

    /// Restrict to preview deployments
    pub fn preview(mut self) -> Self {
        self.is_preview_secret = true;
        self
    }
}

/// Per-service port settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePortConfig {
    /// Port to expose on the shared network
    #[serde(default)]
    pub port: Option<u16>,
}

/// Everything the normalizer needs to know about the target deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentContext {
    /// Application identifier, prefixes container and volume names
    pub application_id: String,
    /// Shared platform network every service joins
    pub network: String,
    /// External `source:target` mounts added to every service
    #[serde(default)]
    pub volumes: Vec<String>,
    /// Labels stamped on every service
    #[serde(default)]
    pub labels: Vec<String>,
    /// Application secrets
    #[serde(default)]
    pub secrets: Vec<Secret>,
    /// Pull/merge request identifier for preview deployments
    #[serde(default, alias = "pullmergeRequestId")]
    pub preview_id: Option<String>,
    /// Port settings keyed by service name
    #[serde(default, alias = "dockerComposeConfiguration")]
    pub ports_per_service: IndexMap<String, ServicePortConfig>,
}

impl DeploymentContext {
    /// Create a context for an application on a network
    pub fn new(application_id: &str, network: &str) -> Self {
        Self {
            application_id: application_id.to_string(),
            network: network.to_string(),
            ..Default::default()
        }
    }

    /// Add an external volume mount
    pub fn volume(mut self, mount: &str) -> Self {
        self.volumes.push(mount.to_string());
        self
    }

    /// Add a label
    pub fn label(mut self, label: &str) -> Self {
        self.labels.push(label.to_string());
        self
    }

    /// Add a secret
    pub fn secret(mut self, secret: Secret) -> Self {
        self.secrets.push(secret);
        self
    }

    /// Set the preview identifier
    pub fn preview_id(mut self, id: &str) -> Self {
        self.preview_id = Some(id.to_string());
        self
    }

    /// Expose a port for a service
    pub fn port(mut self, service: &str, port: u16) -> Self {
        self.ports_per_service
            .insert(service.to_string(), ServicePortConfig { port: Some(port) });
        self
    }

    /// Configured port for a service, if any
    pub fn port_for(&self, service: &str) -> Option<u16> {
        self.ports_per_service.get(service).and_then(|c| c.port)
    }

    /// Load a context from a YAML or JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let context: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            _ => serde_yaml::from_str(&content)
                .map_err(|e| ManifoldError::InvalidConfig(format!("{}: {}", path.display(), e)))?,
        };

        context.validate()?;
        Ok(context)
    }

    /// Check the fields the normalizer relies on
    pub fn validate(&self) -> Result<()> {
        if self.application_id.is_empty() {
            return Err(ManifoldError::InvalidConfig(
                "applicationId must not be empty".to_string(),
            ));
        }
        if self.network.is_empty() {
            return Err(ManifoldError::InvalidConfig(
                "network must not be empty".to_string(),
            ));
        }
        self.volume_mounts()?;
        Ok(())
    }

    /// Parsed external mounts; each needs both a source and a target
    pub fn volume_mounts(&self) -> Result<Vec<VolumeEntry>> {
        self.volumes
            .iter()
            .map(|mount| {
                let entry = VolumeEntry::parse(mount)
                    .map_err(|m| ManifoldError::InvalidConfig(format!("volume {}", m)))?;
                if entry.target.is_none() {
                    return Err(ManifoldError::InvalidConfig(format!(
                        "volume mount '{}' has no target path",
                        mount
                    )));
                }
                Ok(entry)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_yaml_context() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("context.yaml");
        std::fs::write(
            &path,
            r#"
applicationId: app1
network: net1
volumes:
  - "shared:/shared"
labels:
  - "platform.managed=true"
secrets:
  - name: TOKEN
    value: abc
    isBuildSecret: true
pullmergeRequestId: "42"
dockerComposeConfiguration:
  web:
    port: 3000
"#,
        )
        .unwrap();

        let context = DeploymentContext::load(&path).unwrap();
        assert_eq!(context.application_id, "app1");
        assert_eq!(context.volumes, vec!["shared:/shared"]);
        assert!(context.secrets[0].is_build_secret);
        assert_eq!(context.preview_id.as_deref(), Some("42"));
        assert_eq!(context.port_for("web"), Some(3000));
        assert_eq!(context.port_for("db"), None);
    }

    #[test]
    fn test_load_json_context() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("context.json");
        std::fs::write(&path, r#"{"applicationId":"app1","network":"net1"}"#).unwrap();

        let context = DeploymentContext::load(&path).unwrap();
        assert_eq!(context, DeploymentContext::new("app1", "net1"));
    }

    #[test]
    fn test_validate_rejects_malformed_mounts() {
        for mount in ["a:b:c:d", "shared:", "shared"] {
            let context = DeploymentContext::new("app1", "net1").volume(mount);
            match context.validate() {
                Err(ManifoldError::InvalidConfig(message)) => assert!(message.contains(mount)),
                other => panic!("unexpected result for {}: {:?}", mount, other),
            }
        }

        let context = DeploymentContext::new("app1", "net1").volume("shared:/shared:ro");
        assert_eq!(context.volume_mounts().unwrap()[0].source, "shared");
    }

    #[test]
    fn test_validate_rejects_empty_network() {
        let context = DeploymentContext::new("app1", "");
        assert!(matches!(
            context.validate(),
            Err(ManifoldError::InvalidConfig(_))
        ));
    }
}
