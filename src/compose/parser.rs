//! Compose manifest codec

use super::config::Manifest;
use crate::error::{ManifoldError, Result};
use std::path::{Path, PathBuf};

/// Default compose file names
pub const DEFAULT_COMPOSE_FILES: &[&str] = &[
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

/// Decodes and encodes compose manifests
pub struct ManifestCodec;

impl ManifestCodec {
    /// Find compose file in directory
    pub fn find_compose_file(dir: &Path) -> Option<PathBuf> {
        for name in DEFAULT_COMPOSE_FILES {
            let path = dir.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        None
    }

    /// Parse compose file from path
    pub async fn read_file(path: &Path) -> Result<Manifest> {
        let content = tokio::fs::read_to_string(path).await?;
        tracing::debug!("Read {} bytes from {}", content.len(), path.display());

        Self::parse_str(&content)
    }

    /// Parse compose file from string
    pub fn parse_str(content: &str) -> Result<Manifest> {
        serde_yaml::from_str(content)
            .map_err(|e| ManifoldError::ComposeParse(format!("Failed to parse YAML: {}", e)))
    }

    /// Encode a manifest as YAML
    pub fn to_string(manifest: &Manifest) -> Result<String> {
        serde_yaml::to_string(manifest).map_err(|e| ManifoldError::Yaml(e.to_string()))
    }

    /// Write a manifest to path, replacing its contents
    pub async fn write_file(path: &Path, manifest: &Manifest) -> Result<()> {
        let content = Self::to_string(manifest)?;
        tokio::fs::write(path, content).await?;
        tracing::debug!("Wrote manifest to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_simple_compose() {
        let yaml = r#"
version: "3.8"
services:
  web:
    image: nginx:latest
    ports:
      - "80:80"
  db:
    image: postgres:13
    environment:
      POSTGRES_PASSWORD: secret
"#;

        let manifest = ManifestCodec::parse_str(yaml).unwrap();
        let services = manifest.services.unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services.get_index(0).unwrap().0, "web");
        assert_eq!(services.get_index(1).unwrap().0, "db");
        assert!(manifest.extra.contains_key("version"));
    }

    #[test]
    fn test_parse_without_services() {
        let manifest = ManifestCodec::parse_str("{}").unwrap();
        assert!(manifest.services.is_none());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = ManifestCodec::parse_str("services: [unclosed");
        assert!(matches!(result, Err(ManifoldError::ComposeParse(_))));
    }

    #[test]
    fn test_encode_keeps_service_order() {
        let yaml = "services:\n  zeta:\n    image: a\n  alpha:\n    image: b\n";
        let manifest = ManifestCodec::parse_str(yaml).unwrap();
        let out = ManifestCodec::to_string(&manifest).unwrap();
        let zeta = out.find("zeta").unwrap();
        let alpha = out.find("alpha").unwrap();
        assert!(zeta < alpha);

        let again = ManifestCodec::parse_str(&out).unwrap();
        assert_eq!(again, manifest);
    }

    #[test]
    fn test_find_compose_file() {
        let temp = tempdir().unwrap();
        assert!(ManifestCodec::find_compose_file(temp.path()).is_none());

        std::fs::write(temp.path().join("docker-compose.yml"), "services: {}\n").unwrap();
        let found = ManifestCodec::find_compose_file(temp.path()).unwrap();
        assert!(found.ends_with("docker-compose.yml"));
    }

    #[tokio::test]
    async fn test_write_and_read_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("compose.yaml");

        let manifest = ManifestCodec::parse_str("services:\n  web:\n    image: nginx\n").unwrap();
        ManifestCodec::write_file(&path, &manifest).await.unwrap();

        let read = ManifestCodec::read_file(&path).await.unwrap();
        assert_eq!(read, manifest);
    }
}
