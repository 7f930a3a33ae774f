//! Manifest normalization
//!
//! Rewrites every service of a compose manifest so that it can run next to
//! other applications on a shared platform: container names and volumes are
//! prefixed with the application id, platform labels and secrets are
//! injected, every service joins the shared network and gets the platform
//! restart policy.

use super::config::{
    BuildSpec, EnvironmentSpec, ExposedPort, LabelsSpec, Manifest, NetworkSpec, ServiceNetworks,
    ServiceSpec, VolumeMount, VolumeSpec,
};
use super::entry::{KeyValue, VolumeEntry};
use crate::deploy::context::DeploymentContext;
use crate::deploy::policy::{DefaultPolicy, PolicyProvider, ServicePolicy};
use crate::deploy::secrets::{PlatformSecrets, SecretExpander, SecretScope};
use crate::error::{ManifoldError, Result};
use indexmap::IndexMap;

/// Result of a normalization run
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedManifest {
    /// Rewritten manifest
    pub manifest: Manifest,
    /// Top-level volumes declared by the run
    pub volumes: IndexMap<String, VolumeSpec>,
    /// Top-level networks declared by the run, shared network included
    pub networks: IndexMap<String, NetworkSpec>,
}

/// Rewrites compose manifests for the platform
#[derive(Debug, Clone, Default)]
pub struct ManifestNormalizer<S = PlatformSecrets, P = DefaultPolicy> {
    secrets: S,
    policy: P,
}

impl ManifestNormalizer {
    /// Normalizer with the platform secret expansion and default policy
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: SecretExpander, P: PolicyProvider> ManifestNormalizer<S, P> {
    /// Normalizer with custom collaborators
    pub fn with_collaborators(secrets: S, policy: P) -> Self {
        Self { secrets, policy }
    }

    /// Normalize `manifest` for `context`.
    ///
    /// The input is left untouched; the rewritten copy is returned together
    /// with the top-level volumes and networks that were declared.
    pub fn normalize(
        &self,
        manifest: &Manifest,
        context: &DeploymentContext,
    ) -> Result<NormalizedManifest> {
        match &manifest.services {
            Some(services) if !services.is_empty() => {}
            _ => {
                return Err(ManifoldError::Validation(
                    "No services found in compose file".to_string(),
                ))
            }
        }

        let (envs, build_envs) = if context.secrets.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            let preview_id = context.preview_id.as_deref();
            (
                self.secrets
                    .expand(&context.secrets, preview_id, SecretScope::Runtime, None, false),
                // Unquoted, unlike the platform's compose call: quotes would reach the build verbatim
                self.secrets
                    .expand(&context.secrets, preview_id, SecretScope::BuildTime, None, false),
            )
        };

        let mut run = Run {
            context,
            envs,
            build_envs,
            policy: self.policy.policy(&context.network),
            namespaced: manifest
                .volumes
                .iter()
                .flatten()
                .filter(|(key, spec)| {
                    key.starts_with(&context.application_id)
                        && spec.name.as_deref() == Some(key.as_str())
                })
                .map(|(key, _)| key.clone())
                .collect(),
            volumes: IndexMap::new(),
            networks: IndexMap::new(),
        };

        for entry in context.volume_mounts()? {
            if is_named_volume(&entry.source) {
                run.volumes
                    .insert(entry.source.clone(), VolumeSpec::named(&entry.source));
            }
        }

        let mut manifest = manifest.clone();
        if let Some(services) = manifest.services.as_mut() {
            for (name, service) in services.iter_mut() {
                run.service(name, service)?;
            }
        }

        if !run.volumes.is_empty() {
            manifest.volumes = Some(run.volumes.clone());
        }
        run.networks
            .insert(context.network.clone(), NetworkSpec::external());
        manifest.networks = Some(run.networks.clone());

        tracing::info!(
            application = %context.application_id,
            services = manifest.services.as_ref().map_or(0, |s| s.len()),
            volumes = run.volumes.len(),
            networks = run.networks.len(),
            "Normalized compose manifest"
        );

        Ok(NormalizedManifest {
            manifest,
            volumes: run.volumes,
            networks: run.networks,
        })
    }
}

/// State shared by every service of one run
struct Run<'a> {
    context: &'a DeploymentContext,
    envs: Vec<String>,
    build_envs: Vec<String>,
    policy: ServicePolicy,
    /// Volumes a previous run already prefixed
    namespaced: Vec<String>,
    volumes: IndexMap<String, VolumeSpec>,
    networks: IndexMap<String, NetworkSpec>,
}

impl Run<'_> {
    fn service(&mut self, name: &str, service: &mut ServiceSpec) -> Result<()> {
        tracing::debug!("Normalizing service {}", name);

        service.container_name = Some(format!("{}-{}", self.context.application_id, name));

        self.environment(name, service)?;
        self.build(name, service)?;

        service.labels = Some(LabelsSpec::List(self.context.labels.clone()));

        self.volume_mounts(name, service)?;

        if let Some(port) = self.context.port_for(name) {
            service.expose = Some(vec![ExposedPort::Number(port)]);
        }

        self.join_networks(service);

        service.restart = Some(self.policy.restart.clone());
        service.deploy = Some(self.policy.deploy.clone());

        Ok(())
    }

    /// Existing entries first, runtime secrets after them
    fn environment(&self, name: &str, service: &mut ServiceSpec) -> Result<()> {
        let mut environment = service
            .environment
            .as_ref()
            .map(EnvironmentSpec::to_list)
            .unwrap_or_default();

        for entry in &environment {
            KeyValue::parse(entry).map_err(|m| ManifoldError::malformed(name, "environment", m))?;
        }

        environment.extend(self.envs.iter().cloned());
        service.environment = Some(EnvironmentSpec::List(environment));
        Ok(())
    }

    /// Build secrets first; an explicit arg replaces a secret with the same
    /// key in place, and the first explicit arg per key wins.
    fn build(&self, name: &str, service: &mut ServiceSpec) -> Result<()> {
        let Some(build) = service.build.take() else {
            return Ok(());
        };
        let mut details = build.into_details();

        let mut final_args: Vec<(String, String)> = Vec::new();
        for entry in &self.build_envs {
            let kv = KeyValue::parse(entry).map_err(|m| ManifoldError::malformed(name, "build.args", m))?;
            if !final_args.iter().any(|(key, _)| *key == kv.key) {
                final_args.push((kv.key, entry.clone()));
            }
        }
        let injected = final_args.len();

        let source_args = details.args.as_ref().map(EnvironmentSpec::to_list).unwrap_or_default();
        let mut explicit: Vec<String> = Vec::new();
        for arg in source_args {
            let kv = KeyValue::parse(&arg).map_err(|m| ManifoldError::malformed(name, "build.args", m))?;
            if explicit.contains(&kv.key) {
                continue;
            }
            explicit.push(kv.key.clone());

            match final_args[..injected].iter().position(|(key, _)| *key == kv.key) {
                Some(index) => {
                    tracing::debug!("Build arg {} of service {} overrides injected secret", kv.key, name);
                    final_args[index].1 = arg;
                }
                None => final_args.push((kv.key, arg)),
            }
        }

        details.args = Some(EnvironmentSpec::List(
            final_args.into_iter().map(|(_, entry)| entry).collect(),
        ));
        service.build = Some(BuildSpec::Full(details));
        Ok(())
    }

    fn volume_mounts(&mut self, name: &str, service: &mut ServiceSpec) -> Result<()> {
        let declared = service.volumes.take();
        let had_volumes = declared.is_some();
        let mut mounts = Vec::new();

        for mount in declared.unwrap_or_default() {
            let raw = match mount {
                VolumeMount::Short(raw) => raw,
                VolumeMount::Long(_) => {
                    return Err(ManifoldError::malformed(
                        name,
                        "volumes",
                        "long-form volume mounts are not supported",
                    ))
                }
            };

            // Mounts supplied by the platform are carried over from earlier runs
            if self.context.volumes.contains(&raw) {
                mounts.push(VolumeMount::Short(raw));
                continue;
            }

            let entry = VolumeEntry::parse(&raw).map_err(|m| ManifoldError::malformed(name, "volumes", m))?;
            let volume_name = if self.namespaced.contains(&entry.source) {
                entry.source.clone()
            } else {
                format!("{}{}", self.context.application_id, sanitize(&entry.source))
            };

            self.volumes
                .insert(volume_name.clone(), VolumeSpec::named(&volume_name));

            let rewritten = VolumeEntry {
                target: Some(entry.mount_path().to_string()),
                source: volume_name,
                mode: entry.mode,
            };
            mounts.push(VolumeMount::Short(rewritten.to_string()));
        }

        for external in &self.context.volumes {
            let mount = VolumeMount::Short(external.clone());
            if !mounts.contains(&mount) {
                mounts.push(mount);
            }
        }

        if had_volumes || !mounts.is_empty() {
            service.volumes = Some(mounts);
        }
        Ok(())
    }

    /// Record the service's own networks and attach the shared one exactly once
    fn join_networks(&mut self, service: &mut ServiceSpec) {
        let shared = &self.context.network;

        let networks = match service.networks.take() {
            Some(ServiceNetworks::Map(mut map)) => {
                for key in map.keys().filter(|k| *k != shared) {
                    self.networks.insert(key.clone(), NetworkSpec::named(key));
                }
                if !map.contains_key(shared) {
                    map.insert(shared.clone(), None);
                }
                ServiceNetworks::Map(map)
            }
            other => {
                let mut names = other.map(|n| n.names()).unwrap_or_default();
                for network in names.iter().filter(|n| *n != shared) {
                    self.networks
                        .insert(network.clone(), NetworkSpec::named(network));
                }
                names.retain(|n| n != shared);
                names.push(shared.clone());
                ServiceNetworks::List(names)
            }
        };

        service.networks = Some(networks);
    }
}

/// Remove characters that are not valid in a volume name suffix
fn sanitize(source: &str) -> String {
    source.chars().filter(|c| *c != '/' && *c != '.').collect()
}

fn is_named_volume(source: &str) -> bool {
    !(source.starts_with('/') || source.starts_with('.') || source.starts_with('~'))
}
