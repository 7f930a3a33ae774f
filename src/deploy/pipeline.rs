//! Compose deployment pipeline
//!
//! Reads the application's compose file, normalizes it, writes it back in
//! place and hands it to a [`BuildDriver`] to pull and build images.
//! Progress lines go to a [`LogSink`] keyed by build and application id.

use super::context::DeploymentContext;
use super::policy::PolicyProvider;
use super::secrets::SecretExpander;
use crate::compose::normalizer::{ManifestNormalizer, NormalizedManifest};
use crate::compose::parser::ManifestCodec;
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Receives build progress lines
pub trait LogSink {
    /// Record one line for a build
    fn line(&self, build_id: &str, application_id: &str, line: &str);
}

/// Forwards build lines to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn line(&self, build_id: &str, application_id: &str, line: &str) {
        tracing::info!(build = build_id, application = application_id, "{}", line);
    }
}

/// Keeps build lines in memory
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines recorded so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl LogSink for MemoryLogSink {
    fn line(&self, build_id: &str, application_id: &str, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(format!("[{}/{}] {}", application_id, build_id, line));
        }
    }
}

/// What a build driver needs to pull and build a normalized manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Project directory
    pub working_dir: PathBuf,
    /// Normalized compose file
    pub manifest_path: PathBuf,
    /// Build identifier
    pub build_id: String,
    /// Application identifier
    pub application_id: String,
    /// Verbose output
    pub debug: bool,
}

impl BuildRequest {
    fn compose_command(&self) -> Vec<String> {
        vec![
            "docker".to_string(),
            "compose".to_string(),
            "--project-directory".to_string(),
            self.working_dir.display().to_string(),
            "-f".to_string(),
            self.manifest_path.display().to_string(),
        ]
    }

    /// Command line that pulls service images
    pub fn pull_command(&self) -> Vec<String> {
        let mut command = self.compose_command();
        command.push("pull".to_string());
        command
    }

    /// Command line that builds service images
    pub fn build_command(&self) -> Vec<String> {
        let mut command = self.compose_command();
        command.extend(["build", "--progress", "plain"].map(String::from));
        command
    }
}

/// Pulls and builds the images of a compose project
#[allow(async_fn_in_trait)]
pub trait BuildDriver {
    /// Pull service images
    async fn pull(&self, request: &BuildRequest) -> Result<()>;

    /// Build service images
    async fn build(&self, request: &BuildRequest) -> Result<()>;
}

/// Driver that records the commands it would run
#[derive(Debug, Default)]
pub struct DryRunDriver {
    commands: Mutex<Vec<Vec<String>>>,
}

impl DryRunDriver {
    /// Create a driver with no recorded commands
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands recorded so far
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, command: Vec<String>) {
        tracing::info!("Would run: {}", command.join(" "));
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command);
        }
    }
}

impl BuildDriver for DryRunDriver {
    async fn pull(&self, request: &BuildRequest) -> Result<()> {
        self.record(request.pull_command());
        Ok(())
    }

    async fn build(&self, request: &BuildRequest) -> Result<()> {
        self.record(request.build_command());
        Ok(())
    }
}

/// Where the application's compose file lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    /// Checkout directory
    pub workdir: PathBuf,
    /// Application base directory inside the checkout
    pub base_directory: String,
    /// Compose file location inside the base directory
    pub compose_file: String,
    /// Build identifier
    pub build_id: String,
    /// Verbose output
    pub debug: bool,
}

impl PipelineRequest {
    /// Absolute path of the compose file
    pub fn manifest_path(&self) -> PathBuf {
        resolve(&self.workdir, &[self.base_directory.as_str(), self.compose_file.as_str()])
    }
}

fn resolve(root: &Path, parts: &[&str]) -> PathBuf {
    parts.iter().fold(root.to_path_buf(), |path, part| {
        let part = part.trim_matches('/');
        if part.is_empty() {
            path
        } else {
            path.join(part)
        }
    })
}

/// Read, normalize, write back, pull, build
pub struct ComposePipeline<D, L, S, P> {
    normalizer: ManifestNormalizer<S, P>,
    driver: D,
    sink: L,
}

impl<D, L, S, P> ComposePipeline<D, L, S, P>
where
    D: BuildDriver,
    L: LogSink,
    S: SecretExpander,
    P: PolicyProvider,
{
    /// Create a pipeline
    pub fn new(normalizer: ManifestNormalizer<S, P>, driver: D, sink: L) -> Self {
        Self {
            normalizer,
            driver,
            sink,
        }
    }

    /// Build driver in use
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Run the pipeline for one deployment
    pub async fn run(
        &self,
        request: &PipelineRequest,
        context: &DeploymentContext,
    ) -> Result<NormalizedManifest> {
        let path = request.manifest_path();
        tracing::info!("Normalizing compose file {}", path.display());

        let manifest = ManifestCodec::read_file(&path).await?;
        let normalized = self.normalizer.normalize(&manifest, context)?;
        ManifestCodec::write_file(&path, &normalized.manifest).await?;

        let build = BuildRequest {
            working_dir: request.workdir.clone(),
            manifest_path: path,
            build_id: request.build_id.clone(),
            application_id: context.application_id.clone(),
            debug: request.debug,
        };

        self.driver.pull(&build).await?;
        self.sink.line(
            &build.build_id,
            &build.application_id,
            "Pulling images from Compose file...",
        );

        self.driver.build(&build).await?;
        self.sink.line(
            &build.build_id,
            &build.application_id,
            "Building images from Compose file...",
        );

        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ManifoldError;
    use tempfile::tempdir;

    fn request(workdir: &Path) -> PipelineRequest {
        PipelineRequest {
            workdir: workdir.to_path_buf(),
            base_directory: "/app/".to_string(),
            compose_file: "/docker-compose.yml".to_string(),
            build_id: "b1".to_string(),
            debug: false,
        }
    }

    #[test]
    fn test_manifest_path() {
        let request = request(Path::new("/tmp/build"));
        assert_eq!(
            request.manifest_path(),
            PathBuf::from("/tmp/build/app/docker-compose.yml")
        );
    }

    #[test]
    fn test_build_commands() {
        let build = BuildRequest {
            working_dir: PathBuf::from("/w"),
            manifest_path: PathBuf::from("/w/compose.yaml"),
            build_id: "b1".to_string(),
            application_id: "app1".to_string(),
            debug: false,
        };
        assert_eq!(
            build.pull_command().join(" "),
            "docker compose --project-directory /w -f /w/compose.yaml pull"
        );
        assert_eq!(
            build.build_command().join(" "),
            "docker compose --project-directory /w -f /w/compose.yaml build --progress plain"
        );
    }

    #[tokio::test]
    async fn test_pipeline_rewrites_file_and_builds() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("app")).unwrap();
        let path = temp.path().join("app").join("docker-compose.yml");
        std::fs::write(&path, "services:\n  web:\n    build: .\n").unwrap();

        let pipeline = ComposePipeline::new(
            ManifestNormalizer::new(),
            DryRunDriver::new(),
            MemoryLogSink::new(),
        );
        let context = DeploymentContext::new("app1", "net1");
        pipeline.run(&request(temp.path()), &context).await.unwrap();

        let written = ManifestCodec::read_file(&path).await.unwrap();
        let web = &written.services.as_ref().unwrap()["web"];
        assert_eq!(web.container_name.as_deref(), Some("app1-web"));

        let commands = pipeline.driver().commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].last().map(String::as_str), Some("pull"));
        assert_eq!(commands[1].last().map(String::as_str), Some("plain"));

        assert_eq!(
            pipeline.sink.lines(),
            vec![
                "[app1/b1] Pulling images from Compose file...",
                "[app1/b1] Building images from Compose file...",
            ]
        );
    }

    #[tokio::test]
    async fn test_pipeline_missing_file() {
        let temp = tempdir().unwrap();
        let pipeline = ComposePipeline::new(
            ManifestNormalizer::new(),
            DryRunDriver::new(),
            MemoryLogSink::new(),
        );
        let context = DeploymentContext::new("app1", "net1");

        let result = pipeline.run(&request(temp.path()), &context).await;
        assert!(matches!(result, Err(ManifoldError::Io(_))));
        assert!(pipeline.driver().commands().is_empty());
    }

    struct FailingDriver;

    impl BuildDriver for FailingDriver {
        async fn pull(&self, _request: &BuildRequest) -> Result<()> {
            Err(ManifoldError::Build("registry unreachable".to_string()))
        }

        async fn build(&self, _request: &BuildRequest) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_driver_errors_propagate() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("app")).unwrap();
        std::fs::write(
            temp.path().join("app").join("docker-compose.yml"),
            "services:\n  web:\n    image: nginx\n",
        )
        .unwrap();

        let sink = MemoryLogSink::new();
        let pipeline = ComposePipeline::new(ManifestNormalizer::new(), FailingDriver, sink);
        let context = DeploymentContext::new("app1", "net1");

        let result = pipeline.run(&request(temp.path()), &context).await;
        assert!(matches!(result, Err(ManifoldError::Build(_))));
        assert!(pipeline.sink.lines().is_empty());
    }
}
