//! Secret expansion
//!
//! Turns the application's secret set into `KEY=VALUE` entries, either for
//! the runtime environment or for build arguments.

use super::context::Secret;

/// Which variant of the secret set to expand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretScope {
    /// Runtime environment, every applicable secret
    Runtime,
    /// Build arguments, only secrets flagged for build time
    BuildTime,
}

/// Expands secrets into `KEY=VALUE` entries
pub trait SecretExpander {
    /// Expand `secrets` for a deployment.
    ///
    /// `port` is appended as `PORT=<port>` when no secret already defines
    /// it. `quoted` wraps values in double quotes.
    fn expand(
        &self,
        secrets: &[Secret],
        preview_id: Option<&str>,
        scope: SecretScope,
        port: Option<u16>,
        quoted: bool,
    ) -> Vec<String>;
}

/// Platform secret expansion
///
/// Preview deployments use the preview secrets when any exist, and fall
/// back to the regular ones otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformSecrets;

impl SecretExpander for PlatformSecrets {
    fn expand(
        &self,
        secrets: &[Secret],
        preview_id: Option<&str>,
        scope: SecretScope,
        port: Option<u16>,
        quoted: bool,
    ) -> Vec<String> {
        let use_preview = preview_id.is_some_and(|id| !id.is_empty())
            && secrets.iter().any(|s| s.is_preview_secret);

        let mut envs: Vec<String> = secrets
            .iter()
            .filter(|s| s.is_preview_secret == use_preview)
            .filter(|s| scope == SecretScope::Runtime || s.is_build_secret)
            .map(|s| {
                if quoted {
                    format!("{}={}", s.name, quote(&s.value))
                } else {
                    format!("{}={}", s.name, s.value)
                }
            })
            .collect();

        if let Some(port) = port {
            if !envs.iter().any(|e| e.split_once('=').map(|(k, _)| k) == Some("PORT")) {
                envs.push(format!("PORT={}", port));
            }
        }

        envs
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> Vec<Secret> {
        vec![
            Secret::new("DATABASE_URL", "postgres://db"),
            Secret::new("NPM_TOKEN", "tok").build(),
            Secret::new("DATABASE_URL", "postgres://preview").preview(),
        ]
    }

    #[test]
    fn test_runtime_expansion() {
        let envs = PlatformSecrets.expand(&secrets(), None, SecretScope::Runtime, None, false);
        assert_eq!(envs, vec!["DATABASE_URL=postgres://db", "NPM_TOKEN=tok"]);
    }

    #[test]
    fn test_build_time_only_keeps_build_secrets() {
        let envs = PlatformSecrets.expand(&secrets(), None, SecretScope::BuildTime, None, false);
        assert_eq!(envs, vec!["NPM_TOKEN=tok"]);
    }

    #[test]
    fn test_preview_secrets_replace_regular_ones() {
        let envs = PlatformSecrets.expand(&secrets(), Some("12"), SecretScope::Runtime, None, false);
        assert_eq!(envs, vec!["DATABASE_URL=postgres://preview"]);
    }

    #[test]
    fn test_preview_without_preview_secrets_falls_back() {
        let plain = vec![Secret::new("A", "1")];
        let envs = PlatformSecrets.expand(&plain, Some("12"), SecretScope::Runtime, None, false);
        assert_eq!(envs, vec!["A=1"]);
    }

    #[test]
    fn test_quoted_values() {
        let plain = vec![Secret::new("GREETING", "say \"hi\"").build()];
        let envs = PlatformSecrets.expand(&plain, None, SecretScope::BuildTime, None, true);
        assert_eq!(envs, vec![r#"GREETING="say \"hi\"""#]);
    }

    #[test]
    fn test_port_is_added_once() {
        let envs = PlatformSecrets.expand(&[], None, SecretScope::Runtime, Some(3000), false);
        assert_eq!(envs, vec!["PORT=3000"]);

        let with_port = vec![Secret::new("PORT", "8080")];
        let envs = PlatformSecrets.expand(&with_port, None, SecretScope::Runtime, Some(3000), false);
        assert_eq!(envs, vec!["PORT=8080"]);
    }
}
