//! Default restart and deploy policy for platform services

use crate::compose::config::{DeploySpec, RestartPolicySpec};

/// Restart and deploy settings stamped on every service
#[derive(Debug, Clone, PartialEq)]
pub struct ServicePolicy {
    /// Service-level restart policy
    pub restart: String,
    /// Deploy block
    pub deploy: DeploySpec,
}

/// Derives the service policy for a target network
pub trait PolicyProvider {
    /// Policy for services joining `network`
    fn policy(&self, network: &str) -> ServicePolicy;
}

/// Restart on failure, at most ten attempts within a two minute window
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl PolicyProvider for DefaultPolicy {
    fn policy(&self, _network: &str) -> ServicePolicy {
        ServicePolicy {
            restart: "on-failure".to_string(),
            deploy: DeploySpec {
                restart_policy: Some(RestartPolicySpec {
                    condition: Some("on-failure".to_string()),
                    delay: Some("5s".to_string()),
                    max_attempts: Some(10),
                    window: Some("120s".to_string()),
                }),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = DefaultPolicy.policy("net1");
        assert_eq!(policy.restart, "on-failure");

        let restart = policy.deploy.restart_policy.unwrap();
        assert_eq!(restart.condition.as_deref(), Some("on-failure"));
        assert_eq!(restart.max_attempts, Some(10));
        assert_eq!(restart.window.as_deref(), Some("120s"));
    }
}
