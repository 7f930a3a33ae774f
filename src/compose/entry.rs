//! Parsers for compound compose strings
//!
//! Environment entries and build arguments use `KEY=VALUE`, short volume
//! mounts use `source[:target[:mode]]`. Both parsers report malformed input
//! instead of yielding half-filled values.

use std::fmt;

/// Parsed `KEY=VALUE` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// Variable name
    pub key: String,
    /// Value, absent for bare `KEY` pass-through entries
    pub value: Option<String>,
}

impl KeyValue {
    /// Parse an entry. Only the first `=` separates key from value.
    pub fn parse(entry: &str) -> Result<Self, String> {
        let (key, value) = match entry.split_once('=') {
            Some((key, value)) => (key, Some(value.to_string())),
            None => (entry, None),
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(format!("entry '{}' has an empty key", entry));
        }

        Ok(Self {
            key: key.to_string(),
            value,
        })
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => write!(f, "{}", self.key),
        }
    }
}

/// Parsed short-syntax volume mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeEntry {
    /// Volume name, or the mount path when no target is given
    pub source: String,
    /// Path inside the container
    pub target: Option<String>,
    /// Access mode (ro, rw, z, ...)
    pub mode: Option<String>,
}

impl VolumeEntry {
    /// Parse `source[:target[:mode]]`
    pub fn parse(entry: &str) -> Result<Self, String> {
        let parts: Vec<&str> = entry.split(':').collect();
        if parts.len() > 3 {
            return Err(format!(
                "mount '{}' has {} ':'-separated parts, expected at most 3",
                entry,
                parts.len()
            ));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(format!("mount '{}' has an empty component", entry));
        }

        Ok(Self {
            source: parts[0].to_string(),
            target: parts.get(1).map(|s| s.to_string()),
            mode: parts.get(2).map(|s| s.to_string()),
        })
    }

    /// Path the volume is mounted at inside the container
    pub fn mount_path(&self) -> &str {
        self.target.as_deref().unwrap_or(&self.source)
    }
}

impl fmt::Display for VolumeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        if let Some(target) = &self.target {
            write!(f, ":{}", target)?;
        }
        if let Some(mode) = &self.mode {
            write!(f, ":{}", mode)?;
        }
        Ok(())
    }
}
