//! Request and output types for engine calls

use std::collections::HashMap;

use bollard::models::{ContainerConfig, EndpointSettings, HostConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which output streams of a container to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdType {
    Stdout,
    Stderr,
    #[default]
    All,
}

impl StdType {
    #[must_use]
    pub fn includes_stdout(self) -> bool {
        matches!(self, StdType::Stdout | StdType::All)
    }

    #[must_use]
    pub fn includes_stderr(self) -> bool {
        matches!(self, StdType::Stderr | StdType::All)
    }
}

/// Options for a container log request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogOptions {
    pub stdout: bool,
    pub stderr: bool,
    pub follow: bool,
    /// Number of trailing lines, all lines when `None`
    pub tail: Option<u32>,
    pub timestamps: bool,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// One chunk of container output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub stream: StdType,
    pub message: String,
}

impl LogLine {
    /// RFC 3339 prefix the engine writes when timestamps are requested
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let (prefix, _) = self.message.split_once(' ')?;
        DateTime::parse_from_rfc3339(prefix)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Everything needed to create a container again from a captured inspect
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    /// Container name, without the leading `/`
    pub name: String,
    pub config: ContainerConfig,
    pub host_config: Option<HostConfig>,
    /// Endpoint settings keyed by network name
    pub networks: HashMap<String, EndpointSettings>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_type_selection() {
        assert!(StdType::All.includes_stdout());
        assert!(StdType::All.includes_stderr());
        assert!(StdType::Stdout.includes_stdout());
        assert!(!StdType::Stdout.includes_stderr());
        assert!(!StdType::Stderr.includes_stdout());
    }

    #[test]
    fn test_log_line_timestamp() {
        let line = LogLine {
            stream: StdType::Stdout,
            message: "2024-03-01T10:00:00.500000000Z GET /health 200\n".to_string(),
        };
        let at = line.timestamp().unwrap();
        assert_eq!(at.timestamp_subsec_millis(), 500);

        let bare = LogLine {
            stream: StdType::Stdout,
            message: "no timestamp here".to_string(),
        };
        assert!(bare.timestamp().is_none());
    }
}
