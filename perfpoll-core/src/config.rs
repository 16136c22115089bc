//! Poll session configuration.
//!
//! Defaults suit a local high-performance counter source: namespace
//! `root/cimv2`, two updates per second, a five-second elapsed bound, and an
//! unbounded fire count. Configs round-trip through serde and can be loaded
//! from YAML files.

use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Credentials for connecting to a remote namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Session termination policy. `None` means unbounded on that axis.
///
/// At least one bound must be finite for a synchronous query; asynchronous
/// sessions may leave both unbounded and run until cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Termination {
    /// Stop after this many emitted cycles.
    #[serde(default)]
    pub max_fires: Option<u32>,

    /// Stop once this much time has elapsed since session start. The bound
    /// is checked after each emission, so a session may overshoot by at most
    /// one cadence interval.
    #[serde(default)]
    pub max_elapsed: Option<Duration>,
}

impl Termination {
    pub const fn by_fires(count: u32) -> Self {
        Self {
            max_fires: Some(count),
            max_elapsed: None,
        }
    }

    pub const fn by_elapsed(elapsed: Duration) -> Self {
        Self {
            max_fires: None,
            max_elapsed: Some(elapsed),
        }
    }

    pub const fn unbounded() -> Self {
        Self {
            max_fires: None,
            max_elapsed: None,
        }
    }

    /// True when neither bound is finite.
    pub fn is_unbounded(&self) -> bool {
        self.max_fires.is_none() && self.max_elapsed.is_none()
    }
}

/// Configuration for one poll helper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Provider class to enumerate, e.g. `Win32_PerfRawData_PerfOS_Processor`.
    pub class_name: String,

    /// Provider namespace.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,

    #[serde(default = "default_termination")]
    pub termination: Termination,

    /// Cycles per second. The inter-cycle sleep is `1000 / cadence`
    /// milliseconds, measured from the end of one cycle to the start of the
    /// next; drift under load is accepted, not corrected.
    #[serde(default = "default_cadence")]
    pub cadence: NonZeroU32,
}

impl PollConfig {
    /// Config for `class_name` with default namespace, cadence, and bounds.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            namespace: default_namespace(),
            credentials: None,
            termination: default_termination(),
            cadence: default_cadence(),
        }
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_cadence(mut self, cadence: NonZeroU32) -> Self {
        self.cadence = cadence;
        self
    }

    /// The inter-cycle sleep interval.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.cadence.get()))
    }

    /// Load a config from a YAML file.
    pub fn from_yaml_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn default_namespace() -> String {
    "root/cimv2".to_owned()
}

fn default_termination() -> Termination {
    Termination::by_elapsed(Duration::from_secs(5))
}

fn default_cadence() -> NonZeroU32 {
    const TWO: NonZeroU32 = match NonZeroU32::new(2) {
        Some(two) => two,
        None => unreachable!(),
    };
    TWO
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn defaults_cover_a_local_counter_source() {
        let config = PollConfig::new("Win32_PerfRawData_PerfOS_Processor");
        assert_eq!(config.namespace, "root/cimv2");
        assert_eq!(config.cadence.get(), 2);
        assert_eq!(config.interval(), Duration::from_millis(500));
        assert_eq!(config.termination.max_elapsed, Some(Duration::from_secs(5)));
        assert!(config.termination.max_fires.is_none());
        assert!(!config.termination.is_unbounded());
    }

    #[test]
    fn unbounded_detection() {
        assert!(Termination::unbounded().is_unbounded());
        assert!(!Termination::by_fires(1).is_unbounded());
        assert!(!Termination::by_elapsed(Duration::from_secs(1)).is_unbounded());
    }

    #[test]
    fn yaml_roundtrip() {
        let config = PollConfig::new("Win32_PerfRawData_Tcpip_NetworkInterface")
            .with_termination(Termination::by_fires(3));
        let yaml = serde_yaml::to_string(&config).expect("serialize");
        let parsed: PollConfig = serde_yaml::from_str(&yaml).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_yaml_applies_defaults() {
        let parsed: PollConfig =
            serde_yaml::from_str("class_name: Win32_PerfRawData_PerfOS_Memory\n")
                .expect("parse");
        assert_eq!(parsed.namespace, "root/cimv2");
        assert_eq!(parsed.cadence.get(), 2);
    }

    #[test]
    fn zero_cadence_is_rejected_at_parse_time() {
        let err = serde_yaml::from_str::<PollConfig>(
            "class_name: Win32_PerfRawData_PerfOS_Memory\ncadence: 0\n",
        )
        .unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn from_yaml_path_parse_error_names_the_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("poll.yaml");
        fs::write(&path, ": : not yaml : [unclosed").expect("write");

        let err = PollConfig::from_yaml_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
        assert!(err.to_string().contains("poll.yaml"));
    }

    #[test]
    fn from_yaml_path_loads_credentials() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("poll.yaml");
        fs::write(
            &path,
            concat!(
                "class_name: Win32_PerfRawData_PerfOS_Processor\n",
                "namespace: root/remote\n",
                "credentials:\n",
                "  username: monitor\n",
                "  password: hunter2\n",
            ),
        )
        .expect("write");

        let config = PollConfig::from_yaml_path(&path).expect("load");
        assert_eq!(config.namespace, "root/remote");
        let credentials = config.credentials.expect("credentials");
        assert_eq!(credentials.username, "monitor");
    }
}
