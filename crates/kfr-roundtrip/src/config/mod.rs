use anyhow::{Context, Result};
use kfr_invocation::LifecycleConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod validation;

/// Top-level configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub java: JavaConfig,
    pub artifact: ArtifactConfig,
    #[serde(default)]
    pub router: RouterOptions,
    #[serde(default)]
    pub lifecycle: LifecycleOptions,
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory relative artifact locations are resolved against.
    /// Set to the config file's directory by `load_from_file`.
    #[serde(skip)]
    pub base_directory: Option<PathBuf>,
}

/// Java runtime used to start the router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JavaConfig {
    #[serde(default = "default_java_path")]
    pub path: String,
}

impl Default for JavaConfig {
    fn default() -> Self {
        Self {
            path: default_java_path(),
        }
    }
}

/// Router jar location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub location: String,
}

/// Flags passed to the router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterOptions {
    /// Host identifier reported to the router (`-host`)
    #[serde(default = "default_host")]
    pub host: String,
    /// Disable the router's own logging (`-dl`)
    #[serde(default = "default_true")]
    pub disable_logging: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            host: default_host(),
            disable_logging: true,
        }
    }
}

/// Termination and join timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleOptions {
    #[serde(default = "default_grace_window", with = "duration_serde")]
    pub grace_window: Duration,
    #[serde(default = "default_join_timeout", with = "duration_serde")]
    pub join_timeout: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            grace_window: default_grace_window(),
            join_timeout: default_join_timeout(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::load_from_string(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config.base_directory = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: RouterConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// The router jar, resolved against the config file's directory when
    /// relative.
    pub fn artifact_path(&self) -> PathBuf {
        let location = Path::new(&self.artifact.location);
        match &self.base_directory {
            Some(base) if location.is_relative() => base.join(location),
            _ => location.to_path_buf(),
        }
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            grace_window: self.lifecycle.grace_window,
            join_timeout: self.lifecycle.join_timeout,
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_java_path() -> String {
    "java".to_string()
}

fn default_host() -> String {
    "KiCad".to_string()
}

fn default_true() -> bool {
    true
}

fn default_grace_window() -> Duration {
    Duration::from_secs(3)
}

fn default_join_timeout() -> Duration {
    Duration::from_secs(10)
}

pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// Parse `"250ms"`, `"3s"` or `"1m"`.
    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        // "ms" before "s", it ends with 's' too
        if let Some(num) = s.strip_suffix("ms") {
            let millis: u64 = num.parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_millis(millis))
        } else if let Some(num) = s.strip_suffix('s') {
            let secs: u64 = num.parse().map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(secs))
        } else if let Some(num) = s.strip_suffix('m') {
            let mins: u64 = num.parse().map_err(|_| format!("Invalid duration: {}", s))?;
            let secs = mins
                .checked_mul(60)
                .ok_or_else(|| format!("Duration too large: {}", s))?;
            Ok(Duration::from_secs(secs))
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}

pub use duration_serde::parse_duration;

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
artifact:
  location: freerouting-1.9.0.jar
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = RouterConfig::load_from_string(MINIMAL).unwrap();

        assert_eq!(config.java.path, "java");
        assert_eq!(config.router.host, "KiCad");
        assert!(config.router.disable_logging);
        assert_eq!(config.lifecycle.grace_window, Duration::from_secs(3));
        assert_eq!(config.lifecycle.join_timeout, Duration::from_secs(10));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.artifact_path(), PathBuf::from("freerouting-1.9.0.jar"));
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
java:
  path: /opt/jre/bin/java
artifact:
  location: /opt/freerouting/freerouting.jar
router:
  host: KiCad 8
  disable_logging: false
lifecycle:
  grace_window: 500ms
  join_timeout: 1m
log_level: debug
"#;
        let config = RouterConfig::load_from_string(yaml).unwrap();

        assert_eq!(config.java.path, "/opt/jre/bin/java");
        assert_eq!(config.router.host, "KiCad 8");
        assert!(!config.router.disable_logging);
        assert_eq!(config.lifecycle.grace_window, Duration::from_millis(500));
        assert_eq!(config.lifecycle.join_timeout, Duration::from_secs(60));

        let lifecycle = config.lifecycle_config();
        assert_eq!(lifecycle.grace_window, Duration::from_millis(500));
    }

    #[test]
    fn test_relative_artifact_resolved_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.yaml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = RouterConfig::load_from_file(&path).unwrap();
        assert_eq!(config.artifact_path(), dir.path().join("freerouting-1.9.0.jar"));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert!(parse_duration("3").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("ms").is_err());
    }

    #[test]
    fn test_oversized_minutes_rejected() {
        let err = parse_duration("999999999999999999m").unwrap_err();
        assert!(err.contains("too large"));

        let yaml = format!("{}lifecycle:\n  grace_window: 999999999999999999m\n", MINIMAL);
        assert!(RouterConfig::load_from_string(&yaml).is_err());
    }

    #[test]
    fn test_bad_duration_rejected() {
        let yaml = r#"
artifact:
  location: freerouting.jar
lifecycle:
  grace_window: soon
"#;
        let err = RouterConfig::load_from_string(yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("Duration must end with"));
    }

    #[test]
    fn test_missing_artifact_rejected() {
        assert!(RouterConfig::load_from_string("java:\n  path: java\n").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = RouterConfig::load_from_file("/nonexistent/router.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
