// ABOUTME: Configuration types and parsing for skiff.yml.
// ABOUTME: Handles YAML parsing, defaults, validation, and environment overlays.

mod deserialize;
mod init;

pub use init::init_config;

use crate::error::{Error, Result};
use crate::types::ResourceName;
use deserialize::{
    deserialize_container_name, deserialize_container_name_option, deserialize_image_tag,
    deserialize_image_tag_option,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "skiff.yml";
pub const CONFIG_FILENAME_ALT: &str = "skiff.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".skiff/config.yml";

/// Everything that shapes the declared topology.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackConfig {
    /// Number of service tasks kept running.
    #[serde(default = "default_replicas")]
    pub replicas: u32,

    /// Container port, also used by the target group and listener.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_build_context")]
    pub build_context: PathBuf,

    #[serde(
        default = "default_image_tag",
        deserialize_with = "deserialize_image_tag"
    )]
    pub image_tag: String,

    #[serde(
        default = "default_container_name",
        deserialize_with = "deserialize_container_name"
    )]
    pub container_name: ResourceName,

    /// Task CPU units.
    #[serde(default = "default_cpu")]
    pub cpu: u32,

    /// Task memory in MiB.
    #[serde(default = "default_memory")]
    pub memory: u32,

    #[serde(default, with = "humantime_serde")]
    pub build_timeout: Option<Duration>,

    #[serde(default)]
    pub environments: HashMap<String, Environment>,
}

/// Overrides applied on top of the base config for one environment.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Environment {
    #[serde(default)]
    pub replicas: Option<u32>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub build_context: Option<PathBuf>,

    #[serde(default, deserialize_with = "deserialize_image_tag_option")]
    pub image_tag: Option<String>,

    #[serde(default, deserialize_with = "deserialize_container_name_option")]
    pub container_name: Option<ResourceName>,

    #[serde(default)]
    pub cpu: Option<u32>,

    #[serde(default)]
    pub memory: Option<u32>,

    #[serde(default, with = "humantime_serde")]
    pub build_timeout: Option<Duration>,
}

fn default_replicas() -> u32 {
    5
}

fn default_port() -> u16 {
    80
}

fn default_build_context() -> PathBuf {
    PathBuf::from("..")
}

fn default_image_tag() -> String {
    "latest".to_string()
}

fn default_container_name() -> ResourceName {
    ResourceName::new("my-app").unwrap_or_else(|_| unreachable!("literal is a valid name"))
}

fn default_cpu() -> u32 {
    256
}

fn default_memory() -> u32 {
    512
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            port: default_port(),
            build_context: default_build_context(),
            image_tag: default_image_tag(),
            container_name: default_container_name(),
            cpu: default_cpu(),
            memory: default_memory(),
            build_timeout: None,
            environments: HashMap::new(),
        }
    }
}

impl StackConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty file means "all defaults".
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Find and load the config file in `dir`.
    ///
    /// Returns the directory the file was found relative to, so relative
    /// paths in the config can be resolved against it.
    pub fn discover(dir: &Path) -> Result<(Self, PathBuf)> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Ok((Self::load(path)?, dir.to_path_buf()));
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn for_environment(&self, name: &str) -> Result<StackConfig> {
        let env = self
            .environments
            .get(name)
            .ok_or_else(|| Error::UnknownEnvironment(name.to_string()))?;

        let mut merged = self.clone();

        if let Some(replicas) = env.replicas {
            merged.replicas = replicas;
        }
        if let Some(port) = env.port {
            merged.port = port;
        }
        if let Some(ref context) = env.build_context {
            merged.build_context = context.clone();
        }
        if let Some(ref tag) = env.image_tag {
            merged.image_tag = tag.clone();
        }
        if let Some(ref name) = env.container_name {
            merged.container_name = name.clone();
        }
        if let Some(cpu) = env.cpu {
            merged.cpu = cpu;
        }
        if let Some(memory) = env.memory {
            merged.memory = memory;
        }
        if env.build_timeout.is_some() {
            merged.build_timeout = env.build_timeout;
        }

        merged.validate()?;
        Ok(merged)
    }

    /// Resolve a relative build context against the config directory.
    pub fn with_base_dir(mut self, base: &Path) -> Self {
        if self.build_context.is_relative() {
            self.build_context = base.join(&self.build_context);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::InvalidConfig("port must be non-zero".to_string()));
        }
        if self.cpu == 0 {
            return Err(Error::InvalidConfig("cpu must be non-zero".to_string()));
        }
        if self.memory == 0 {
            return Err(Error::InvalidConfig("memory must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = StackConfig::default();
        assert_eq!(config.replicas, 5);
        assert_eq!(config.port, 80);
        assert_eq!(config.build_context, PathBuf::from(".."));
        assert_eq!(config.image_tag, "latest");
        assert_eq!(config.container_name.as_str(), "my-app");
        assert_eq!((config.cpu, config.memory), (256, 512));
        assert!(config.build_timeout.is_none());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(StackConfig::from_yaml("").unwrap(), StackConfig::default());
    }

    #[test]
    fn parses_build_timeout() {
        let config = StackConfig::from_yaml("build_timeout: 90s\n").unwrap();
        assert_eq!(config.build_timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn rejects_zero_port() {
        let err = StackConfig::from_yaml("port: 0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn rejects_invalid_container_name() {
        let err = StackConfig::from_yaml("container_name: My_App\n").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(StackConfig::from_yaml("replica: 3\n").is_err());
    }

    #[test]
    fn environment_overrides_selected_fields() {
        let config = StackConfig::from_yaml(
            r#"
replicas: 5
environments:
  staging:
    replicas: 2
    image_tag: staging
"#,
        )
        .unwrap();

        let staging = config.for_environment("staging").unwrap();
        assert_eq!(staging.replicas, 2);
        assert_eq!(staging.image_tag, "staging");
        assert_eq!(staging.port, 80);
    }

    #[test]
    fn unknown_environment_is_an_error() {
        let err = StackConfig::default().for_environment("prod").unwrap_err();
        assert!(matches!(err, Error::UnknownEnvironment(name) if name == "prod"));
    }

    #[test]
    fn relative_context_resolves_against_base() {
        let config = StackConfig::default().with_base_dir(Path::new("/srv/app/infra"));
        assert_eq!(config.build_context, PathBuf::from("/srv/app/infra/.."));
    }
}
