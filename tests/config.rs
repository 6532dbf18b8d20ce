// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, file discovery, and environment overlays.

use skiff::config::*;
use skiff::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

mod parsing {
    use super::*;

    #[test]
    fn parse_full_config() {
        let yaml = r#"
replicas: 3
port: 8080
build_context: ./app
image_tag: v1.2.3
container_name: web
cpu: 512
memory: 1024
build_timeout: 5m
"#;
        let config = StackConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.replicas, 3);
        assert_eq!(config.port, 8080);
        assert_eq!(config.build_context, PathBuf::from("./app"));
        assert_eq!(config.image_tag, "v1.2.3");
        assert_eq!(config.container_name.as_str(), "web");
        assert_eq!((config.cpu, config.memory), (512, 1024));
        assert_eq!(config.build_timeout, Some(Duration::from_secs(300)));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config = StackConfig::from_yaml("replicas: 1\n").unwrap();
        assert_eq!(config.replicas, 1);
        assert_eq!(config.port, 80);
        assert_eq!(config.container_name.as_str(), "my-app");
    }

    #[test]
    fn rejects_invalid_image_tag() {
        assert!(StackConfig::from_yaml("image_tag: \"-bad\"\n").is_err());
        assert!(StackConfig::from_yaml("image_tag: \"has space\"\n").is_err());
    }

    #[test]
    fn rejects_zero_cpu_and_memory() {
        assert!(matches!(
            StackConfig::from_yaml("cpu: 0\n"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            StackConfig::from_yaml("memory: 0\n"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_negative_replicas() {
        assert!(matches!(
            StackConfig::from_yaml("replicas: -1\n"),
            Err(Error::Yaml(_))
        ));
    }
}

mod environments {
    use super::*;

    const YAML: &str = r#"
replicas: 5
port: 80
environments:
  staging:
    replicas: 1
    build_timeout: 30s
  prod:
    port: 8080
    container_name: web
"#;

    #[test]
    fn overlay_replaces_only_given_fields() {
        let config = StackConfig::from_yaml(YAML).unwrap();

        let staging = config.for_environment("staging").unwrap();
        assert_eq!(staging.replicas, 1);
        assert_eq!(staging.port, 80);
        assert_eq!(staging.build_timeout, Some(Duration::from_secs(30)));

        let prod = config.for_environment("prod").unwrap();
        assert_eq!(prod.replicas, 5);
        assert_eq!(prod.port, 8080);
        assert_eq!(prod.container_name.as_str(), "web");
    }

    #[test]
    fn overlay_is_validated() {
        let config = StackConfig::from_yaml(
            r#"
environments:
  broken:
    port: 0
"#,
        )
        .unwrap();
        assert!(matches!(
            config.for_environment("broken"),
            Err(Error::InvalidConfig(_))
        ));
    }
}

mod discovery {
    use super::*;

    #[test]
    fn finds_primary_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "replicas: 2\n").unwrap();

        let (config, base) = StackConfig::discover(dir.path()).unwrap();
        assert_eq!(config.replicas, 2);
        assert_eq!(base, dir.path());
    }

    #[test]
    fn finds_alternate_locations() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".skiff")).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_DIR), "replicas: 4\n").unwrap();

        let (config, _) = StackConfig::discover(dir.path()).unwrap();
        assert_eq!(config.replicas, 4);
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            StackConfig::discover(dir.path()),
            Err(Error::ConfigNotFound(_))
        ));
    }

    #[test]
    fn init_writes_loadable_template() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();

        let (config, _) = StackConfig::discover(dir.path()).unwrap();
        assert_eq!(config, StackConfig::default());

        assert!(matches!(
            init_config(dir.path(), false),
            Err(Error::AlreadyExists(_))
        ));
        init_config(dir.path(), true).unwrap();
    }
}
