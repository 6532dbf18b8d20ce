// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates skiff.yml template files.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, StackConfig};

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let yaml = generate_template_yaml(&StackConfig::default());
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &StackConfig) -> String {
    format!(
        r#"# Number of tasks kept running behind the load balancer
replicas: {}
# Port the container listens on and the load balancer forwards to
port: {}
# Directory holding the Dockerfile, relative to this file
build_context: {}
image_tag: {}
container_name: {}
cpu: {}
memory: {}
# build_timeout: 10m

# Per-environment overrides, selected with --env
# environments:
#   staging:
#     replicas: 2
"#,
        config.replicas,
        config.port,
        config.build_context.display(),
        config.image_tag,
        config.container_name,
        config.cpu,
        config.memory,
    )
}
