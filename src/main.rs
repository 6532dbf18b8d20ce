// ABOUTME: Entry point for the skiff CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use serde_json::json;
use skiff::config::{self, StackConfig};
use skiff::console::{Console, OutputMode};
use skiff::engine::{MemoryEngine, Operation, TraceEvent};
use skiff::error::Result;
use skiff::image::DryRunBuilder;
use skiff::resource::EdgeKind;
use skiff::stack;
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut console = Console::new(mode);

    let result = run(cli.command, &mut console).await;

    if let Err(e) = result {
        console.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(command: Commands, console: &mut Console) -> Result<()> {
    let cwd = env::current_dir()?;
    match command {
        Commands::Init { force } => {
            config::init_config(&cwd, force)?;
            console.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Preview { env } => {
            let config = load_config(&cwd, env.as_deref())?;
            preview(&config, console).await
        }
        Commands::Graph { env } => {
            let config = load_config(&cwd, env.as_deref())?;
            graph(&config, console).await
        }
    }
}

/// Discover the config and apply environment overrides if specified.
fn load_config(dir: &Path, environment: Option<&str>) -> Result<StackConfig> {
    let (config, base) = StackConfig::discover(dir)?;
    let config = match environment {
        Some(name) => config.for_environment(name)?,
        None => config,
    };
    Ok(config.with_base_dir(&base))
}

/// Realize the stack against the in-memory engine.
async fn preview(config: &StackConfig, console: &mut Console) -> Result<()> {
    console.start_timer();
    console.progress(&format!(
        "Previewing {} replica(s) of {} on port {}",
        config.replicas, config.container_name, config.port
    ));

    let engine = Arc::new(MemoryEngine::new());
    let deployment = stack::deploy(engine.clone(), Arc::new(DryRunBuilder), config).await?;

    for event in engine.trace() {
        if let TraceEvent::Realized {
            name,
            ty,
            operation,
        } = event
        {
            let marker = match operation {
                Operation::Create => "+",
                Operation::Update => "~",
                Operation::Same => "=",
            };
            console.item(
                &format!("  {marker} {name} ({ty})"),
                json!({ "resource": name, "type": ty.as_str(), "operation": format!("{operation:?}") }),
            );
        }
    }

    for (key, value) in &deployment.outputs {
        let shown = value.as_str().map_or_else(|| value.to_string(), str::to_string);
        console.item(
            &format!("  {key}: {shown}"),
            json!({ "output": key, "value": value }),
        );
    }

    let url = deployment
        .outputs
        .get(stack::URL_OUTPUT)
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    console.success(&format!(
        "Preview complete: {} resource(s), url {}",
        deployment.graph.len(),
        url
    ));
    Ok(())
}

/// Print the dependency graph in realization order.
async fn graph(config: &StackConfig, console: &Console) -> Result<()> {
    let engine = Arc::new(MemoryEngine::new());
    let deployment = stack::deploy(engine, Arc::new(DryRunBuilder), config).await?;
    let graph = &deployment.graph;

    match console.mode() {
        OutputMode::Json => {
            for name in graph.topological_order()? {
                let after: Vec<_> = graph
                    .dependencies_of(name.as_str())
                    .map(|edge| {
                        let kind = match edge.kind {
                            EdgeKind::Data => "data",
                            EdgeKind::Ordering => "ordering",
                        };
                        json!({ "from": edge.from, "kind": kind })
                    })
                    .collect();
                console.item(
                    name.as_str(),
                    json!({ "resource": name, "dependencies": after }),
                );
            }
        }
        _ => print!("{}", graph.render()?),
    }
    Ok(())
}
