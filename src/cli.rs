// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "skiff")]
#[command(about = "Declare and preview an ECS Fargate web service on AWS")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new skiff.yml configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Realize the stack against the in-memory engine and show the result
    Preview {
        /// Target environment (defined in config)
        #[arg(short, long)]
        env: Option<String>,
    },

    /// Print the resource dependency graph in realization order
    Graph {
        /// Target environment (defined in config)
        #[arg(short, long)]
        env: Option<String>,
    },
}
