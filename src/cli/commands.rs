//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Skyforge - lifecycle driver for Google Cloud and Kubernetes resources.
#[derive(Parser, Debug)]
#[command(name = "skyforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the provider configuration file.
    #[arg(short, long, global = true, env = "SKYFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the registered resource types.
    Resources,

    /// Show the attribute schema of a resource type.
    Schema {
        /// Resource type, e.g. `google_compute_address`.
        resource_type: String,
    },

    /// Show what applying the manifest would change.
    Plan {
        /// Resource manifest (YAML).
        #[arg(short = 'f', long)]
        manifest: Option<PathBuf>,

        /// State file of the resource.
        #[arg(long)]
        state: PathBuf,
    },

    /// Create, update or replace the resource to match the manifest.
    Apply {
        /// Resource manifest (YAML).
        #[arg(short = 'f', long)]
        manifest: PathBuf,

        /// State file of the resource.
        #[arg(long)]
        state: PathBuf,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Re-read the resource and update the state file.
    Refresh {
        /// State file of the resource.
        #[arg(long)]
        state: PathBuf,
    },

    /// Delete the resource recorded in the state file.
    Destroy {
        /// State file of the resource.
        #[arg(long)]
        state: PathBuf,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Adopt an existing resource into a state file.
    Import {
        /// Resource type.
        resource_type: String,

        /// Remote ID, in the format the resource type expects.
        id: String,

        /// State file to write.
        #[arg(long)]
        state: PathBuf,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
