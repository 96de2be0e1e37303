//! CLI module for the Skyforge resource driver.
//!
//! This module provides the command-line interface for planning and
//! applying single resources against Google Cloud and Kubernetes.

mod commands;
mod manifest;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use manifest::ResourceManifest;
pub use output::OutputFormatter;
