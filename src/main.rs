//! Skyforge CLI entrypoint.
//!
//! This is the main entrypoint for the skyforge command-line tool.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use skyforge_providers::cli::{Cli, Commands, OutputFormatter, ResourceManifest};
use skyforge_providers::config::{ConfigParser, ConfigValidator, ProviderConfig};
use skyforge_providers::context::Context;
use skyforge_providers::error::{ConfigError, Result, SkyforgeError};
use skyforge_providers::planner::{ApplyOutcome, LifecycleExecutor};
use skyforge_providers::provider::{ProviderMeta, ProviderRegistry};
use skyforge_providers::state::{InstanceState, StateFile};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let registry = ProviderRegistry::standard()?;

    match cli.command {
        Commands::Resources => {
            println!("{}", formatter.format_resources(&registry));
            Ok(())
        }
        Commands::Schema { resource_type } => {
            let definition = registry.get(&resource_type)?;
            println!("{}", formatter.format_schema(&resource_type, definition));
            Ok(())
        }
        Commands::Plan { manifest, state } => {
            cmd_plan(&registry, cli.config.as_deref(), manifest.as_deref(), &state, &formatter).await
        }
        Commands::Apply { manifest, state, yes } => {
            cmd_apply(&registry, cli.config.as_deref(), &manifest, &state, yes, &formatter).await
        }
        Commands::Refresh { state } => {
            cmd_refresh(&registry, cli.config.as_deref(), &state, &formatter).await
        }
        Commands::Destroy { state, yes } => {
            cmd_destroy(&registry, cli.config.as_deref(), &state, yes, &formatter).await
        }
        Commands::Import { resource_type, id, state } => {
            cmd_import(&registry, cli.config.as_deref(), &resource_type, &id, &state, &formatter).await
        }
    }
}

/// Show what applying a manifest would change.
async fn cmd_plan(
    registry: &ProviderRegistry,
    config_path: Option<&Path>,
    manifest_path: Option<&Path>,
    state_path: &Path,
    formatter: &OutputFormatter,
) -> Result<()> {
    let meta = load_meta(config_path)?;
    let prior = StateFile::new(state_path).load().await?;
    let manifest = manifest_path.map(ResourceManifest::load).transpose()?;
    let resource_type = resource_type_of(manifest.as_ref(), prior.as_ref())?;

    let executor = LifecycleExecutor::new(registry, &meta);
    let plan = executor.plan(
        &resource_type,
        prior.as_ref(),
        manifest.as_ref().map(|m| &m.attributes),
    )?;
    println!("{}", formatter.format_plan(&plan));
    Ok(())
}

/// Apply a manifest and persist the resulting state.
async fn cmd_apply(
    registry: &ProviderRegistry,
    config_path: Option<&Path>,
    manifest_path: &Path,
    state_path: &Path,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let meta = load_meta(config_path)?;
    let state_file = StateFile::new(state_path);
    let prior = state_file.load().await?;
    let manifest = ResourceManifest::load(manifest_path)?;
    let resource_type = resource_type_of(Some(&manifest), prior.as_ref())?;

    let executor = LifecycleExecutor::new(registry, &meta);
    let plan = executor.plan(&resource_type, prior.as_ref(), Some(&manifest.attributes))?;
    if plan.is_noop() {
        eprintln!("No changes to apply.");
        return Ok(());
    }

    // Show plan
    eprintln!("{}", formatter.format_plan(&plan));

    // Confirm
    if !auto_approve && !confirm("Do you want to apply this plan? [y/N]: ", "y")? {
        eprintln!("Apply cancelled.");
        return Ok(());
    }

    let ctx = interruptible();
    let outcome = executor
        .apply(&ctx, &resource_type, prior.as_ref(), Some(&manifest.attributes))
        .await?;
    finish(&state_file, outcome, formatter).await
}

/// Re-read the resource and persist what was found.
async fn cmd_refresh(
    registry: &ProviderRegistry,
    config_path: Option<&Path>,
    state_path: &Path,
    formatter: &OutputFormatter,
) -> Result<()> {
    let meta = load_meta(config_path)?;
    let state_file = StateFile::new(state_path);
    let Some(prior) = state_file.load().await? else {
        eprintln!("No state in {}; nothing to refresh.", state_path.display());
        return Ok(());
    };

    let executor = LifecycleExecutor::new(registry, &meta);
    let ctx = interruptible();
    let refreshed = executor.refresh(&ctx, &prior.resource_type, &prior).await?;
    if refreshed.as_ref().map(InstanceState::digest) == Some(prior.digest()) {
        debug!("State of {} {} is unchanged", prior.resource_type, prior.id);
    }
    state_file.save(refreshed.as_ref()).await?;
    println!("{}", formatter.format_state(refreshed.as_ref()));
    Ok(())
}

/// Delete the resource recorded in a state file.
async fn cmd_destroy(
    registry: &ProviderRegistry,
    config_path: Option<&Path>,
    state_path: &Path,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let meta = load_meta(config_path)?;
    let state_file = StateFile::new(state_path);
    let Some(prior) = state_file.load().await? else {
        eprintln!("No state in {}; nothing to destroy.", state_path.display());
        return Ok(());
    };

    eprintln!("The following resource will be destroyed:");
    eprintln!("  - {} ({})", prior.resource_type, prior.id);

    // Confirm
    if !auto_approve
        && !confirm("\nThis action is IRREVERSIBLE. Type 'destroy' to confirm: ", "destroy")?
    {
        eprintln!("Destruction cancelled.");
        return Ok(());
    }

    let executor = LifecycleExecutor::new(registry, &meta);
    let ctx = interruptible();
    let outcome = executor.destroy(&ctx, &prior.resource_type, &prior).await?;
    finish(&state_file, outcome, formatter).await
}

/// Adopt an existing resource into a state file.
async fn cmd_import(
    registry: &ProviderRegistry,
    config_path: Option<&Path>,
    resource_type: &str,
    id: &str,
    state_path: &Path,
    formatter: &OutputFormatter,
) -> Result<()> {
    let meta = load_meta(config_path)?;
    let state_file = StateFile::new(state_path);
    if let Some(existing) = state_file.load().await? {
        return Err(ConfigError::ValidationError {
            message: format!(
                "{} already tracks {} {}",
                state_path.display(),
                existing.resource_type,
                existing.id
            ),
            field: Some(String::from("state")),
        }
        .into());
    }

    let executor = LifecycleExecutor::new(registry, &meta);
    let ctx = interruptible();
    let mut states = executor.import(&ctx, resource_type, id).await?.into_iter();
    let Some(state) = states.next() else {
        return Err(SkyforgeError::internal(format!(
            "Cannot import non-existent remote object {resource_type} {id}"
        )));
    };
    let extra = states.count();
    if extra > 0 {
        warn!("Import of {id} returned {extra} additional instance(s); only the first was saved");
    }

    state_file.save(Some(&state)).await?;
    info!("Imported {resource_type} {} into {}", state.id, state_file.path().display());
    println!("{}", formatter.format_state(Some(&state)));
    Ok(())
}

/// Persists the outcome's state, then reports its error, if any.
async fn finish(state_file: &StateFile, outcome: ApplyOutcome, formatter: &OutputFormatter) -> Result<()> {
    state_file.save(outcome.state.as_ref()).await?;
    println!("{}", formatter.format_outcome(&outcome));
    outcome.into_result().map(|_| ())
}

/// Loads and validates the provider configuration.
fn load_meta(config_path: Option<&Path>) -> Result<ProviderMeta> {
    let config = load_config(config_path)?;
    Ok(ProviderMeta::from_config(config))
}

fn load_config(config_path: Option<&Path>) -> Result<ProviderConfig> {
    let parser = match config_path.and_then(Path::parent) {
        Some(dir) if !dir.as_os_str().is_empty() => ConfigParser::new().with_base_path(dir),
        _ => ConfigParser::new(),
    };
    let config = parser.load(config_path)?;

    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }
    Ok(config)
}

/// Picks the resource type from the manifest, falling back to state.
fn resource_type_of(manifest: Option<&ResourceManifest>, prior: Option<&InstanceState>) -> Result<String> {
    match (manifest, prior) {
        (Some(m), Some(p)) if m.resource_type != p.resource_type => Err(ConfigError::ValidationError {
            message: format!(
                "Manifest type {} does not match state type {}",
                m.resource_type, p.resource_type
            ),
            field: Some(String::from("type")),
        }
        .into()),
        (Some(m), _) => Ok(m.resource_type.clone()),
        (None, Some(p)) => Ok(p.resource_type.clone()),
        (None, None) => Err(ConfigError::ValidationError {
            message: String::from("Nothing to plan: no manifest and no state"),
            field: None,
        }
        .into()),
    }
}

/// A context cancelled by Ctrl-C.
fn interruptible() -> Context {
    let (ctx, handle) = Context::with_cancel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling in-flight operations");
            handle.cancel();
        }
    });
    ctx
}

/// Prompts on stderr and compares the answer with `expected`.
fn confirm(prompt: &str, expected: &str) -> Result<bool> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case(expected))
}
