// ============================================================================
// Linting
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // Public items should be documented
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Skyforge Providers
//!
//! Declarative lifecycle handlers for Google Cloud Bigtable, Compute Engine
//! and Kubernetes resources.
//!
//! ## Overview
//!
//! Every resource type is a schema plus a handler implementing create,
//! read, update, delete and import. Handlers talk to the control planes
//! through typed REST clients and wait for long-running operations to
//! settle before reporting success:
//!
//! - `google_bigtable_instance` and `google_bigtable_family`
//! - `google_compute_address` and its beta variant
//! - `google_compute_instance_group_manager` and its beta variant
//! - `kubernetes_service`
//!
//! ## Architecture
//!
//! 1. **Schema**: attribute types, modes, defaults and validators
//! 2. **Plan**: desired configuration diffed against prior state
//! 3. **Apply**: the handler converges the remote object, committing
//!    partial state as each step succeeds
//!
//! ## Modules
//!
//! - [`config`]: Provider configuration parsing and validation
//! - [`schema`]: Attribute model and the [`ResourceData`] accessor
//! - [`state`]: Persisted instance state and the flat attribute encoding
//! - [`operation`]: Long-running operation polling
//! - [`provider`]: Lifecycle contract, client factory and registry
//! - [`google`]: Bigtable and Compute Engine clients and resources
//! - [`kubernetes`]: Kubernetes client and the service resource
//! - [`planner`]: Diff computation and the lifecycle executor
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! type: google_compute_instance_group_manager
//! attributes:
//!   name: web
//!   base_instance_name: web
//!   zone: us-central1-a
//!   instance_template: projects/p/global/instanceTemplates/web-v2
//!   update_strategy: RESTART
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod api_level;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod google;
pub mod http;
pub mod kubernetes;
pub mod operation;
pub mod planner;
pub mod provider;
pub mod schema;
pub mod state;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use api_level::ApiLevel;
pub use cli::{Cli, Commands, OutputFormatter, ResourceManifest};
pub use config::{ConfigParser, ConfigValidator, ProviderConfig};
pub use context::Context;
pub use error::{Result, SkyforgeError};
pub use planner::{ApplyOutcome, LifecycleExecutor, PlanAction, ResourcePlan};
pub use provider::{ClientFactory, Lifecycle, ProviderMeta, ProviderRegistry, ResourceDefinition};
pub use schema::{AttributeSchema, ResourceData, ResourceSchema, Value};
pub use state::{InstanceState, StateFile};
