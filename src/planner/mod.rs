//! Planning and applying changes to a single resource.
//!
//! This module compares desired configuration with prior state and drives
//! the registered lifecycle handlers to converge them.

mod diff;
mod executor;

pub use diff::{AttributeChange, PlanAction, ResourcePlan, diff, plan_resource};
pub use executor::{ApplyOutcome, LifecycleExecutor};
