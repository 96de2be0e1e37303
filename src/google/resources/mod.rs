//! Lifecycle handlers for the Google Cloud resources.

mod bigtable_family;
mod bigtable_instance;
mod compute_address;
mod instance_group_manager;

pub use bigtable_family::{BigtableFamily, bigtable_family_resource};
pub use bigtable_instance::{BigtableInstance, bigtable_instance_resource};
pub use compute_address::{ComputeAddress, compute_address_resource};
pub use instance_group_manager::{
    InstanceGroupManagerResource, UpdateStrategy, instance_group_manager_resource, recreate_budget,
};
