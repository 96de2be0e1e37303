//! Bigtable instance and table administration.

mod client;
mod types;

pub use client::{InstanceAdminApi, InstanceAdminClient, TableAdminApi, TableAdminClient};
pub use types::{ClusterInfo, FamilyInfo, GcPolicy, InstanceConf, InstanceInfo, StorageType, TableInfo};
