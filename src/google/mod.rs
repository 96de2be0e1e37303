//! Google Cloud API clients and resource handlers.

pub mod bigtable;
pub mod compute;
pub mod resources;
mod zonal;

pub use zonal::find_in_region;
