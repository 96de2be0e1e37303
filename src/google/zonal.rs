//! Locating a zonal resource when only its region is known.
//!
//! Imported resources carry an ID but no zone. Zone names encode their
//! region as a prefix (`us-central1-a`), so every zone of the region is
//! probed in listing order.

use std::future::Future;

use tracing::debug;

use crate::context::Context;
use crate::error::Result;

use super::compute::ComputeApi;

/// Probes each zone of `region` with `probe` and returns the zone and the
/// first resource found.
///
/// A 404 from a probe moves on to the next zone. Any other error aborts
/// the search. Returns `None` when no zone holds the resource.
///
/// # Errors
///
/// Returns an error if the zones cannot be listed or a probe fails with
/// anything other than not-found.
pub async fn find_in_region<T, F, Fut>(
    ctx: &Context,
    compute: &dyn ComputeApi,
    project: &str,
    region: &str,
    mut probe: F,
) -> Result<Option<(String, T)>>
where
    F: FnMut(String) -> Fut + Send,
    Fut: Future<Output = Result<T>> + Send,
    T: Send,
{
    let zones = ctx
        .run("listing zones", compute.list_zones(project))
        .await
        .map_err(|e| e.labeled("Error listing zones"))?;

    for zone in zones.into_iter().filter(|z| z.name.contains(region)) {
        debug!("Searching zone {} for resource", zone.name);
        match ctx.run("reading resource", probe(zone.name.clone())).await {
            Ok(resource) => return Ok(Some((zone.name, resource))),
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e.labeled("Error reading Resource")),
        }
    }

    Ok(None)
}
