use std::collections::BTreeMap;

use datajobs_catalog::{CatalogAccessor, CatalogError};
use datajobs_core::Instrument;
use datajobs_jobs::JobDefinition;
use tracing::{debug, warn};

/// Instruments a job refreshes, looked up against the catalog right now.
///
/// Tag-mode jobs get whatever currently carries the tag; instrument-mode jobs
/// get their instrument, or nothing if it has left the catalog. An empty
/// result is a valid no-op fetch cycle. The result is de-duplicated by id and
/// ordered by symbol.
pub fn resolve_targets(
    catalog: &dyn CatalogAccessor,
    job: &JobDefinition,
) -> Result<Vec<Instrument>, CatalogError> {
    let found = if job.use_tag {
        match job.tag.as_ref().map(|t| t.id).or(job.tag_id) {
            Some(tag_id) => catalog.instruments_for_tag(tag_id)?,
            None => {
                warn!(job_id = job.id, name = %job.name, "tag-mode job has no tag; nothing to refresh");
                Vec::new()
            }
        }
    } else {
        match job.instrument.as_ref().map(|i| i.id).or(job.instrument_id) {
            Some(instrument_id) => catalog.find_instrument(instrument_id)?.into_iter().collect(),
            None => {
                warn!(job_id = job.id, name = %job.name, "instrument-mode job has no instrument; nothing to refresh");
                Vec::new()
            }
        }
    };

    let mut by_id: BTreeMap<i64, Instrument> = BTreeMap::new();
    for instrument in found {
        by_id.entry(instrument.id).or_insert(instrument);
    }
    let mut targets: Vec<Instrument> = by_id.into_values().collect();
    targets.sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.id.cmp(&b.id)));
    debug!(job_id = job.id, count = targets.len(), "resolved targets");
    Ok(targets)
}
