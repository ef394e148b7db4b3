use datajobs_core::{Instrument, Tag};

use crate::error::Result;

/// Read-only view over the instrument and tag catalog.
///
/// Membership may change at any time; callers that need the current set of
/// instruments for a tag must ask again rather than cache the answer.
pub trait CatalogAccessor: Send + Sync {
    /// Every tag, ordered by name.
    fn all_tags(&self) -> Result<Vec<Tag>>;

    /// Every instrument, ordered by symbol.
    fn all_instruments(&self) -> Result<Vec<Instrument>>;

    /// Instruments currently carrying `tag_id`, ordered by symbol.
    /// An unknown tag yields an empty list.
    fn instruments_for_tag(&self, tag_id: i64) -> Result<Vec<Instrument>>;

    /// Look up a single instrument, `None` if it is not (or no longer) in the catalog.
    fn find_instrument(&self, id: i64) -> Result<Option<Instrument>>;
}
