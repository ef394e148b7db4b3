use chrono::NaiveTime;
use datajobs_core::config::JobDefaults;
use datajobs_core::{Frequency, Instrument, Tag};
use serde::{Deserialize, Serialize};

/// A persisted data update job.
///
/// Exactly one of the tag pair (`tag_id`, `tag`) or the instrument pair
/// (`instrument_id`, `instrument`) is meaningful, selected by `use_tag`.
/// The reference objects are resolved eagerly on load; the id fields are
/// what gets written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Store-assigned primary key. `0` until the job has been added.
    pub id: i64,
    pub name: String,
    /// `true`: refresh every instrument carrying `tag`.
    /// `false`: refresh the single `instrument`.
    pub use_tag: bool,
    pub tag_id: Option<i64>,
    pub tag: Option<Tag>,
    pub instrument_id: Option<i64>,
    pub instrument: Option<Instrument>,
    /// Bar size of the data to refresh.
    pub frequency: Frequency,
    /// Time of day the job fires.
    pub time: NaiveTime,
    pub week_days_only: bool,
}

impl JobDefinition {
    /// Unsaved tag-mode job with no tag selected yet.
    pub fn draft(defaults: &JobDefaults) -> Self {
        Self {
            id: 0,
            name: defaults.name.clone(),
            use_tag: true,
            tag_id: None,
            tag: None,
            instrument_id: None,
            instrument: None,
            frequency: defaults.frequency,
            time: defaults.time,
            week_days_only: defaults.week_days_only,
        }
    }

    /// Short human-readable description of what the job targets.
    pub fn target_label(&self) -> String {
        if self.use_tag {
            match &self.tag {
                Some(tag) => format!("tag {}", tag.name),
                None => "tag <none>".to_string(),
            }
        } else {
            match &self.instrument {
                Some(instrument) => format!("instrument {}", instrument.symbol),
                None => "instrument <none>".to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_uses_operator_defaults() {
        let job = JobDefinition::draft(&JobDefaults::default());
        assert_eq!(job.id, 0);
        assert_eq!(job.name, "NewJob");
        assert!(job.use_tag);
        assert!(job.tag.is_none() && job.instrument.is_none());
        assert_eq!(job.frequency, Frequency::OneDay);
        assert_eq!(job.time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert!(job.week_days_only);
        assert_eq!(job.target_label(), "tag <none>");
    }
}
