use chrono::NaiveTime;
use datajobs_core::{Frequency, Instrument, Tag};

use crate::job::JobDefinition;
use crate::validate::{prepare_for_save, validate, ValidationError};

/// Edit-then-save wrapper around a [`JobDefinition`].
///
/// Every setter that can change the outcome of [`validate`] re-runs it
/// immediately and stores the result, so [`JobEditor::validation_error`]
/// always reflects the current field values. Switching modes never clears
/// the other mode's selection; only saving does.
#[derive(Debug, Clone)]
pub struct JobEditor {
    job: JobDefinition,
    validation_error: Option<ValidationError>,
}

impl JobEditor {
    pub fn new(job: JobDefinition) -> Self {
        let mut editor = Self {
            job,
            validation_error: None,
        };
        editor.revalidate();
        editor
    }

    pub fn job(&self) -> &JobDefinition {
        &self.job
    }

    pub fn id(&self) -> i64 {
        self.job.id
    }

    pub fn validation_error(&self) -> Option<ValidationError> {
        self.validation_error
    }

    /// Saving is permitted only while there is no validation error.
    pub fn can_save(&self) -> bool {
        self.validation_error.is_none()
    }

    pub fn set_use_tag(&mut self, use_tag: bool) {
        self.job.use_tag = use_tag;
        self.revalidate();
    }

    pub fn set_tag(&mut self, tag: Option<Tag>) {
        self.job.tag = tag;
        self.revalidate();
    }

    pub fn set_instrument(&mut self, instrument: Option<Instrument>) {
        self.job.instrument = instrument;
        self.revalidate();
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.job.name = name.into();
    }

    pub fn set_frequency(&mut self, frequency: Frequency) {
        self.job.frequency = frequency;
    }

    pub fn set_time(&mut self, time: NaiveTime) {
        self.job.time = time;
    }

    pub fn set_week_days_only(&mut self, week_days_only: bool) {
        self.job.week_days_only = week_days_only;
    }

    /// Validate once more and hand back the normalised job ready to write.
    pub fn to_saveable(&self) -> Result<JobDefinition, ValidationError> {
        let mut job = self.job.clone();
        prepare_for_save(&mut job)?;
        Ok(job)
    }

    fn revalidate(&mut self) {
        self.validation_error = validate(&self.job).err();
    }
}
