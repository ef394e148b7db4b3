use thiserror::Error;

use crate::job::JobDefinition;

/// User-correctable problems that block a job from being saved or scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("You must select a tag.")]
    MissingTag,

    #[error("You must select an instrument.")]
    MissingInstrument,
}

/// Check that the job references a target appropriate to its mode.
pub fn validate(job: &JobDefinition) -> Result<(), ValidationError> {
    if job.use_tag {
        if job.tag.is_none() {
            return Err(ValidationError::MissingTag);
        }
    } else if job.instrument.is_none() {
        return Err(ValidationError::MissingInstrument);
    }
    Ok(())
}

/// Normalise the mutually exclusive reference fields before writing.
///
/// Afterwards exactly one of `tag_id` / `instrument_id` is set and the
/// reference belonging to the inactive mode is cleared.
pub fn prepare_for_save(job: &mut JobDefinition) -> Result<(), ValidationError> {
    validate(job)?;
    if job.use_tag {
        job.instrument = None;
        job.instrument_id = None;
        job.tag_id = job.tag.as_ref().map(|t| t.id);
    } else {
        job.instrument_id = job.instrument.as_ref().map(|i| i.id);
        job.tag = None;
        job.tag_id = None;
    }
    Ok(())
}
