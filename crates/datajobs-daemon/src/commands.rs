//! One-shot operator commands. Each loads what it needs, acts and prints.
//!
//! Changes take effect in a running daemon at its next periodic reload.
//! A deleted job stops firing right away: the daemon re-reads each job
//! before dispatching it.

use anyhow::{bail, Context};
use datajobs_core::config::JobDefaults;
use datajobs_core::{Instrument, Tag};
use datajobs_jobs::{validate, JobDefinition};
use datajobs_scheduler::{ConfirmationPrompt, SchedulingCoordinator, TriggerSpec};

use crate::cli::EditArgs;
use crate::prompt::StdinPrompt;

pub(crate) fn list(coordinator: &mut SchedulingCoordinator, json: bool) -> anyhow::Result<()> {
    coordinator.load_all()?;
    if json {
        println!("{}", serde_json::to_string_pretty(coordinator.jobs())?);
        return Ok(());
    }
    if coordinator.jobs().is_empty() {
        println!("No jobs.");
        return Ok(());
    }
    for job in coordinator.jobs() {
        println!("{}", describe(job));
    }
    Ok(())
}

pub(crate) fn add(
    coordinator: &mut SchedulingCoordinator,
    defaults: &JobDefaults,
) -> anyhow::Result<()> {
    let job = coordinator.add_job(defaults)?;
    println!("{}", describe(&job));
    println!(
        "Pick a target with `datajobs edit {} --tag <name>` or `--instrument <symbol>`.",
        job.id
    );
    Ok(())
}

pub(crate) fn edit(coordinator: &mut SchedulingCoordinator, args: EditArgs) -> anyhow::Result<()> {
    coordinator.load_all()?;
    coordinator.refresh_catalog()?;
    let mut editor = coordinator
        .edit_job(args.id)
        .with_context(|| format!("no job with id {}", args.id))?;

    if let Some(name) = args.name {
        editor.set_name(name);
    }
    if let Some(key) = args.tag {
        let tag = find_tag(coordinator.tags(), &key)
            .with_context(|| format!("no tag matching '{key}'"))?;
        editor.set_use_tag(true);
        editor.set_tag(Some(tag));
    }
    if let Some(key) = args.instrument {
        let instrument = find_instrument(coordinator.instruments(), &key)
            .with_context(|| format!("no instrument matching '{key}'"))?;
        editor.set_use_tag(false);
        editor.set_instrument(Some(instrument));
    }
    if let Some(frequency) = args.frequency {
        editor.set_frequency(frequency);
    }
    if let Some(time) = args.time {
        editor.set_time(time);
    }
    if let Some(week_days_only) = args.week_days_only {
        editor.set_week_days_only(week_days_only);
    }

    if let Some(problem) = editor.validation_error() {
        bail!("job {} not saved: {problem}", args.id);
    }
    let saved = coordinator.update_job(&editor)?;
    println!("{}", describe(&saved));
    Ok(())
}

pub(crate) async fn delete(
    coordinator: &mut SchedulingCoordinator,
    id: i64,
    yes: bool,
) -> anyhow::Result<()> {
    // straight to the store: rows that fail to decode are not in the loaded list
    let deleted = if yes {
        coordinator.delete_job(id)?
    } else {
        let Some(pending) = coordinator.request_delete(id)? else {
            println!("No job with id {id}.");
            return Ok(());
        };
        let decision = StdinPrompt.confirm(&pending.title, &pending.message).await;
        coordinator.confirm_delete(pending.token, decision)?
    };
    if deleted {
        println!("Deleted job {id}.");
    } else {
        println!("Job {id} left unchanged.");
    }
    Ok(())
}

pub(crate) fn tags(coordinator: &mut SchedulingCoordinator) -> anyhow::Result<()> {
    coordinator.refresh_catalog()?;
    for tag in coordinator.tags() {
        println!("{:>5}  {}", tag.id, tag.name);
    }
    Ok(())
}

pub(crate) fn instruments(coordinator: &mut SchedulingCoordinator) -> anyhow::Result<()> {
    coordinator.refresh_catalog()?;
    for instrument in coordinator.instruments() {
        let tags: Vec<&str> = instrument.tags.iter().map(|t| t.name.as_str()).collect();
        println!(
            "{:>5}  {:<12} {:<30} [{}]",
            instrument.id,
            instrument.to_string(),
            instrument.name.as_deref().unwrap_or(""),
            tags.join(", ")
        );
    }
    Ok(())
}

fn describe(job: &JobDefinition) -> String {
    let status = match validate(job) {
        Ok(()) => TriggerSpec::for_job(job).to_string(),
        Err(problem) => format!("not scheduled: {problem}"),
    };
    format!(
        "{:>5}  {:<20} {:<22} {:<15} {}",
        job.id,
        job.name,
        job.target_label(),
        job.frequency,
        status
    )
}

/// Match by id, then by case-insensitive name.
fn find_tag(tags: &[Tag], key: &str) -> Option<Tag> {
    let by_id = key.parse::<i64>().ok();
    tags.iter()
        .find(|t| Some(t.id) == by_id)
        .or_else(|| tags.iter().find(|t| t.name.eq_ignore_ascii_case(key)))
        .cloned()
}

/// Match by id, then by case-insensitive symbol.
fn find_instrument(instruments: &[Instrument], key: &str) -> Option<Instrument> {
    let by_id = key.parse::<i64>().ok();
    instruments
        .iter()
        .find(|i| Some(i.id) == by_id)
        .or_else(|| instruments.iter().find(|i| i.symbol.eq_ignore_ascii_case(key)))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags() -> Vec<Tag> {
        vec![
            Tag {
                id: 1,
                name: "Energy".into(),
            },
            Tag {
                id: 2,
                name: "Tech".into(),
            },
        ]
    }

    #[test]
    fn tag_lookup_by_id_or_name() {
        assert_eq!(find_tag(&tags(), "2").map(|t| t.name), Some("Tech".into()));
        assert_eq!(find_tag(&tags(), "energy").map(|t| t.id), Some(1));
        assert!(find_tag(&tags(), "Metals").is_none());
    }

    #[test]
    fn instrument_lookup_by_symbol() {
        let instruments = vec![Instrument {
            id: 11,
            symbol: "CL".into(),
            name: Some("Crude Oil".into()),
            exchange: None,
            currency: None,
            tags: vec![],
        }];
        assert_eq!(find_instrument(&instruments, "cl").map(|i| i.id), Some(11));
        assert_eq!(find_instrument(&instruments, "11").map(|i| i.id), Some(11));
        assert!(find_instrument(&instruments, "NG").is_none());
    }

    #[test]
    fn describe_flags_unschedulable_jobs() {
        let mut job = JobDefinition::draft(&JobDefaults::default());
        job.id = 3;
        assert!(describe(&job).ends_with("not scheduled: You must select a tag."));

        job.tag = Some(tags().remove(0));
        assert!(describe(&job).ends_with("daily at 08:00 on weekdays"));
    }
}
