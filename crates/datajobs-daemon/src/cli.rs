//! CLI definitions for `datajobs`.

use std::path::PathBuf;

use chrono::NaiveTime;
use clap::{Args, Parser, Subcommand};
use datajobs_core::Frequency;

#[derive(Parser)]
#[command(name = "datajobs")]
#[command(about = "Recurring market data update jobs")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: $DATAJOBS_CONFIG or ~/.datajobs/datajobs.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the scheduler in the foreground (default)
    Run,

    /// List all jobs
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Create a job from the configured defaults
    Add,

    /// Change a job's settings
    Edit(EditArgs),

    /// Delete a job
    Delete {
        /// Job id
        id: i64,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List catalog tags
    Tags,

    /// List catalog instruments
    Instruments,
}

#[derive(Args)]
pub(crate) struct EditArgs {
    /// Job id
    pub id: i64,

    #[arg(long)]
    pub name: Option<String>,

    /// Target every instrument carrying this tag (name or id)
    #[arg(long, conflicts_with = "instrument")]
    pub tag: Option<String>,

    /// Target a single instrument (symbol or id)
    #[arg(long)]
    pub instrument: Option<String>,

    /// Bar size, e.g. one_day or five_minutes
    #[arg(long)]
    pub frequency: Option<Frequency>,

    /// Time of day, HH:MM or HH:MM:SS
    #[arg(long, value_parser = parse_time)]
    pub time: Option<NaiveTime>,

    /// Restrict fires to Monday-Friday
    #[arg(long)]
    pub week_days_only: Option<bool>,
}

pub(crate) fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("invalid time '{s}', expected HH:MM"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_edit_flags() {
        let cli = Cli::parse_from([
            "datajobs",
            "edit",
            "3",
            "--tag",
            "Energy",
            "--frequency",
            "one_week",
            "--time",
            "17:30",
            "--week-days-only",
            "false",
        ]);
        let Some(Commands::Edit(args)) = cli.command else {
            panic!("expected edit");
        };
        assert_eq!(args.id, 3);
        assert_eq!(args.tag.as_deref(), Some("Energy"));
        assert_eq!(args.frequency, Some(Frequency::OneWeek));
        assert_eq!(args.time, NaiveTime::from_hms_opt(17, 30, 0));
        assert_eq!(args.week_days_only, Some(false));
    }

    #[test]
    fn tag_and_instrument_are_exclusive() {
        let parsed = Cli::try_parse_from([
            "datajobs",
            "edit",
            "3",
            "--tag",
            "Energy",
            "--instrument",
            "CL",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn time_accepts_seconds() {
        assert_eq!(parse_time("08:00:15"), Ok(NaiveTime::from_hms_opt(8, 0, 15).unwrap()));
        assert!(parse_time("8am").is_err());
    }
}
