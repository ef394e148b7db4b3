use chrono::NaiveTime;
use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::types::Frequency;

pub const DEFAULT_TICK_MILLIS: u64 = 1_000;
pub const DEFAULT_RELOAD_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_JOB_NAME: &str = "NewJob";

/// Top-level config (datajobs.toml + DATAJOBS_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataJobsConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub defaults: JobDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// IANA zone in which job times of day are interpreted.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Engine polling cadence.
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    /// How often the daemon reloads jobs from the store and reconciles.
    /// 0 disables periodic reloads.
    #[serde(default = "default_reload_interval_secs")]
    pub reload_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            tick_millis: DEFAULT_TICK_MILLIS,
            reload_interval_secs: DEFAULT_RELOAD_INTERVAL_SECS,
        }
    }
}

impl SchedulerConfig {
    pub fn tz(&self) -> crate::error::Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|e| {
            crate::error::DataJobsError::Config(format!(
                "invalid scheduler.timezone '{}': {e}",
                self.timezone
            ))
        })
    }
}

/// Values used for a job created by the operator's "add" action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefaults {
    #[serde(default = "default_job_name")]
    pub name: String,
    #[serde(default = "default_frequency")]
    pub frequency: Frequency,
    #[serde(default = "default_time")]
    pub time: NaiveTime,
    #[serde(default = "bool_true")]
    pub week_days_only: bool,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            name: default_job_name(),
            frequency: default_frequency(),
            time: default_time(),
            week_days_only: true,
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.datajobs/datajobs.db", home)
}
fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}
fn default_tick_millis() -> u64 {
    DEFAULT_TICK_MILLIS
}
fn default_reload_interval_secs() -> u64 {
    DEFAULT_RELOAD_INTERVAL_SECS
}
fn default_job_name() -> String {
    DEFAULT_JOB_NAME.to_string()
}
fn default_frequency() -> Frequency {
    Frequency::OneDay
}
fn default_time() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN)
}
fn bool_true() -> bool {
    true
}

impl DataJobsConfig {
    /// Load config from a TOML file with DATAJOBS_* env var overrides.
    ///
    /// Path resolution: explicit argument, then ~/.datajobs/datajobs.toml.
    /// Nested env keys use a double underscore:
    /// `DATAJOBS_SCHEDULER__TICK_MILLIS=250`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        tracing::debug!(path = %path, "loading config");

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::DataJobsError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(DataJobsConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("DATAJOBS_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.datajobs/datajobs.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_when_file_missing() {
        Jail::expect_with(|_jail| {
            let config = DataJobsConfig::load(Some("does-not-exist.toml")).unwrap();
            assert_eq!(config.scheduler.tick_millis, DEFAULT_TICK_MILLIS);
            assert_eq!(config.defaults.name, "NewJob");
            assert_eq!(config.defaults.frequency, Frequency::OneDay);
            assert_eq!(config.defaults.time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
            assert!(config.defaults.week_days_only);
            Ok(())
        });
    }

    #[test]
    fn toml_and_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "datajobs.toml",
                r#"
                [database]
                path = "/tmp/jobs.db"

                [scheduler]
                timezone = "America/New_York"

                [defaults]
                frequency = "one_hour"
                time = "17:30:00"
                "#,
            )?;
            jail.set_env("DATAJOBS_SCHEDULER__TICK_MILLIS", "250");

            let config = DataJobsConfig::load(Some("datajobs.toml")).unwrap();
            assert_eq!(config.database.path, "/tmp/jobs.db");
            assert_eq!(config.scheduler.tick_millis, 250);
            assert_eq!(config.scheduler.tz().unwrap(), chrono_tz::America::New_York);
            assert_eq!(config.defaults.frequency, Frequency::OneHour);
            assert_eq!(config.defaults.time, NaiveTime::from_hms_opt(17, 30, 0).unwrap());
            Ok(())
        });
    }

    #[test]
    fn bad_timezone_is_a_config_error() {
        let config = SchedulerConfig {
            timezone: "Mars/Olympus".to_string(),
            ..SchedulerConfig::default()
        };
        let err = config.tz().unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
