use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Weekday};
use datajobs_core::Frequency;
use datajobs_jobs::JobDefinition;
use serde::Serialize;

/// Longest gap between two fires of any cadence, plus slack for DST gaps.
const SEARCH_HORIZON_DAYS: i64 = 70;

/// How often a trigger repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cadence {
    Daily,
    Weekly { weekday: Weekday },
    /// Fires on `day` of each month (or the first weekday on/after the 1st
    /// when the trigger is weekdays-only).
    Monthly { day: u32 },
}

impl Cadence {
    pub fn for_frequency(frequency: Frequency) -> Self {
        match frequency {
            Frequency::OneWeek => Cadence::Weekly {
                weekday: Weekday::Mon,
            },
            Frequency::OneMonth => Cadence::Monthly { day: 1 },
            _ => Cadence::Daily,
        }
    }
}

/// Declarative description of when a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TriggerSpec {
    pub cadence: Cadence,
    pub time: NaiveTime,
    pub week_days_only: bool,
}

impl TriggerSpec {
    pub fn for_job(job: &JobDefinition) -> Self {
        Self {
            cadence: Cadence::for_frequency(job.frequency),
            time: job.time,
            week_days_only: job.week_days_only,
        }
    }

    /// Next fire strictly after `from`, evaluated in `from`'s time zone.
    ///
    /// A local time skipped by a DST jump fires at the first valid instant
    /// after it. Returns `None` only if no day within the search horizon
    /// matches, which no [`Cadence`] variant produces in practice.
    pub fn next_fire_after<Tz: TimeZone>(&self, from: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = from.timezone();
        let start = from.date_naive();
        (0..SEARCH_HORIZON_DAYS)
            .filter_map(|offset| start.checked_add_signed(Duration::days(offset)))
            .filter(|date| self.fires_on(*date))
            .filter_map(|date| local_instant(&tz, date, self.time))
            .find(|candidate| candidate > from)
    }

    /// Whether a fire is due on `date` at all (ignoring time of day).
    pub fn fires_on(&self, date: NaiveDate) -> bool {
        let weekday = is_weekday(date);
        match self.cadence {
            Cadence::Daily => weekday || !self.week_days_only,
            Cadence::Weekly { weekday: target } => date.weekday() == target,
            Cadence::Monthly { day } => {
                if self.week_days_only {
                    date.day() == first_weekday_on_or_after(date, day)
                } else {
                    date.day() == day
                }
            }
        }
    }
}

impl fmt::Display for TriggerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = self.time.format("%H:%M");
        match self.cadence {
            Cadence::Daily if self.week_days_only => write!(f, "daily at {time} on weekdays"),
            Cadence::Daily => write!(f, "daily at {time}"),
            Cadence::Weekly { weekday } => write!(f, "weekly on {weekday} at {time}"),
            Cadence::Monthly { day } if self.week_days_only => {
                write!(f, "monthly on the first weekday from day {day} at {time}")
            }
            Cadence::Monthly { day } => write!(f, "monthly on day {day} at {time}"),
        }
    }
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Day-of-month of the first Mon–Fri on or after `day` in `date`'s month.
fn first_weekday_on_or_after(date: NaiveDate, day: u32) -> u32 {
    let mut candidate = NaiveDate::from_ymd_opt(date.year(), date.month(), day);
    while let Some(d) = candidate {
        if is_weekday(d) {
            return d.day();
        }
        candidate = d.succ_opt().filter(|next| next.month() == date.month());
    }
    day
}

fn local_instant<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Tz>> {
    let naive = date.and_time(time);
    tz.from_local_datetime(&naive).earliest().or_else(|| {
        // inside a DST gap: walk forward to the first representable minute
        (1..=180)
            .map(|m| naive + Duration::minutes(m))
            .find_map(|shifted| tz.from_local_datetime(&shifted).earliest())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use datajobs_core::config::JobDefaults;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn spec(cadence: Cadence, week_days_only: bool) -> TriggerSpec {
        TriggerSpec {
            cadence,
            time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            week_days_only,
        }
    }

    #[test]
    fn cadence_follows_frequency() {
        assert_eq!(Cadence::for_frequency(Frequency::OneMinute), Cadence::Daily);
        assert_eq!(Cadence::for_frequency(Frequency::OneDay), Cadence::Daily);
        assert_eq!(
            Cadence::for_frequency(Frequency::OneWeek),
            Cadence::Weekly {
                weekday: Weekday::Mon
            }
        );
        assert_eq!(
            Cadence::for_frequency(Frequency::OneMonth),
            Cadence::Monthly { day: 1 }
        );
    }

    #[test]
    fn default_job_fires_daily_at_eight_on_weekdays() {
        let job = JobDefinition::draft(&JobDefaults::default());
        let spec = TriggerSpec::for_job(&job);
        assert_eq!(spec.to_string(), "daily at 08:00 on weekdays");
    }

    #[test]
    fn daily_later_today_or_tomorrow() {
        let s = spec(Cadence::Daily, false);
        // 2026-10-19 is a Monday
        assert_eq!(s.next_fire_after(&at(2026, 10, 19, 7, 0)), Some(at(2026, 10, 19, 8, 0)));
        assert_eq!(s.next_fire_after(&at(2026, 10, 19, 8, 0)), Some(at(2026, 10, 20, 8, 0)));
    }

    #[test]
    fn weekdays_only_skips_the_weekend() {
        let s = spec(Cadence::Daily, true);
        // Friday after the fire -> Monday
        assert_eq!(s.next_fire_after(&at(2026, 10, 23, 9, 0)), Some(at(2026, 10, 26, 8, 0)));
        // Saturday -> Monday
        assert_eq!(s.next_fire_after(&at(2026, 10, 24, 7, 0)), Some(at(2026, 10, 26, 8, 0)));

        let every_day = spec(Cadence::Daily, false);
        assert_eq!(
            every_day.next_fire_after(&at(2026, 10, 23, 9, 0)),
            Some(at(2026, 10, 24, 8, 0))
        );
    }

    #[test]
    fn weekly_fires_on_monday() {
        let s = spec(
            Cadence::Weekly {
                weekday: Weekday::Mon,
            },
            true,
        );
        assert_eq!(s.next_fire_after(&at(2026, 10, 19, 7, 0)), Some(at(2026, 10, 19, 8, 0)));
        assert_eq!(s.next_fire_after(&at(2026, 10, 19, 8, 30)), Some(at(2026, 10, 26, 8, 0)));
    }

    #[test]
    fn monthly_moves_to_first_weekday_when_restricted() {
        // 2026-11-01 is a Sunday
        let restricted = spec(Cadence::Monthly { day: 1 }, true);
        assert_eq!(
            restricted.next_fire_after(&at(2026, 10, 19, 0, 0)),
            Some(at(2026, 11, 2, 8, 0))
        );
        let unrestricted = spec(Cadence::Monthly { day: 1 }, false);
        assert_eq!(
            unrestricted.next_fire_after(&at(2026, 10, 19, 0, 0)),
            Some(at(2026, 11, 1, 8, 0))
        );
    }

    #[test]
    fn evaluated_in_the_callers_zone() {
        let tz = chrono_tz::America::New_York;
        let from = tz.with_ymd_and_hms(2026, 10, 19, 7, 0, 0).unwrap();
        let next = spec(Cadence::Daily, true).next_fire_after(&from).unwrap();
        assert_eq!(next, tz.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap());
        assert_eq!(next.with_timezone(&Utc), at(2026, 10, 19, 12, 0));
    }

    #[test]
    fn dst_gap_fires_at_first_valid_instant() {
        let tz = chrono_tz::America::New_York;
        // 2026-03-08 02:00 local does not exist (clocks jump to 03:00)
        let s = TriggerSpec {
            cadence: Cadence::Daily,
            time: NaiveTime::from_hms_opt(2, 30, 0).unwrap(),
            week_days_only: false,
        };
        let from = tz.with_ymd_and_hms(2026, 3, 8, 0, 0, 0).unwrap();
        let next = s.next_fire_after(&from).unwrap();
        assert_eq!(next.with_timezone(&Utc), at(2026, 3, 8, 7, 0));
    }
}
