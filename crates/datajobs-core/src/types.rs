use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification label attached to zero or more instruments (e.g. "Energy").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A tradable instrument as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: i64,
    /// Ticker symbol, e.g. `CL` or `AAPL`.
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    /// Tags currently carried by this instrument.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Instrument {
    pub fn has_tag(&self, tag_id: i64) -> bool {
        self.tags.iter().any(|t| t.id == tag_id)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.exchange {
            Some(exchange) => write!(f, "{} @ {}", self.symbol, exchange),
            None => write!(f, "{}", self.symbol),
        }
    }
}

/// Bar size of the data a job refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    OneDay,
    OneWeek,
    OneMonth,
}

impl Frequency {
    pub const ALL: [Frequency; 8] = [
        Frequency::OneMinute,
        Frequency::FiveMinutes,
        Frequency::FifteenMinutes,
        Frequency::ThirtyMinutes,
        Frequency::OneHour,
        Frequency::OneDay,
        Frequency::OneWeek,
        Frequency::OneMonth,
    ];
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Frequency::OneMinute => "one_minute",
            Frequency::FiveMinutes => "five_minutes",
            Frequency::FifteenMinutes => "fifteen_minutes",
            Frequency::ThirtyMinutes => "thirty_minutes",
            Frequency::OneHour => "one_hour",
            Frequency::OneDay => "one_day",
            Frequency::OneWeek => "one_week",
            Frequency::OneMonth => "one_month",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Frequency::ALL
            .into_iter()
            .find(|f| f.to_string() == s)
            .ok_or_else(|| format!("unknown frequency: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_string_matches_serde_name() {
        for f in Frequency::ALL {
            let json = serde_json::to_string(&f).unwrap();
            assert_eq!(json, format!("\"{f}\""));
            assert_eq!(f.to_string().parse::<Frequency>().unwrap(), f);
        }
    }

    #[test]
    fn unknown_frequency_is_rejected() {
        assert!("two_days".parse::<Frequency>().is_err());
    }
}
